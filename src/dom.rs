use super::*;

/// Handle to a node of a [`Dom`]. Handles stay valid for the lifetime of the
/// document; detached nodes keep their id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) disabled: bool,
    pub(crate) readonly: bool,
}

/// Arena backed document tree holding the native form controls and the
/// custom markup built around them.
#[derive(Debug, Clone)]
pub struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) fixed_time_ms: Option<i64>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            fixed_time_ms: None,
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: BTreeMap<String, String>,
    ) -> NodeId {
        let element = Element::from_attrs(tag_name, attrs);
        self.create_node(Some(parent), NodeType::Element(element))
    }

    /// Creates an element that is not attached anywhere yet.
    pub fn create_detached_element(&mut self, tag_name: &str) -> NodeId {
        let element = Element::from_attrs(tag_name.to_ascii_lowercase(), BTreeMap::new());
        self.create_node(None, NodeType::Element(element))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes.get(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_or_err(&self, node_id: NodeId, operation: &str) -> Result<&Element> {
        self.element(node_id)
            .ok_or_else(|| Error::NotAnElement(format!("{operation} target")))
    }

    fn element_mut_or_err(&mut self, node_id: NodeId, operation: &str) -> Result<&mut Element> {
        self.element_mut(node_id)
            .ok_or_else(|| Error::NotAnElement(format!("{operation} target")))
    }

    pub fn is_element(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some()
    }

    /// Lower-cased tag name, `None` for document and text nodes.
    pub fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    fn has_tag(&self, node_id: NodeId, tag: &str) -> bool {
        self.tag_name(node_id)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, node_id: NodeId) -> bool {
        node_id == self.root || self.is_descendant_of(node_id, self.root)
    }

    /// Nearest inclusive ancestor with the given tag.
    pub fn closest(&self, node_id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = Some(node_id);
        while let Some(current) = cursor {
            if self.has_tag(current, tag) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Element descendants of `node_id` in document order, excluding itself.
    pub fn descendants(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(node_id, &mut out);
        out
    }

    fn collect_descendants(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
            for child in self.children(node_id) {
                if self.is_element(*child) {
                    out.push(*child);
                }
                self.collect_descendants(*child, out);
            }
        });
    }

    pub fn all_element_nodes(&self) -> Vec<NodeId> {
        self.descendants(self.root)
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.all_element_nodes()
            .into_iter()
            .find(|node| self.attr(*node, "id").as_deref() == Some(id))
    }

    pub fn elements_with_class(&self, class_name: &str) -> Vec<NodeId> {
        self.all_element_nodes()
            .into_iter()
            .filter(|node| self.has_class(*node, class_name))
            .collect()
    }

    pub fn text_content(&self, node_id: NodeId) -> String {
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
            match self.nodes.get(node_id.0).map(|node| &node.node_type) {
                Some(NodeType::Document | NodeType::Element(_)) => self
                    .children(node_id)
                    .iter()
                    .map(|child| self.text_content(*child))
                    .collect(),
                Some(NodeType::Text(text)) => text.clone(),
                None => String::new(),
            }
        })
    }

    pub fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.element_or_err(node_id, "textContent")?;
        let old_children = std::mem::take(&mut self.nodes[node_id.0].children);
        for child in old_children {
            self.nodes[child.0].parent = None;
        }
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
        Ok(())
    }

    pub fn value(&self, node_id: NodeId) -> Result<String> {
        Ok(self.element_or_err(node_id, "value")?.value.clone())
    }

    pub fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        if self.has_tag(node_id, "select") {
            return self.set_select_value(node_id, value);
        }
        self.element_mut_or_err(node_id, "value")?.value = value.to_string();
        Ok(())
    }

    pub fn checked(&self, node_id: NodeId) -> Result<bool> {
        Ok(self.element_or_err(node_id, "checked")?.checked)
    }

    /// Sets the checkedness of an input. Checking a radio unchecks the other
    /// radios of its group (same `name`, same form owner).
    pub fn set_checked(&mut self, node_id: NodeId, checked: bool) -> Result<()> {
        if checked && self.is_input_of_type(node_id, "radio") {
            self.uncheck_other_radios_in_group(node_id)?;
        }
        self.element_mut_or_err(node_id, "checked")?.checked = checked;
        Ok(())
    }

    pub fn disabled(&self, node_id: NodeId) -> bool {
        self.element(node_id).map(|e| e.disabled).unwrap_or(false)
    }

    pub fn readonly(&self, node_id: NodeId) -> bool {
        self.element(node_id).map(|e| e.readonly).unwrap_or(false)
    }

    /// `input` element whose `type` attribute equals `kind` (ASCII case-insensitive).
    pub fn is_input_of_type(&self, node_id: NodeId, kind: &str) -> bool {
        self.has_tag(node_id, "input")
            && self
                .attr(node_id, "type")
                .is_some_and(|value| value.eq_ignore_ascii_case(kind))
    }

    fn uncheck_other_radios_in_group(&mut self, target: NodeId) -> Result<()> {
        let target_name = self.attr(target, "name").unwrap_or_default();
        if target_name.is_empty() {
            return Ok(());
        }
        let target_form = self.closest(target, "form");

        for node in self.all_element_nodes() {
            if node == target || !self.is_input_of_type(node, "radio") {
                continue;
            }
            if self.attr(node, "name").unwrap_or_default() != target_name {
                continue;
            }
            if self.closest(node, "form") != target_form {
                continue;
            }
            self.element_mut_or_err(node, "checked")?.checked = false;
        }
        Ok(())
    }

    pub fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.element(node_id)
            .and_then(|e| e.attrs.get(&name.to_ascii_lowercase()).cloned())
    }

    pub fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|e| e.attrs.contains_key(&name.to_ascii_lowercase()))
    }

    pub fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let lowered = name.to_ascii_lowercase();
        let is_option = {
            let element = self.element_mut_or_err(node_id, "setAttribute")?;
            element.attrs.insert(lowered.clone(), value.to_string());
            match lowered.as_str() {
                "value" => element.value = value.to_string(),
                "checked" => element.checked = true,
                "disabled" => element.disabled = true,
                "readonly" => element.readonly = true,
                _ => {}
            }
            element.tag_name == "option"
        };
        if is_option && (lowered == "selected" || lowered == "value") {
            self.sync_select_value_for_option(node_id)?;
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        let lowered = name.to_ascii_lowercase();
        let is_option = {
            let element = self.element_mut_or_err(node_id, "removeAttribute")?;
            element.attrs.remove(&lowered);
            match lowered.as_str() {
                "value" => element.value.clear(),
                "checked" => element.checked = false,
                "disabled" => element.disabled = false,
                "readonly" => element.readonly = false,
                _ => {}
            }
            element.tag_name == "option"
        };
        if is_option && (lowered == "selected" || lowered == "value") {
            self.sync_select_value_for_option(node_id)?;
        }
        Ok(())
    }

    pub fn has_class(&self, node_id: NodeId, class_name: &str) -> bool {
        self.element(node_id)
            .and_then(|e| e.attrs.get("class"))
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class_name))
    }

    /// Adds one or more space separated classes. No-op on non-elements.
    pub fn add_class(&mut self, node_id: NodeId, class_names: &str) {
        let Some(element) = self.element_mut(node_id) else {
            return;
        };
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        for name in class_names.split_whitespace() {
            if !classes.iter().any(|existing| existing == name) {
                classes.push(name.to_string());
            }
        }
        set_class_attr(element, &classes);
    }

    pub fn remove_class(&mut self, node_id: NodeId, class_names: &str) {
        let Some(element) = self.element_mut(node_id) else {
            return;
        };
        let removed = class_names.split_whitespace().collect::<Vec<_>>();
        let classes = class_tokens(element.attrs.get("class").map(String::as_str))
            .into_iter()
            .filter(|existing| !removed.contains(&existing.as_str()))
            .collect::<Vec<_>>();
        set_class_attr(element, &classes);
    }

    pub fn toggle_class(&mut self, node_id: NodeId, class_name: &str, on: bool) {
        if on {
            self.add_class(node_id, class_name);
        } else {
            self.remove_class(node_id, class_name);
        }
    }

    /// Inline style property, `None` when the `style` attribute does not set it.
    pub fn style(&self, node_id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(node_id, "style")?;
        parse_style_declarations(&style)
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(property))
            .map(|(_, value)| value)
    }

    /// Sets an inline style property; an empty value removes it.
    pub fn set_style(&mut self, node_id: NodeId, property: &str, value: &str) -> Result<()> {
        self.set_styles(node_id, [(property, value)])
    }

    pub fn set_styles<'a, I>(&mut self, node_id: NodeId, styles: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let current = self.attr(node_id, "style").unwrap_or_default();
        let mut declarations = parse_style_declarations(&current);
        for (property, value) in styles {
            let property = property.trim().to_ascii_lowercase();
            let position = declarations.iter().position(|(name, _)| *name == property);
            match (position, value.trim().is_empty()) {
                (Some(index), true) => {
                    declarations.remove(index);
                }
                (Some(index), false) => declarations[index].1 = value.trim().to_string(),
                (None, false) => declarations.push((property, value.trim().to_string())),
                (None, true) => {}
            }
        }
        if declarations.is_empty() {
            return self.remove_attr(node_id, "style");
        }
        let serialized = declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(node_id, "style", &serialized)
    }

    fn can_have_children(&self, node_id: NodeId) -> bool {
        matches!(
            self.nodes.get(node_id.0).map(|node| &node.node_type),
            Some(NodeType::Document | NodeType::Element(_))
        )
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId, operation: &str) -> Result<()> {
        if !self.can_have_children(parent) {
            return Err(Error::InvalidTreeOperation(format!(
                "{operation} target cannot have children"
            )));
        }
        if child == self.root
            || child == parent
            || child.0 >= self.nodes.len()
            || self.is_descendant_of(parent, child)
        {
            return Err(Error::InvalidTreeOperation(format!(
                "invalid {operation} node"
            )));
        }
        Ok(())
    }

    fn detach(&mut self, node_id: NodeId) {
        if let Some(old_parent) = self.nodes[node_id.0].parent.take() {
            self.nodes[old_parent.0]
                .children
                .retain(|child| *child != node_id);
        }
    }

    /// Moves `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertion(parent, child, "appendChild")?;
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Moves `new_node` right before `reference` inside `reference`'s parent.
    pub fn insert_before(&mut self, reference: NodeId, new_node: NodeId) -> Result<()> {
        let parent = self.parent(reference).ok_or_else(|| {
            Error::InvalidTreeOperation("insertBefore reference has no parent".into())
        })?;
        if reference == new_node {
            return Ok(());
        }
        self.check_insertion(parent, new_node, "insertBefore")?;
        self.detach(new_node);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|child| *child == reference)
            .ok_or_else(|| Error::InvalidTreeOperation("insertBefore reference is detached".into()))?;
        self.nodes[new_node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, new_node);
        Ok(())
    }

    pub(crate) fn initialize_form_control_values(&mut self) -> Result<()> {
        for node in self.all_element_nodes() {
            if self.has_tag(node, "textarea") {
                let text = self.text_content(node);
                self.element_mut_or_err(node, "textarea")?.value = text;
            } else if self.has_tag(node, "select") {
                self.sync_select_value(node)?;
            }
        }
        Ok(())
    }

    fn sync_select_value_for_option(&mut self, option_node: NodeId) -> Result<()> {
        let Some(select_node) = self.closest(option_node, "select") else {
            return Ok(());
        };
        self.sync_select_value(select_node)
    }

    fn set_select_value(&mut self, select_node: NodeId, requested: &str) -> Result<()> {
        let options = self.select_options(select_node);
        let matched = self.option_with_value(select_node, requested);

        for option in &options {
            let element = self.element_mut_or_err(*option, "option")?;
            if Some(*option) == matched {
                element.attrs.insert("selected".into(), String::new());
            } else {
                element.attrs.remove("selected");
            }
        }

        let value = matched
            .map(|option| self.option_effective_value(option))
            .unwrap_or_default();
        self.element_mut_or_err(select_node, "select")?.value = value;
        Ok(())
    }

    fn sync_select_value(&mut self, select_node: NodeId) -> Result<()> {
        let value = self
            .selected_option(select_node)
            .map(|option| self.option_effective_value(option))
            .unwrap_or_default();
        self.element_mut_or_err(select_node, "select")?.value = value;
        Ok(())
    }

    /// `option` descendants of a `select`, in document order.
    pub fn select_options(&self, select_node: NodeId) -> Vec<NodeId> {
        self.descendants(select_node)
            .into_iter()
            .filter(|node| self.has_tag(*node, "option"))
            .collect()
    }

    /// The option carrying `selected`, else the first option.
    pub fn selected_option(&self, select_node: NodeId) -> Option<NodeId> {
        let options = self.select_options(select_node);
        options
            .iter()
            .copied()
            .find(|option| self.has_attr(*option, "selected"))
            .or_else(|| options.first().copied())
    }

    /// First option of a `select` whose effective value is `value`.
    pub fn option_with_value(&self, select_node: NodeId, value: &str) -> Option<NodeId> {
        self.select_options(select_node)
            .into_iter()
            .find(|option| self.option_effective_value(*option) == value)
    }

    fn option_effective_value(&self, option_node: NodeId) -> String {
        self.attr(option_node, "value")
            .unwrap_or_else(|| self.text_content(option_node).trim().to_string())
    }

    /// Serialises a subtree for diagnostics. Attributes are emitted sorted.
    pub fn dump_node(&self, node_id: NodeId) -> String {
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
            match self.nodes.get(node_id.0).map(|node| &node.node_type) {
                Some(NodeType::Document) => self
                    .children(node_id)
                    .iter()
                    .map(|child| self.dump_node(*child))
                    .collect(),
                Some(NodeType::Text(text)) => text.clone(),
                Some(NodeType::Element(element)) => {
                    let mut out = String::new();
                    out.push('<');
                    out.push_str(&element.tag_name);
                    for (k, v) in &element.attrs {
                        out.push(' ');
                        out.push_str(k);
                        out.push_str("=\"");
                        out.push_str(v);
                        out.push('"');
                    }
                    out.push('>');
                    if html::is_void_tag(&element.tag_name) {
                        return out;
                    }
                    for child in self.children(node_id) {
                        out.push_str(&self.dump_node(*child));
                    }
                    out.push_str("</");
                    out.push_str(&element.tag_name);
                    out.push('>');
                    out
                }
                None => String::new(),
            }
        })
    }

    /// Pins the clock reported to field listeners.
    pub fn freeze_time(&mut self, epoch_ms: i64) {
        self.fixed_time_ms = Some(epoch_ms);
    }
}

impl Element {
    fn from_attrs(tag_name: String, attrs: BTreeMap<String, String>) -> Self {
        let toggles = tag_name == "input"
            && attrs.get("type").is_some_and(|kind| {
                kind.eq_ignore_ascii_case("checkbox") || kind.eq_ignore_ascii_case("radio")
            });
        let value = match attrs.get("value") {
            Some(value) => value.clone(),
            None if toggles => "on".to_string(),
            None => String::new(),
        };
        Self {
            checked: attrs.contains_key("checked"),
            disabled: attrs.contains_key("disabled"),
            readonly: attrs.contains_key("readonly"),
            tag_name,
            attrs,
            value,
        }
    }
}

impl FieldHost for Dom {
    type Element = NodeId;

    fn read_value(&self, element: NodeId) -> String {
        self.value(element).unwrap_or_default()
    }

    fn write_value(&mut self, element: NodeId, value: &str) {
        if let Err(err) = self.set_value(element, value) {
            tracing::warn!(node = element.0, %err, "cannot write field value to element");
        }
    }

    fn now_millis(&self) -> i64 {
        self.fixed_time_ms.unwrap_or_else(field::system_time_millis)
    }
}

fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| value.split_whitespace().map(ToOwned::to_owned).collect())
        .unwrap_or_default()
}

fn set_class_attr(element: &mut Element, classes: &[String]) {
    if classes.is_empty() {
        element.attrs.remove("class");
    } else {
        element.attrs.insert("class".to_string(), classes.join(" "));
    }
}

fn parse_style_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            (!name.is_empty() && !value.is_empty()).then(|| (name, value.to_string()))
        })
        .collect()
}
