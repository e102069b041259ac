//! The host page: a document, its native event listeners and the field
//! models bound to its elements, driven through browser-like user actions.

use super::*;

/// Handle to a field model stored in a [`Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

/// Handle returned by [`Page::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Native event travelling from its target up to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub event_type: String,
    pub target: NodeId,
    pub current_target: NodeId,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl DomEvent {
    fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

pub type DomListener = Rc<dyn Fn(&mut Page, &mut DomEvent) -> Result<()>>;

pub fn dom_listener<F>(f: F) -> DomListener
where
    F: Fn(&mut Page, &mut DomEvent) -> Result<()> + 'static,
{
    Rc::new(f)
}

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    handler: DomListener,
}

#[derive(Default, Clone)]
struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Listener>>>,
    next_id: usize,
}

impl ListenerStore {
    fn add(&mut self, node_id: NodeId, event: &str, handler: DomListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.map
            .entry(node_id)
            .or_default()
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, handler });
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        for events in self.map.values_mut() {
            for listeners in events.values_mut() {
                if let Some(pos) = listeners.iter().position(|listener| listener.id == id) {
                    listeners.remove(pos);
                    return true;
                }
            }
        }
        false
    }

    fn get(&self, node_id: NodeId, event: &str) -> Vec<Listener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .cloned()
            .unwrap_or_default()
    }

    fn count(&self, node_id: NodeId, event: &str) -> usize {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

pub struct Page {
    dom: Dom,
    listeners: ListenerStore,
    fields: Vec<Option<FieldModel<Dom>>>,
    active_element: Option<NodeId>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("fields", &self.fields.len())
            .field("active_element", &self.active_element)
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn from_html(html: &str) -> Result<Self> {
        Ok(Self::from_dom(html::parse_html(html)?))
    }

    pub fn from_dom(dom: Dom) -> Self {
        Self {
            dom,
            listeners: ListenerStore::default(),
            fields: Vec::new(),
            active_element: None,
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.active_element
    }

    pub fn freeze_time(&mut self, epoch_ms: i64) {
        self.dom.freeze_time(epoch_ms);
    }

    pub fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    pub fn add_listener(&mut self, node: NodeId, event: &str, listener: DomListener) -> ListenerId {
        self.listeners.add(node, event, listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.listeners.count(node, event)
    }

    /// Runs the listeners of `target`, then of each ancestor, until one
    /// stops propagation. Listeners added during dispatch do not run for
    /// the node currently being visited.
    pub fn dispatch(&mut self, target: NodeId, event_type: &str) -> Result<DomEvent> {
        let mut event = DomEvent::new(event_type, target);
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            event.current_target = node;
            for listener in self.listeners.get(node, event_type) {
                (listener.handler)(self, &mut event)?;
            }
            if event.propagation_stopped {
                tracing::trace!(event = event_type, node = ?node, "propagation stopped");
                break;
            }
            cursor = self.dom.parent(node);
        }
        Ok(event)
    }

    pub(crate) fn insert_field(&mut self, model: FieldModel<Dom>) -> FieldId {
        let id = FieldId(self.fields.len());
        self.fields.push(Some(model));
        id
    }

    /// `None` while the field is borrowed by [`Page::with_field`].
    pub fn field(&self, id: FieldId) -> Option<&FieldModel<Dom>> {
        self.fields.get(id.0).and_then(Option::as_ref)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// First field bound to `element`.
    pub fn field_for(&self, element: NodeId) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|model| model.element() == element))
            .map(FieldId)
    }

    /// Lends the field model and the document to `f`. Returns `None` when
    /// the id is unknown or the model is already lent out.
    pub fn with_field<R>(
        &mut self,
        id: FieldId,
        f: impl FnOnce(&mut FieldModel<Dom>, &mut Dom) -> R,
    ) -> Option<R> {
        let mut model = self.fields.get_mut(id.0)?.take()?;
        let out = f(&mut model, &mut self.dom);
        if let Some(slot) = self.fields.get_mut(id.0) {
            *slot = Some(model);
        }
        Some(out)
    }

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.click_node(target)
    }

    pub fn click_node(&mut self, target: NodeId) -> Result<()> {
        if self.dom.disabled(target) {
            return Ok(());
        }

        let outcome = self.dispatch(target, "click")?;
        if outcome.default_prevented {
            return Ok(());
        }

        if self.dom.is_input_of_type(target, "checkbox") {
            let current = self.dom.checked(target)?;
            self.dom.set_checked(target, !current)?;
            self.dispatch_input_and_change(target)?;
        } else if self.dom.is_input_of_type(target, "radio") {
            if !self.dom.checked(target)? {
                self.dom.set_checked(target, true)?;
                self.dispatch_input_and_change(target)?;
            }
        } else if is_submit_control(&self.dom, target) {
            if let Some(form) = self.dom.closest(target, "form") {
                self.dispatch(form, "submit")?;
            }
        }
        Ok(())
    }

    pub fn focus(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.focus_node(target)
    }

    pub fn focus_node(&mut self, node: NodeId) -> Result<()> {
        if self.dom.disabled(node) || self.active_element == Some(node) {
            return Ok(());
        }
        if let Some(current) = self.active_element {
            self.blur_node(current)?;
        }
        self.active_element = Some(node);
        self.dispatch(node, "focusin")?;
        self.dispatch(node, "focus")?;
        Ok(())
    }

    pub fn blur(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.blur_node(target)
    }

    pub fn blur_node(&mut self, node: NodeId) -> Result<()> {
        if self.active_element != Some(node) {
            return Ok(());
        }
        self.dispatch(node, "focusout")?;
        self.dispatch(node, "blur")?;
        self.active_element = None;
        Ok(())
    }

    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) || self.dom.readonly(target) {
            return Ok(());
        }
        let tag = self.dom.tag_name(target).unwrap_or_default();
        if tag != "input" && tag != "textarea" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: tag.to_string(),
            });
        }
        self.dom.set_value(target, text)?;
        self.dispatch_input_and_change(target)
    }

    /// Selects the option whose value is `value`.
    pub fn select_option(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }
        let tag = self.dom.tag_name(target).unwrap_or_default();
        if tag != "select" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "select".into(),
                actual: tag.to_string(),
            });
        }
        if self.dom.option_with_value(target, value).is_none() {
            return Err(Error::SelectorNotFound(format!(
                "{selector} option[value={value}]"
            )));
        }
        self.dom.set_value(target, value)?;
        self.dispatch_input_and_change(target)
    }

    /// Picks a file the way browsers report it: only the base name survives,
    /// behind a fake `C:\fakepath\` directory. An empty path clears the choice.
    pub fn choose_file(&mut self, selector: &str, path: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }
        if !self.dom.is_input_of_type(target, "file") {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input[type=file]".into(),
                actual: self.dom.tag_name(target).unwrap_or_default().to_string(),
            });
        }
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or_default();
        let value = if file_name.is_empty() {
            String::new()
        } else {
            format!("C:\\fakepath\\{file_name}")
        };
        self.dom.set_value(target, &value)?;
        self.dispatch_input_and_change(target)
    }

    pub fn set_checked(&mut self, selector: &str, checked: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }
        if !self.dom.is_input_of_type(target, "checkbox")
            && !self.dom.is_input_of_type(target, "radio")
        {
            let kind = self
                .dom
                .attr(target, "type")
                .unwrap_or_else(|| "text".into());
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input[type=checkbox|radio]".into(),
                actual: format!("{}[type={kind}]", self.dom.tag_name(target).unwrap_or_default()),
            });
        }
        if self.dom.checked(target)? != checked {
            self.dom.set_checked(target, checked)?;
            self.dispatch_input_and_change(target)?;
        }
        Ok(())
    }

    /// Submits the form `selector` names, or the form owning that element.
    pub fn submit(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if let Some(form) = self.dom.closest(target, "form") {
            self.dispatch(form, "submit")?;
        }
        Ok(())
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        self.check(selector, target, expected, actual)
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        self.check(selector, target, expected, actual)
    }

    pub fn assert_checked(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.checked(target)?;
        self.check(selector, target, &expected.to_string(), actual.to_string())
    }

    pub fn assert_has_class(&self, selector: &str, class_name: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.has_class(target, class_name);
        let describe = |present: bool| {
            format!("class `{class_name}` {}", if present { "present" } else { "absent" })
        };
        self.check(selector, target, &describe(expected), describe(actual))
    }

    /// An empty `expected` asserts the property is not set inline.
    pub fn assert_style(&self, selector: &str, property: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.style(target, property).unwrap_or_default();
        self.check(selector, target, expected, actual)
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    fn check(&self, selector: &str, target: NodeId, expected: &str, actual: String) -> Result<()> {
        if actual == expected {
            return Ok(());
        }
        Err(Error::AssertionFailed {
            selector: selector.to_string(),
            expected: expected.to_string(),
            actual,
            dom_snippet: truncate_chars(&self.dom.dump_node(target), 200),
        })
    }

    fn dispatch_input_and_change(&mut self, target: NodeId) -> Result<()> {
        self.dispatch(target, "input")?;
        self.dispatch(target, "change")?;
        Ok(())
    }
}

fn is_submit_control(dom: &Dom, node: NodeId) -> bool {
    match dom.tag_name(node) {
        Some("button") => dom
            .attr(node, "type")
            .is_none_or(|kind| kind.eq_ignore_ascii_case("submit")),
        Some("input") => dom.is_input_of_type(node, "submit"),
        _ => false,
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out: String = it.by_ref().take(max_chars).collect();
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}
