//! Scanning a document subtree and handing matched elements to widget adapters.

use super::*;

/// A widget kind: which elements it claims and how it builds a field for one.
pub trait WidgetAdapter {
    /// Registration name, also the key of the adapter's option section.
    fn name(&self) -> &str;

    fn blueprint(&self) -> Blueprint;

    /// Builds the widget for `element`. `options` already holds the global
    /// options overlaid with the adapter's own section; `validators` are the
    /// caller-supplied ones for this adapter. `Ok(None)` means the adapter
    /// declined the element (inactive, or not applicable).
    fn construct(
        &self,
        page: &mut Page,
        element: NodeId,
        options: &OptionMap,
        validators: Vec<Validator<Dom>>,
    ) -> Result<Option<FieldId>>;
}

/// Adapter registry plus the options of the scan in progress.
#[derive(Default)]
pub struct FormFactory {
    registry: BlueprintRegistry,
    adapters: Vec<Box<dyn WidgetAdapter>>,
    global_options: OptionMap,
}

impl fmt::Debug for FormFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormFactory")
            .field("adapters", &self.adapter_names())
            .field("global_options", &self.global_options)
            .finish()
    }
}

impl FormFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checkbox, File, Radio, Select and Text, in that order.
    pub fn with_default_adapters() -> Self {
        let mut factory = Self::new();
        factory
            .register(widgets::Checkbox)
            .register(widgets::File)
            .register(widgets::Radio)
            .register(widgets::Select)
            .register(widgets::Text);
        factory
    }

    /// Adds an adapter after the existing ones. A second adapter with an
    /// already registered name (any case) is ignored.
    pub fn register<A: WidgetAdapter + 'static>(&mut self, adapter: A) -> &mut Self {
        if self.adapter(adapter.name()).is_some() {
            tracing::warn!(adapter = adapter.name(), "adapter already registered, ignoring");
            return self;
        }
        self.registry
            .register_blueprint(adapter.name(), &adapter.blueprint());
        self.adapters.push(Box::new(adapter));
        self
    }

    pub fn registry(&self) -> &BlueprintRegistry {
        &self.registry
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.name()).collect()
    }

    /// Options applied to every adapter during the last scan.
    pub fn global_options(&self) -> &OptionMap {
        &self.global_options
    }

    fn adapter(&self, name: &str) -> Option<&dyn WidgetAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.name().eq_ignore_ascii_case(name))
            .map(Box::as_ref)
    }

    fn set_global_options(&mut self, options: &ScanOptions) {
        self.global_options = options
            .values()
            .iter()
            .filter(|(key, _)| self.adapter(key).is_none())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
    }

    /// Walks the subtree rooted at `root` (root included) and builds a widget
    /// for every element an adapter claims. Claimed elements are not
    /// descended into. Returns the new fields in document order.
    pub fn scan(
        &mut self,
        page: &mut Page,
        root: NodeId,
        options: &ScanOptions,
    ) -> Result<Vec<FieldId>> {
        self.set_global_options(options);
        tracing::debug!(
            root = ?root,
            global_keys = self.global_options.len(),
            "scanning for form widgets"
        );
        let mut created = Vec::new();
        self.scan_node(page, root, options, &mut created)?;
        tracing::debug!(fields = created.len(), "scan finished");
        Ok(created)
    }

    fn scan_node(
        &self,
        page: &mut Page,
        node: NodeId,
        options: &ScanOptions,
        created: &mut Vec<FieldId>,
    ) -> Result<()> {
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
            let Some(name) = self.registry.match_element(page.dom(), node) else {
                if let Some(tag) = page.dom().tag_name(node) {
                    tracing::trace!(tag, "no adapter claims element");
                }
                for child in page.dom().children(node).to_vec() {
                    self.scan_node(page, child, options, created)?;
                }
                return Ok(());
            };
            let Some(adapter) = self.adapter(name) else {
                return Ok(());
            };

            let mut settings = self.global_options.clone();
            if let Some(section) = options.adapter_section(adapter.name()) {
                deep_merge(&mut settings, section);
            }
            let validators = options.validators_for(adapter.name());
            match adapter.construct(page, node, &settings, validators)? {
                Some(id) => {
                    tracing::debug!(adapter = adapter.name(), node = ?node, "widget created");
                    created.push(id);
                }
                None => tracing::debug!(adapter = adapter.name(), node = ?node, "adapter declined element"),
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    /// Records every element and option set it is offered.
    struct Probe {
        name: &'static str,
        blueprint: Blueprint,
        seen: Rc<RefCell<Vec<(NodeId, OptionMap)>>>,
    }

    impl WidgetAdapter for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn blueprint(&self) -> Blueprint {
            self.blueprint.clone()
        }

        fn construct(
            &self,
            page: &mut Page,
            element: NodeId,
            options: &OptionMap,
            validators: Vec<Validator<Dom>>,
        ) -> Result<Option<FieldId>> {
            self.seen.borrow_mut().push((element, options.clone()));
            if options.get("active") == Some(&Value::Bool(false)) {
                return Ok(None);
            }
            let model = FieldModel::new(page.dom_mut(), FieldOptions::new(element).validators(validators))?;
            Ok(Some(page.insert_field(model)))
        }
    }

    fn probe(
        name: &'static str,
        blueprint: Blueprint,
    ) -> (Probe, Rc<RefCell<Vec<(NodeId, OptionMap)>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let adapter = Probe {
            name,
            blueprint,
            seen: Rc::clone(&seen),
        };
        (adapter, seen)
    }

    #[test]
    fn scan_returns_fields_in_document_order_and_skips_claimed_subtrees() -> Result<()> {
        let mut page = Page::from_html(
            "<div id='root'><section id='s'><p id='inner'></p></section><p id='a'></p><div><p id='b'></p></div></div>",
        )?;
        let (sections, _) = probe("section", Blueprint::tag("section"));
        let (paragraphs, seen) = probe("paragraph", Blueprint::tag("p"));
        let mut factory = FormFactory::new();
        factory.register(sections).register(paragraphs);

        let root = page.select_one("#root")?;
        let fields = factory.scan(&mut page, root, &ScanOptions::new())?;
        assert_eq!(fields.len(), 3);
        let ids = seen
            .borrow()
            .iter()
            .map(|(node, _)| page.dom().attr(*node, "id").unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn scan_checks_the_root_itself() -> Result<()> {
        let mut page = Page::from_html("<p id='only'></p>")?;
        let (paragraphs, seen) = probe("paragraph", Blueprint::tag("p"));
        let mut factory = FormFactory::new();
        factory.register(paragraphs);
        let root = page.select_one("#only")?;
        factory.scan(&mut page, root, &ScanOptions::new())?;
        assert_eq!(seen.borrow().len(), 1);
        Ok(())
    }

    #[test]
    fn global_options_exclude_adapter_sections_and_reset_per_scan() -> Result<()> {
        let mut page = Page::from_html("<p id='a'></p>")?;
        let (paragraphs, seen) = probe("paragraph", Blueprint::tag("p"));
        let mut factory = FormFactory::new();
        factory.register(paragraphs);
        let root = page.dom().root();

        let options = ScanOptions::from_json(json!({
            "classPrefix": "x-",
            "Paragraph": {"classPrefix": "p-", "extra": 1}
        }))?;
        factory.scan(&mut page, root, &options)?;
        assert_eq!(factory.global_options().len(), 1);
        assert_eq!(
            Value::Object(seen.borrow()[0].1.clone()),
            json!({"classPrefix": "p-", "extra": 1})
        );

        factory.scan(&mut page, root, &ScanOptions::new())?;
        assert!(factory.global_options().is_empty());
        assert!(seen.borrow()[1].1.is_empty());
        Ok(())
    }

    #[test]
    fn declined_elements_produce_no_field() -> Result<()> {
        let mut page = Page::from_html("<p></p><p></p>")?;
        let (paragraphs, seen) = probe("paragraph", Blueprint::tag("p"));
        let mut factory = FormFactory::new();
        factory.register(paragraphs);
        let root = page.dom().root();
        let options = ScanOptions::new().set("active", false);
        assert!(factory.scan(&mut page, root, &options)?.is_empty());
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(page.field_count(), 0);
        Ok(())
    }

    #[test]
    fn duplicate_adapter_names_are_ignored() {
        let (first, _) = probe("paragraph", Blueprint::tag("p"));
        let (second, _) = probe("Paragraph", Blueprint::tag("div"));
        let mut factory = FormFactory::new();
        factory.register(first).register(second);
        assert_eq!(factory.adapter_names(), vec!["paragraph"]);
        assert!(!factory.registry().supports_tag("div"));
    }

    #[test]
    fn per_adapter_validators_reach_the_model() -> Result<()> {
        let mut page = Page::from_html("<p id='a'></p>")?;
        let (paragraphs, _) = probe("paragraph", Blueprint::tag("p"));
        let mut factory = FormFactory::new();
        factory.register(paragraphs);
        let root = page.dom().root();
        let options = ScanOptions::new()
            .validator_for("Paragraph", Validator::new(|_| true))
            .validator_for("other", Validator::new(|_| true));
        let fields = factory.scan(&mut page, root, &options)?;
        let model = page.field(fields[0]).ok_or(Error::SelectorNotFound("field".into()))?;
        assert_eq!(model.validator_count(), 2);
        Ok(())
    }
}
