use super::*;

/// Text inputs and textareas: emulates the `placeholder` attribute by
/// writing the placeholder into the value while the field is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextSettings {
    pub active: bool,
    pub class_prefix: String,
    /// Text colour while the placeholder is shown.
    #[serde(rename = "blur_color")]
    pub blur_color: String,
    /// The document renders placeholders natively; the adapter then stays
    /// out of the way unless `force` is set.
    #[serde(rename = "placeholder_support")]
    pub placeholder_support: bool,
    pub force: bool,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            active: true,
            class_prefix: "custom-".into(),
            blur_color: "#777".into(),
            placeholder_support: false,
            force: false,
        }
    }
}

/// Fills an invalid field with the placeholder.
fn show_placeholder(page: &mut Page, id: FieldId, placeholder: Option<&str>) {
    page.with_field(id, |model, dom| {
        if model.sync(dom).validate(dom, None).success {
            return;
        }
        if let Some(placeholder) = placeholder {
            model.update(dom, placeholder, true).save(dom);
        }
    });
}

/// Empties an invalid field. Returns whether it did.
fn clear_placeholder(page: &mut Page, id: FieldId) -> bool {
    page.with_field(id, |model, dom| {
        if model.sync(dom).validate(dom, None).success {
            return false;
        }
        model.update(dom, "", true).save(dom);
        true
    })
    .unwrap_or(false)
}

impl WidgetAdapter for Text {
    fn name(&self) -> &str {
        "text"
    }

    fn blueprint(&self) -> Blueprint {
        Blueprint::tags(["input", "textarea"]).filter(
            "input",
            "type",
            ["text", "search", "tel", "url", "email", "password"],
        )
    }

    fn construct(
        &self,
        page: &mut Page,
        element: NodeId,
        options: &OptionMap,
        validators: Vec<Validator<Dom>>,
    ) -> Result<Option<FieldId>> {
        let settings: TextSettings =
            resolve_settings(self.name(), &TextSettings::default(), options)?;
        if !settings.active || (settings.placeholder_support && !settings.force) {
            return Ok(None);
        }

        let color = page.dom().style(element, "color").unwrap_or_default();
        let placeholder = page.dom().attr(element, "placeholder");
        let class = format!("{}textfield", settings.class_prefix);

        let unlike_placeholder = placeholder.clone();
        let options = FieldOptions::<Dom>::new(element)
            .validators(validators)
            .validator(Validator::new(move |value| {
                unlike_placeholder.as_deref() != Some(value)
            }))
            .on_ready(move |_, dom| {
                dom.add_class(element, &class);
                Ok(())
            });

        let mut model = FieldModel::new(page.dom_mut(), options)?;
        let blur_color = settings.blur_color.clone();
        let original_color = color.clone();
        model.bind(
            VALIDATE,
            listener::<Dom, _>(move |_, dom, event| {
                let color = if passed(event) { &original_color } else { &blur_color };
                if let Err(err) = dom.set_style(element, "color", color) {
                    tracing::warn!(%err, "cannot recolour text field");
                }
            }),
        );
        let id = page.insert_field(model);
        show_placeholder(page, id, placeholder.as_deref());

        page.add_listener(
            element,
            "focusin",
            dom_listener(move |page, _| {
                page.dom_mut().add_class(element, FOCUS_CLASS);
                if clear_placeholder(page, id) {
                    page.dom_mut().set_style(element, "color", &color)?;
                }
                Ok(())
            }),
        );
        let blur_placeholder = placeholder.clone();
        page.add_listener(
            element,
            "focusout",
            dom_listener(move |page, _| {
                page.dom_mut().remove_class(element, FOCUS_CLASS);
                show_placeholder(page, id, blur_placeholder.as_deref());
                Ok(())
            }),
        );
        if let Some(form) = page.dom().closest(element, "form") {
            page.add_listener(
                form,
                "submit",
                dom_listener(move |page, _| {
                    clear_placeholder(page, id);
                    Ok(())
                }),
            );
        }
        Ok(Some(id))
    }
}
