use super::*;

/// `select`: wrapped in a container next to an anchor showing the selected
/// option's text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Select;

fn selected_text(dom: &Dom, select: NodeId) -> String {
    let text = dom
        .selected_option(select)
        .map(|option| dom.text_content(option))
        .unwrap_or_default();
    if !text.is_empty() {
        return text;
    }
    dom.select_options(select)
        .first()
        .map(|option| dom.text_content(*option))
        .unwrap_or_default()
}

impl WidgetAdapter for Select {
    fn name(&self) -> &str {
        "select"
    }

    fn blueprint(&self) -> Blueprint {
        Blueprint::tag("select")
    }

    fn construct(
        &self,
        page: &mut Page,
        element: NodeId,
        options: &OptionMap,
        validators: Vec<Validator<Dom>>,
    ) -> Result<Option<FieldId>> {
        let settings = resolve_settings(self.name(), &ContainerSettings::select(), options)?;
        if !settings.active {
            return Ok(None);
        }

        let parts = ContainerParts::create(page.dom_mut(), &settings);
        let options = FieldOptions::<Dom>::new(element)
            .validators(validators)
            .on_ready(move |_, dom| parts.build(dom, element, "select", &settings));

        let mut model = FieldModel::new(page.dom_mut(), options)?;
        model.bind(
            VALIDATE,
            listener::<Dom, _>(move |_, dom, _| {
                let text = selected_text(dom, element);
                if let Err(err) = dom.set_text_content(parts.custom, &text) {
                    tracing::warn!(%err, "cannot render selected option");
                }
            }),
        );
        model.validate(page.dom_mut(), None);
        let id = page.insert_field(model);

        mirror_focus(page, element, parts.container);
        validate_on_change(page, element, id);
        Ok(Some(id))
    }
}
