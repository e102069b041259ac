use super::*;

/// `input[type=file]`: wrapped in a container next to an anchor showing the
/// chosen file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct File;

/// Base name of a browser reported path (`C:\fakepath\name.ext`).
fn file_name(value: &str) -> &str {
    value.rsplit('\\').next().unwrap_or_default()
}

impl WidgetAdapter for File {
    fn name(&self) -> &str {
        "file"
    }

    fn blueprint(&self) -> Blueprint {
        Blueprint::tag("input").filter("input", "type", "file")
    }

    fn construct(
        &self,
        page: &mut Page,
        element: NodeId,
        options: &OptionMap,
        validators: Vec<Validator<Dom>>,
    ) -> Result<Option<FieldId>> {
        let settings = resolve_settings(self.name(), &ContainerSettings::file(), options)?;
        if !settings.active {
            return Ok(None);
        }

        let parts = ContainerParts::create(page.dom_mut(), &settings);
        let holder = settings.holder_txt.clone();
        let options = FieldOptions::<Dom>::new(element)
            .validators(validators)
            .on_ready(move |_, dom| parts.build(dom, element, "file", &settings));

        let mut model = FieldModel::new(page.dom_mut(), options)?;
        model.bind(
            VALIDATE,
            listener::<Dom, _>(move |_, dom, _| {
                let value = dom.value(element).unwrap_or_default();
                let label = match file_name(&value) {
                    "" => holder.as_str(),
                    name => name,
                };
                if let Err(err) = dom.set_text_content(parts.custom, label) {
                    tracing::warn!(%err, "cannot render file name");
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
