use super::*;

/// `input[type=checkbox]`: hidden behind an anchor that mirrors `checked`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checkbox;

impl WidgetAdapter for Checkbox {
    fn name(&self) -> &str {
        "checkbox"
    }

    fn blueprint(&self) -> Blueprint {
        Blueprint::tag("input").filter("input", "type", "checkbox")
    }

    fn construct(
        &self,
        page: &mut Page,
        element: NodeId,
        options: &OptionMap,
        validators: Vec<Validator<Dom>>,
    ) -> Result<Option<FieldId>> {
        let settings = resolve_settings(self.name(), &ToggleSettings::default(), options)?;
        if !settings.active {
            return Ok(None);
        }

        let custom = page.dom_mut().create_detached_element(&settings.custom_ele);
        let options = FieldOptions::<Dom>::new(element)
            .validators(validators)
            .validator(checked_validator())
            .on_ready(move |_, dom| {
                if settings.auto_hide {
                    apply_css(dom, element, &settings.hide_css)?;
                }
                let id = prefixed_id(dom, element, &settings.class_prefix);
                dom.set_attr(custom, "id", &id)?;
                dom.set_attr(
                    custom,
                    "class",
                    &format!("{}checkbox {HIDDEN_CLASS}", settings.class_prefix),
                )?;
                dom.insert_before(element, custom)
            });

        let mut model = FieldModel::new(page.dom_mut(), options)?;
        model.bind(
            VALIDATE,
            listener::<Dom, _>(move |_, dom, event| {
                dom.toggle_class(custom, CHECKED_CLASS, passed(event));
            }),
        );
        model.validate(page.dom_mut(), None);
        let id = page.insert_field(model);

        mirror_focus(page, element, custom);
        validate_on_change(page, element, id);
        page.add_listener(
            custom,
            "click",
            dom_listener(move |page, event| {
                event.prevent_default();
                let checked = page.dom().checked(element)?;
                page.dom_mut().set_checked(element, !checked)?;
                validate_field(page, id);
                Ok(())
            }),
        );
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(html: &str) -> Result<(Page, Vec<FieldId>)> {
        let mut page = Page::from_html(html)?;
        let mut factory = FormFactory::new();
        factory.register(Checkbox);
        let root = page.dom().root();
        let fields = factory.scan(&mut page, root, &ScanOptions::new())?;
        Ok((page, fields))
    }

    #[test]
    fn builds_a_hidden_stand_in_before_the_input() -> Result<()> {
        let (page, fields) = scan("<label><input id='agree' type='checkbox' checked></label>")?;
        assert_eq!(fields.len(), 1);
        let input = page.select_one("#agree")?;
        let custom = page.select_one("#custom-agree")?;
        assert_eq!(page.dom().parent(custom), page.dom().parent(input));
        assert_eq!(page.dom().children(page.dom().parent(input).ok_or(Error::SelectorNotFound("label".into()))?), &[custom, input]);
        page.assert_has_class("#custom-agree", "custom-checkbox", true)?;
        page.assert_has_class("#custom-agree", HIDDEN_CLASS, true)?;
        page.assert_has_class("#custom-agree", CHECKED_CLASS, true)?;
        page.assert_style("#agree", "position", "absolute")?;
        page.assert_style("#agree", "left", "-9999px")?;
        Ok(())
    }

    #[test]
    fn clicking_the_stand_in_toggles_the_input() -> Result<()> {
        let (mut page, fields) = scan("<input name='news' type='checkbox'>")?;
        page.assert_has_class("#custom-news", CHECKED_CLASS, false)?;
        page.click("#custom-news")?;
        page.assert_checked("input[name=news]", true)?;
        page.assert_has_class("#custom-news", CHECKED_CLASS, true)?;
        page.click("#custom-news")?;
        page.assert_checked("input[name=news]", false)?;
        page.assert_has_class("#custom-news", CHECKED_CLASS, false)?;
        assert_eq!(page.field(fields[0]).map(|model| model.value()), Some("on"));
        Ok(())
    }

    #[test]
    fn native_changes_and_focus_are_mirrored() -> Result<()> {
        let (mut page, _) = scan("<input id='c' type='checkbox'>")?;
        page.set_checked("#c", true)?;
        page.assert_has_class("#custom-c", CHECKED_CLASS, true)?;
        page.focus("#c")?;
        page.assert_has_class("#custom-c", FOCUS_CLASS, true)?;
        page.blur("#c")?;
        page.assert_has_class("#custom-c", FOCUS_CLASS, false)?;
        Ok(())
    }

    #[test]
    fn auto_hide_off_leaves_the_input_visible() -> Result<()> {
        let mut page = Page::from_html("<input id='c' type='checkbox'>")?;
        let mut factory = FormFactory::new();
        factory.register(Checkbox);
        let root = page.dom().root();
        let options = ScanOptions::from_json(serde_json::json!({
            "checkbox": {"autoHide": false, "classPrefix": "cb-"}
        }))?;
        factory.scan(&mut page, root, &options)?;
        page.assert_style("#c", "position", "")?;
        page.assert_has_class("#cb-c", "cb-checkbox", true)?;
        Ok(())
    }
}
