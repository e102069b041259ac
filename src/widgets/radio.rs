use super::*;

/// `input[type=radio]`: one anchor per radio, grouped by a class derived
/// from the radio's `name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Radio;

impl WidgetAdapter for Radio {
    fn name(&self) -> &str {
        "radio"
    }

    fn blueprint(&self) -> Blueprint {
        Blueprint::tag("input").filter("input", "type", "radio")
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

        let group = page.dom().attr(element, "name").unwrap_or_default();
        let class = format!("{}radio", settings.class_prefix);
        let group_class = format!("{class}-{group}");
        let custom = page.dom_mut().create_detached_element(&settings.custom_ele);

        let markup_group_class = group_class.clone();
        let options = FieldOptions::<Dom>::new(element)
            .validators(validators)
            .validator(checked_validator())
            .on_ready(move |_, dom| {
                if settings.auto_hide {
                    apply_css(dom, element, &settings.hide_css)?;
                }
                let value = dom.value(element)?;
                dom.set_attr(
                    custom,
                    "id",
                    &format!("{}{group}-{value}", settings.class_prefix),
                )?;
                dom.set_attr(
                    custom,
                    "class",
                    &format!("{class} {HIDDEN_CLASS} {markup_group_class}"),
                )?;
                dom.insert_before(element, custom)
            });

        let mut model = FieldModel::new(page.dom_mut(), options)?;
        model.bind(
            VALIDATE,
            listener::<Dom, _>(move |_, dom, event| {
                if !passed(event) {
                    dom.remove_class(custom, CHECKED_CLASS);
                    return;
                }
                // Stand-ins sit next to their radio, so they share its form owner.
                let form = dom.closest(element, "form");
                for member in dom.elements_with_class(&group_class) {
                    if dom.closest(member, "form") == form {
                        dom.remove_class(member, CHECKED_CLASS);
                    }
                }
                dom.add_class(custom, CHECKED_CLASS);
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
                page.dom_mut().set_checked(element, true)?;
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

    const COLORS: &str = "<form>\
        <input type='radio' name='color' value='red' checked>\
        <input type='radio' name='color' value='blue'>\
        <input type='radio' name='size' value='xl' checked>\
        </form>";

    fn scan(html: &str) -> Result<Page> {
        let mut page = Page::from_html(html)?;
        let mut factory = FormFactory::new();
        factory.register(Radio);
        let root = page.dom().root();
        factory.scan(&mut page, root, &ScanOptions::new())?;
        Ok(page)
    }

    #[test]
    fn stand_ins_are_named_after_group_and_value() -> Result<()> {
        let page = scan(COLORS)?;
        page.assert_has_class("#custom-color-red", "custom-radio-color", true)?;
        page.assert_has_class("#custom-color-blue", "custom-radio-color", true)?;
        page.assert_has_class("#custom-color-blue", HIDDEN_CLASS, true)?;
        page.assert_has_class("#custom-color-red", CHECKED_CLASS, true)?;
        page.assert_has_class("#custom-color-blue", CHECKED_CLASS, false)?;
        page.assert_has_class("#custom-size-xl", CHECKED_CLASS, true)?;
        Ok(())
    }

    #[test]
    fn clicking_a_stand_in_moves_the_group_selection() -> Result<()> {
        let mut page = scan(COLORS)?;
        page.click("#custom-color-blue")?;
        page.assert_checked("input[value=blue]", true)?;
        page.assert_checked("input[value=red]", false)?;
        page.assert_has_class("#custom-color-blue", CHECKED_CLASS, true)?;
        page.assert_has_class("#custom-color-red", CHECKED_CLASS, false)?;
        page.assert_has_class("#custom-size-xl", CHECKED_CLASS, true)?;
        Ok(())
    }

    #[test]
    fn groups_with_the_same_name_in_different_forms_stay_apart() -> Result<()> {
        let mut page = scan(
            "<form id='monthly'>\
             <input type='radio' name='plan' value='a1' checked>\
             <input type='radio' name='plan' value='a2'>\
             </form>\
             <form id='yearly'>\
             <input type='radio' name='plan' value='b1'>\
             <input type='radio' name='plan' value='b2' checked>\
             </form>",
        )?;
        page.click("#custom-plan-b1")?;
        page.assert_checked("input[value=a1]", true)?;
        page.assert_has_class("#custom-plan-a1", CHECKED_CLASS, true)?;
        page.assert_checked("input[value=b1]", true)?;
        page.assert_checked("input[value=b2]", false)?;
        page.assert_has_class("#custom-plan-b1", CHECKED_CLASS, true)?;
        page.assert_has_class("#custom-plan-b2", CHECKED_CLASS, false)?;

        page.click("input[value=a2]")?;
        page.assert_has_class("#custom-plan-a2", CHECKED_CLASS, true)?;
        page.assert_has_class("#custom-plan-a1", CHECKED_CLASS, false)?;
        page.assert_has_class("#custom-plan-b1", CHECKED_CLASS, true)?;
        Ok(())
    }

    #[test]
    fn clicking_the_native_radio_updates_the_stand_ins() -> Result<()> {
        let mut page = scan(COLORS)?;
        page.click("input[value=blue]")?;
        page.assert_has_class("#custom-color-blue", CHECKED_CLASS, true)?;
        page.assert_has_class("#custom-color-red", CHECKED_CLASS, false)?;
        Ok(())
    }
}
