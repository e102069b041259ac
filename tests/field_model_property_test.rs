use custom_forms::{
    FieldHost, FieldModel, FieldOptions, FormFactory, Page, ScanOptions, Validator, listener,
};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const DEFAULT_PROPTEST_CASES: u32 = 128;

fn proptest_cases() -> u32 {
    std::env::var("CUSTOM_FORMS_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_PROPTEST_CASES)
}

#[derive(Debug, Default)]
struct MemoryHost {
    values: HashMap<u8, String>,
}

impl FieldHost for MemoryHost {
    type Element = u8;

    fn read_value(&self, element: u8) -> String {
        self.values.get(&element).cloned().unwrap_or_default()
    }

    fn write_value(&mut self, element: u8, value: &str) {
        self.values.insert(element, value.to_string());
    }
}

fn value_strategy() -> BoxedStrategy<String> {
    vec(prop_oneof![Just('a'), Just('b'), Just('1'), Just(' ')], 0..=6)
        .prop_map(|chars| chars.into_iter().collect())
        .boxed()
}

#[derive(Clone, Debug)]
enum ModelAction {
    Update(String, bool),
    Save,
    Sync,
    External(String),
}

fn model_action_strategy() -> BoxedStrategy<ModelAction> {
    prop_oneof![
        4 => (value_strategy(), any::<bool>()).prop_map(|(value, force)| ModelAction::Update(value, force)),
        2 => Just(ModelAction::Save),
        2 => Just(ModelAction::Sync),
        1 => value_strategy().prop_map(ModelAction::External),
    ]
    .boxed()
}

/// Values containing a digit are rejected.
fn digit_free() -> Validator<MemoryHost> {
    Validator::new(|value| !value.chars().any(|c| c.is_ascii_digit())).message("no digits")
}

fn is_valid(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(|c| c.is_ascii_digit())
}

fn assert_model_invariants(seed: &str, actions: &[ModelAction]) -> TestCaseResult {
    let mut host = MemoryHost::default();
    host.write_value(0, seed);
    let options = FieldOptions::new(0).validator(digit_free());
    let mut model = FieldModel::new(&mut host, options)
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;

    let updates = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&updates);
    model.bind(
        "update",
        listener::<MemoryHost, _>(move |_, _, event| {
            sink.borrow_mut()
                .push(event.data.as_value().unwrap_or_default().to_string());
        }),
    );

    for (step, action) in actions.iter().enumerate() {
        let before = model.value().to_string();
        let fired_before = updates.borrow().len();
        match action {
            ModelAction::Update(value, force) => {
                model.update(&mut host, value, *force);
                let expected = if *value != before && (*force || is_valid(value)) {
                    value.clone()
                } else {
                    before.clone()
                };
                prop_assert_eq!(model.value(), expected.as_str(), "step {}: {:?}", step, action);
                let fired = updates.borrow().len() - fired_before;
                prop_assert_eq!(fired, usize::from(expected != before));
            }
            ModelAction::Save => {
                model.save(&mut host);
                prop_assert_eq!(host.read_value(0), before);
            }
            ModelAction::Sync => {
                model.sync(&mut host);
                prop_assert_eq!(model.value(), host.read_value(0));
            }
            ModelAction::External(value) => {
                host.write_value(0, value);
                prop_assert_eq!(model.value(), before.as_str());
            }
        }

        let result = model.validate(&mut host, None);
        prop_assert_eq!(result.success, is_valid(model.value()));
        prop_assert_eq!(result.success, result.messages.is_empty());
        prop_assert_eq!(&result, &model.validate(&mut host, None));
    }
    Ok(())
}

#[derive(Clone, Debug)]
enum WidgetAction {
    ClickCustomToggle,
    ClickNativeToggle,
    PickPlan(usize),
    Focus,
    Blur,
    Type(String),
}

const PLANS: [&str; 3] = ["free", "pro", "team"];

const WIDGET_HTML: &str = r#"
<form id="f">
  <input id="toggle" type="checkbox">
  <input type="radio" name="plan" value="free" checked>
  <input type="radio" name="plan" value="pro">
  <input type="radio" name="plan" value="team">
  <input id="name" type="text" placeholder="Name">
</form>
"#;

fn widget_action_strategy() -> BoxedStrategy<WidgetAction> {
    prop_oneof![
        2 => Just(WidgetAction::ClickCustomToggle),
        2 => Just(WidgetAction::ClickNativeToggle),
        3 => (0..PLANS.len()).prop_map(WidgetAction::PickPlan),
        1 => Just(WidgetAction::Focus),
        1 => Just(WidgetAction::Blur),
        2 => value_strategy().prop_map(WidgetAction::Type),
    ]
    .boxed()
}

fn run_widget_action(page: &mut Page, action: &WidgetAction) -> custom_forms::Result<()> {
    match action {
        WidgetAction::ClickCustomToggle => page.click("#custom-toggle"),
        WidgetAction::ClickNativeToggle => page.click("#toggle"),
        WidgetAction::PickPlan(index) => page.click(&format!("#custom-plan-{}", PLANS[*index])),
        WidgetAction::Focus => page.focus("#name"),
        WidgetAction::Blur => page.blur("#name"),
        WidgetAction::Type(text) => page.type_text("#name", text),
    }
}

fn assert_widgets_mirror_native_state(actions: &[WidgetAction]) -> TestCaseResult {
    let fail = |err: custom_forms::Error| TestCaseError::fail(format!("{err:?}"));
    let mut page = Page::from_html(WIDGET_HTML).map_err(fail)?;
    let mut factory = FormFactory::with_default_adapters();
    let root = page.dom().root();
    factory
        .scan(&mut page, root, &ScanOptions::new())
        .map_err(fail)?;

    for (step, action) in actions.iter().enumerate() {
        run_widget_action(&mut page, action).map_err(fail)?;

        let dom = page.dom();
        let toggle = page.select_one("#toggle").map_err(fail)?;
        let custom_toggle = page.select_one("#custom-toggle").map_err(fail)?;
        prop_assert_eq!(
            dom.checked(toggle).map_err(fail)?,
            dom.has_class(custom_toggle, "checked"),
            "step {}: {:?}",
            step,
            action
        );

        let mut checked_plans = 0;
        for plan in PLANS {
            let native = page
                .select_one(&format!("input[value={plan}]"))
                .map_err(fail)?;
            let custom = page
                .select_one(&format!("#custom-plan-{plan}"))
                .map_err(fail)?;
            let checked = dom.checked(native).map_err(fail)?;
            checked_plans += usize::from(checked);
            prop_assert_eq!(checked, dom.has_class(custom, "checked"), "plan {}", plan);
        }
        prop_assert_eq!(checked_plans, 1);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        .. ProptestConfig::default()
    })]

    #[test]
    fn field_model_keeps_its_invariants(
        seed in value_strategy(),
        actions in vec(model_action_strategy(), 1..=20),
    ) {
        assert_model_invariants(&seed, &actions)?;
    }

    #[test]
    fn widgets_mirror_native_state(actions in vec(widget_action_strategy(), 1..=24)) {
        assert_widgets_mirror_native_state(&actions)?;
    }
}
