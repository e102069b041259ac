//! The built-in widget adapters and the settings they share.
//!
//! Every adapter keeps the native element in the document as the source of
//! truth and renders a styleable stand-in next to it.

use super::*;

mod checkbox;
mod file;
mod radio;
mod select;
mod text;

pub use checkbox::Checkbox;
pub use file::File;
pub use radio::Radio;
pub use select::Select;
pub use text::{Text, TextSettings};

/// Class marking the stand-in of a hidden checkbox or radio.
pub const HIDDEN_CLASS: &str = "customForm-hidden";

/// Class toggled on the stand-in while the native element has focus.
pub const FOCUS_CLASS: &str = "focus";

/// Class toggled on checkbox and radio stand-ins mirroring `checked`.
pub const CHECKED_CLASS: &str = "checked";

/// Settings of the checkbox and radio adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToggleSettings {
    pub active: bool,
    pub custom_ele: String,
    pub container_ele: String,
    pub auto_hide: bool,
    pub class_prefix: String,
    pub hide_css: CssMap,
}

impl Default for ToggleSettings {
    fn default() -> Self {
        Self {
            active: true,
            custom_ele: "a".into(),
            container_ele: "div".into(),
            auto_hide: true,
            class_prefix: "custom-".into(),
            hide_css: css_map(&[("position", "absolute"), ("left", "-9999px")]),
        }
    }
}

/// Settings of the adapters that wrap the native element in a container
/// (file and select).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSettings {
    pub active: bool,
    pub custom_ele: String,
    pub container_ele: String,
    pub auto_hide: bool,
    pub class_prefix: String,
    /// Text shown while no file is chosen. Unused by selects.
    #[serde(default)]
    pub holder_txt: String,
    pub hide_css: CssMap,
    pub el_css: CssMap,
    pub custom_container_css: CssMap,
    pub custom_el_css: CssMap,
}

impl ContainerSettings {
    fn base(el_css: CssMap) -> Self {
        Self {
            active: true,
            custom_ele: "a".into(),
            container_ele: "div".into(),
            auto_hide: true,
            class_prefix: "custom-".into(),
            holder_txt: String::new(),
            hide_css: css_map(&[
                ("opacity", "0"),
                ("filter", "alpha(opacity=0)"),
                ("position", "absolute"),
                ("top", "0px"),
                ("left", "0px"),
                ("-moz-opacity", "0"),
                ("-khtml-opacity", "0"),
            ]),
            el_css,
            custom_container_css: css_map(&[("position", "relative")]),
            custom_el_css: css_map(&[
                ("display", "block"),
                ("overflow", "hidden"),
                ("white-space", "nowrap"),
                ("text-overflow", "ellipsis"),
            ]),
        }
    }

    pub fn file() -> Self {
        Self {
            holder_txt: "Upload..".into(),
            ..Self::base(css_map(&[
                ("display", "block"),
                ("text-align", "left"),
                ("-moz-appearance", "none"),
                ("-webkit-appearance", "none"),
            ]))
        }
    }

    pub fn select() -> Self {
        Self::base(css_map(&[
            ("display", "block"),
            ("-webkit-appearance", "none"),
            ("-moz-appearance", "none"),
        ]))
    }
}

/// `prefix` followed by the element's `id`, or its `name` when it has no id.
pub(crate) fn prefixed_id(dom: &Dom, element: NodeId, prefix: &str) -> String {
    let key = dom
        .attr(element, "id")
        .filter(|id| !id.is_empty())
        .or_else(|| dom.attr(element, "name"))
        .unwrap_or_default();
    format!("{prefix}{key}")
}

pub(crate) fn apply_css(dom: &mut Dom, node: NodeId, css: &CssMap) -> Result<()> {
    dom.set_styles(node, css.iter().map(|(name, value)| (name.as_str(), value.as_str())))
}

/// Toggles [`FOCUS_CLASS`] on `target` while `element` has focus.
pub(crate) fn mirror_focus(page: &mut Page, element: NodeId, target: NodeId) {
    page.add_listener(
        element,
        "focusin",
        dom_listener(move |page, _| {
            page.dom_mut().add_class(target, FOCUS_CLASS);
            Ok(())
        }),
    );
    page.add_listener(
        element,
        "focusout",
        dom_listener(move |page, _| {
            page.dom_mut().remove_class(target, FOCUS_CLASS);
            Ok(())
        }),
    );
}

pub(crate) fn validate_field(page: &mut Page, id: FieldId) {
    page.with_field(id, |model, dom| {
        model.validate(dom, None);
    });
}

/// Re-validates the field whenever its native element changes.
pub(crate) fn validate_on_change(page: &mut Page, element: NodeId, id: FieldId) {
    page.add_listener(
        element,
        "change",
        dom_listener(move |page, _| {
            validate_field(page, id);
            Ok(())
        }),
    );
}

/// Passes while the native checkbox or radio is checked.
pub(crate) fn checked_validator() -> Validator<Dom> {
    Validator::<Dom>::with_host(|dom: &Dom, element: NodeId, _: &str| {
        dom.checked(element).unwrap_or(false)
    })
}

pub(crate) fn passed(event: &FieldEvent<NodeId>) -> bool {
    event.data.as_validation().is_some_and(|result| result.success)
}

/// Container layout shared by the file and select adapters:
/// `<container><element/><custom/></container>` in place of `element`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContainerParts {
    pub(crate) container: NodeId,
    pub(crate) custom: NodeId,
}

impl ContainerParts {
    pub(crate) fn create(dom: &mut Dom, settings: &ContainerSettings) -> Self {
        Self {
            container: dom.create_detached_element(&settings.container_ele),
            custom: dom.create_detached_element(&settings.custom_ele),
        }
    }

    /// `kind` names the widget in ids and classes, e.g. `file`.
    pub(crate) fn build(
        self,
        dom: &mut Dom,
        element: NodeId,
        kind: &str,
        settings: &ContainerSettings,
    ) -> Result<()> {
        let id = prefixed_id(dom, element, &settings.class_prefix);
        let class = format!("{}{kind}", settings.class_prefix);

        if settings.auto_hide {
            apply_css(dom, element, &settings.hide_css)?;
        }

        dom.set_attr(self.container, "id", &format!("{id}-container"))?;
        dom.set_attr(self.container, "class", &format!("{class}-container"))?;
        apply_css(dom, self.container, &settings.custom_container_css)?;

        dom.set_attr(self.custom, "id", &id)?;
        dom.set_attr(self.custom, "class", &class)?;
        apply_css(dom, self.custom, &settings.custom_el_css)?;

        dom.insert_before(element, self.container)?;
        dom.append_child(self.container, element)?;
        dom.append_child(self.container, self.custom)?;

        // No layout engine: only sizes set inline on the container carry over.
        let mut el_css = settings.el_css.clone();
        for property in ["width", "height"] {
            if let Some(size) = dom.style(self.container, property) {
                el_css.insert(property.to_string(), size);
            }
        }
        apply_css(dom, element, &el_css)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefixed_id_prefers_id_over_name() -> Result<()> {
        let dom = html::parse_html("<input id='a' name='n'><input name='m'><input>")?;
        let inputs = dom.query_selector_all("input")?;
        assert_eq!(prefixed_id(&dom, inputs[0], "custom-"), "custom-a");
        assert_eq!(prefixed_id(&dom, inputs[1], "custom-"), "custom-m");
        assert_eq!(prefixed_id(&dom, inputs[2], "x-"), "x-");
        Ok(())
    }

    #[test]
    fn container_settings_merge_css_maps() -> Result<()> {
        let options = match json!({"hideCss": {"opacity": "0.5"}, "holderTxt": "Pick"}) {
            Value::Object(map) => map,
            _ => OptionMap::new(),
        };
        let settings = resolve_settings("file", &ContainerSettings::file(), &options)?;
        assert_eq!(settings.holder_txt, "Pick");
        assert_eq!(settings.hide_css.get("opacity").map(String::as_str), Some("0.5"));
        assert_eq!(settings.hide_css.len(), 7);
        assert_eq!(ContainerSettings::select().holder_txt, "");
        Ok(())
    }

    #[test]
    fn container_build_wraps_the_element() -> Result<()> {
        let mut dom = html::parse_html("<p id='p'><select id='s'></select></p>")?;
        let select = dom.by_id("s").ok_or(Error::SelectorNotFound("#s".into()))?;
        let mut settings = ContainerSettings::select();
        settings
            .custom_container_css
            .insert("width".into(), "120px".into());
        let parts = ContainerParts::create(&mut dom, &settings);
        parts.build(&mut dom, select, "select", &settings)?;

        let paragraph = dom.by_id("p").ok_or(Error::SelectorNotFound("#p".into()))?;
        assert_eq!(dom.children(paragraph), &[parts.container]);
        assert_eq!(dom.children(parts.container), &[select, parts.custom]);
        assert_eq!(dom.attr(parts.container, "id").as_deref(), Some("custom-s-container"));
        assert_eq!(dom.attr(parts.custom, "class").as_deref(), Some("custom-select"));
        assert_eq!(dom.style(select, "opacity").as_deref(), Some("0"));
        assert_eq!(dom.style(select, "display").as_deref(), Some("block"));
        assert_eq!(dom.style(select, "width").as_deref(), Some("120px"));
        assert_eq!(dom.style(select, "height"), None);
        assert_eq!(dom.style(parts.custom, "white-space").as_deref(), Some("nowrap"));
        Ok(())
    }
}
