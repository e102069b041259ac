use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorPseudoClass {
    Checked,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
    pub(crate) pseudo_classes: Vec<SelectorPseudoClass>,
}

/// Compound selectors joined by the descendant combinator, e.g.
/// `form .custom-radio[name=color]:checked`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selector {
    steps: Vec<SelectorStep>,
}

impl Selector {
    pub(crate) fn parse(selector: &str) -> Result<Self> {
        let steps = tokenize_selector(selector)?
            .iter()
            .map(|part| parse_selector_step(part))
            .collect::<Result<Vec<_>>>()?;
        if steps.is_empty() {
            return Err(Error::UnsupportedSelector(selector.into()));
        }
        Ok(Self { steps })
    }

    pub(crate) fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let Some((last, ancestors)) = self.steps.split_last() else {
            return false;
        };
        if !step_matches(dom, node, last) {
            return false;
        }

        let mut cursor = dom.parent(node);
        for step in ancestors.iter().rev() {
            loop {
                let Some(candidate) = cursor else {
                    return false;
                };
                cursor = dom.parent(candidate);
                if step_matches(dom, candidate, step) {
                    break;
                }
            }
        }
        true
    }
}

impl Dom {
    /// Connected elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let parsed = Selector::parse(selector)?;
        Ok(self
            .all_element_nodes()
            .into_iter()
            .filter(|node| parsed.matches(self, *node))
            .collect())
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        if let Some(id) = simple_id_selector(selector) {
            return Ok(self.by_id(id));
        }
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }
}

fn simple_id_selector(selector: &str) -> Option<&str> {
    let id = selector.trim().strip_prefix('#')?;
    (!id.is_empty() && id.bytes().all(is_selector_ident_char)).then_some(id)
}

fn step_matches(dom: &Dom, node: NodeId, step: &SelectorStep) -> bool {
    let Some(tag) = dom.tag_name(node) else {
        return false;
    };
    if let Some(expected) = &step.tag {
        if !expected.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if dom.attr(node, "id").as_deref() != Some(id.as_str()) {
            return false;
        }
    }
    if !step.classes.iter().all(|class| dom.has_class(node, class)) {
        return false;
    }
    let attrs_match = step.attrs.iter().all(|condition| match condition {
        SelectorAttrCondition::Exists { key } => dom.has_attr(node, key),
        SelectorAttrCondition::Eq { key, value } => {
            dom.attr(node, key).as_deref() == Some(value.as_str())
        }
    });
    if !attrs_match {
        return false;
    }
    step.pseudo_classes.iter().all(|pseudo| match pseudo {
        SelectorPseudoClass::Checked => {
            dom.checked(node).unwrap_or(false)
                || (dom.tag_name(node) == Some("option") && dom.has_attr(node, "selected"))
        }
        SelectorPseudoClass::Disabled => dom.disabled(node),
    })
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in selector.trim().chars() {
        match (quote, ch) {
            (Some(open), c) if c == open => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '[') => {
                bracket_depth += 1;
                current.push(ch);
            }
            (None, ']') => {
                bracket_depth = bracket_depth.saturating_sub(1);
                current.push(ch);
            }
            (None, c) if c.is_whitespace() && bracket_depth == 0 => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            (None, '>' | '+' | '~' | ',') if bracket_depth == 0 => {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            (None, c) => current.push(c),
        }
    }

    if quote.is_some() || bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    if !current.is_empty() {
        parts.push(current);
    }
    Ok(parts)
}

pub(crate) fn parse_selector_step(part: &str) -> Result<SelectorStep> {
    let part = part.trim();
    if part.is_empty() {
        return Err(Error::UnsupportedSelector(part.into()));
    }

    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut step = SelectorStep::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                i += 1;
                let Some((id, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                if step.id.replace(id).is_some() {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                i = next;
            }
            b'.' => {
                i += 1;
                let Some((class_name, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.classes.push(class_name);
                i = next;
            }
            b'[' => {
                let (attr, next) = parse_selector_attr_condition(part, i)?;
                step.attrs.push(attr);
                i = next;
            }
            b':' => {
                let Some((pseudo, next)) = parse_selector_pseudo(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.pseudo_classes.push(pseudo);
                i = next;
            }
            _ => {
                if step.tag.is_some()
                    || step.id.is_some()
                    || !step.classes.is_empty()
                    || step.universal
                {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                let Some((tag, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }

    Ok(step)
}

fn parse_selector_pseudo(part: &str, start: usize) -> Option<(SelectorPseudoClass, usize)> {
    let (name, end) = parse_selector_ident(part, start + 1)?;
    let pseudo = match name.as_str() {
        "checked" => SelectorPseudoClass::Checked,
        "disabled" => SelectorPseudoClass::Disabled,
        _ => return None,
    };
    Some((pseudo, end))
}

fn parse_selector_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    if start >= bytes.len() || !is_selector_ident_char(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_selector_ident_char(bytes[end]) {
        end += 1;
    }
    Some((src.get(start..end)?.to_string(), end))
}

fn is_selector_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn parse_selector_attr_condition(
    src: &str,
    open_bracket: usize,
) -> Result<(SelectorAttrCondition, usize)> {
    let close = src[open_bracket..]
        .find(']')
        .map(|offset| open_bracket + offset)
        .ok_or_else(|| Error::UnsupportedSelector(src.into()))?;
    let body = src
        .get(open_bracket + 1..close)
        .ok_or_else(|| Error::UnsupportedSelector(src.into()))?;

    let condition = match body.split_once('=') {
        None => {
            let key = body.trim().to_ascii_lowercase();
            if key.is_empty() || !key.bytes().all(is_selector_attr_name_char) {
                return Err(Error::UnsupportedSelector(src.into()));
            }
            SelectorAttrCondition::Exists { key }
        }
        Some((key, value)) => {
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() || !key.bytes().all(is_selector_attr_name_char) {
                return Err(Error::UnsupportedSelector(src.into()));
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            SelectorAttrCondition::Eq {
                key,
                value: value.to_string(),
            }
        }
    };

    Ok((condition, close + 1))
}

fn is_selector_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_steps() -> Result<()> {
        let step = parse_selector_step("input.a.b[type='radio'][name]:checked")?;
        assert_eq!(step.tag.as_deref(), Some("input"));
        assert_eq!(step.classes, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            step.attrs,
            vec![
                SelectorAttrCondition::Eq {
                    key: "type".into(),
                    value: "radio".into()
                },
                SelectorAttrCondition::Exists { key: "name".into() },
            ]
        );
        assert_eq!(step.pseudo_classes, vec![SelectorPseudoClass::Checked]);
        Ok(())
    }

    #[test]
    fn descendant_combinator_walks_ancestors() -> Result<()> {
        let dom = html::parse_html(
            "<form id='f'><div><input id='a' type='text'></div></form><input id='b' type='text'>",
        )?;
        let found = dom.query_selector_all("form input[type=text]")?;
        assert_eq!(found.len(), 1);
        assert_eq!(dom.attr(found[0], "id").as_deref(), Some("a"));
        assert_eq!(dom.query_selector("#b")?, dom.by_id("b"));
        Ok(())
    }

    #[test]
    fn child_combinator_is_rejected() {
        assert!(matches!(
            Selector::parse("form > input"),
            Err(Error::UnsupportedSelector(_))
        ));
    }
}
