//! Declarative element matching: which adapter claims which element.

use super::*;

/// Accepted value(s) for one filtered attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptedValue {
    One(String),
    AnyOf(Vec<String>),
}

impl AcceptedValue {
    pub fn accepts(&self, actual: &str) -> bool {
        match self {
            Self::One(expected) => expected == actual,
            Self::AnyOf(expected) => expected.iter().any(|value| value == actual),
        }
    }
}

impl From<&str> for AcceptedValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<&[&str]> for AcceptedValue {
    fn from(values: &[&str]) -> Self {
        Self::AnyOf(values.iter().map(|value| value.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for AcceptedValue {
    fn from(values: [&str; N]) -> Self {
        Self::from(&values[..])
    }
}

/// Attribute name to accepted value(s). Every entry must hold.
pub type AttributeFilter = BTreeMap<String, AcceptedValue>;

/// Tag names an adapter claims, with optional per-tag attribute filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blueprint {
    tag_names: Vec<String>,
    filters: BTreeMap<String, AttributeFilter>,
}

impl Blueprint {
    pub fn tag(tag_name: &str) -> Self {
        Self::tags([tag_name])
    }

    pub fn tags<'a>(tag_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            tag_names: tag_names
                .into_iter()
                .map(|tag| tag.to_ascii_lowercase())
                .collect(),
            filters: BTreeMap::new(),
        }
    }

    /// Restricts elements of `tag_name` to those whose `attribute` is accepted.
    pub fn filter(
        mut self,
        tag_name: &str,
        attribute: &str,
        accepted: impl Into<AcceptedValue>,
    ) -> Self {
        self.filters
            .entry(tag_name.to_ascii_lowercase())
            .or_default()
            .insert(attribute.to_ascii_lowercase(), accepted.into());
        self
    }

    pub fn tag_names(&self) -> &[String] {
        &self.tag_names
    }

    pub fn filter_for(&self, tag_name: &str) -> Option<&AttributeFilter> {
        self.filters.get(&tag_name.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    adapter: String,
    filter: Option<AttributeFilter>,
}

impl Candidate {
    fn accepts(&self, attr: &dyn Fn(&str) -> Option<String>) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        filter.iter().all(|(name, accepted)| {
            attr(name).is_some_and(|actual| accepted.accepts(&actual))
        })
    }
}

/// Tag-indexed blueprint candidates in registration order.
#[derive(Debug, Clone, Default)]
pub struct BlueprintRegistry {
    by_tag: HashMap<String, Vec<Candidate>>,
}

impl BlueprintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_blueprint(&mut self, adapter: &str, blueprint: &Blueprint) {
        for tag in blueprint.tag_names() {
            let candidate = Candidate {
                adapter: adapter.to_string(),
                filter: blueprint.filter_for(tag).cloned(),
            };
            tracing::trace!(
                adapter,
                tag = %tag,
                filtered = candidate.filter.is_some(),
                "registered blueprint candidate"
            );
            self.by_tag.entry(tag.clone()).or_default().push(candidate);
        }
    }

    pub fn supports_tag(&self, tag_name: &str) -> bool {
        self.by_tag.contains_key(&tag_name.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// Adapter claiming the element, first matching candidate wins.
    pub fn match_element(&self, dom: &Dom, node: NodeId) -> Option<&str> {
        let tag = dom.tag_name(node)?;
        self.match_attributes(tag, &|name| dom.attr(node, name))
    }

    /// Matching against an arbitrary attribute source.
    pub fn match_attributes(
        &self,
        tag_name: &str,
        attr: &dyn Fn(&str) -> Option<String>,
    ) -> Option<&str> {
        self.by_tag
            .get(&tag_name.to_ascii_lowercase())?
            .iter()
            .find(|candidate| candidate.accepts(attr))
            .map(|candidate| candidate.adapter.as_str())
    }
}
