use super::*;

pub type OptionMap = serde_json::Map<String, Value>;

/// Inline CSS declarations, property name to value.
pub type CssMap = BTreeMap<String, String>;

pub(crate) fn css_map(pairs: &[(&str, &str)]) -> CssMap {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Recursively merges `source` into `target`: nested objects are merged key
/// by key, every other value in `source` replaces the one in `target`.
pub fn deep_merge(target: &mut OptionMap, source: &OptionMap) {
    for (key, incoming) in source {
        if let (Some(Value::Object(existing)), Value::Object(nested)) =
            (target.get_mut(key), incoming)
        {
            deep_merge(existing, nested);
            continue;
        }
        target.insert(key.clone(), incoming.clone());
    }
}

/// Case-insensitive key lookup.
pub(crate) fn get_ignore_case<'a>(map: &'a OptionMap, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}

/// Overlays `options` on the serialised `defaults` and reads the result
/// back as typed settings.
pub(crate) fn resolve_settings<T>(adapter: &str, defaults: &T, options: &OptionMap) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let invalid = |source| Error::InvalidSettings {
        adapter: adapter.to_string(),
        source,
    };
    let mut merged = match serde_json::to_value(defaults).map_err(invalid)? {
        Value::Object(map) => map,
        _ => OptionMap::new(),
    };
    deep_merge(&mut merged, options);
    serde_json::from_value(Value::Object(merged)).map_err(invalid)
}

/// Options for one [`FormFactory::scan`](crate::FormFactory::scan) call.
///
/// Top-level keys are either global settings, applied to every adapter, or
/// an adapter name (any case) holding settings for that adapter only.
/// Validators cannot be expressed as JSON and are attached per adapter.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    values: OptionMap,
    validators: Vec<(String, Validator<Dom>)>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self {
                values,
                validators: Vec::new(),
            }),
            other => Err(Error::InvalidOptions(format!(
                "scan options must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Adds a validator to every field the named adapter creates. These run
    /// after the built-in non-empty check and before the adapter's own.
    pub fn validator_for(mut self, adapter: &str, validator: Validator<Dom>) -> Self {
        self.validators.push((adapter.to_ascii_lowercase(), validator));
        self
    }

    pub fn values(&self) -> &OptionMap {
        &self.values
    }

    pub(crate) fn adapter_section(&self, adapter: &str) -> Option<&OptionMap> {
        get_ignore_case(&self.values, adapter).and_then(Value::as_object)
    }

    pub(crate) fn validators_for(&self, adapter: &str) -> Vec<Validator<Dom>> {
        self.validators
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(adapter))
            .map(|(_, validator)| validator.clone())
            .collect()
    }
}
