//! The field model: a cached value, a validator chain and a named-event
//! dispatcher bound to one element of a [`FieldHost`].
//!
//! The model never touches markup itself. Whatever a widget needs to build
//! or re-render is injected through [`FieldOptions::on_ready`] and event
//! listeners, so the model works the same against the document [`Dom`] and
//! against a plain in-memory host.

use super::*;

pub const UPDATE: &str = "update";
pub const SAVE: &str = "save";
pub const SYNC: &str = "sync";
pub const VALIDATE: &str = "validate";

/// Events every field model registers.
pub const BUILTIN_EVENTS: [&str; 4] = [UPDATE, SAVE, SYNC, VALIDATE];

pub(crate) const NON_EMPTY_MESSAGE: &str = "value can't be undefined.";

/// Environment a field reads and writes the native value through.
pub trait FieldHost: 'static {
    type Element: Copy + fmt::Debug + 'static;

    fn read_value(&self, element: Self::Element) -> String;

    fn write_value(&mut self, element: Self::Element, value: &str);

    /// Timestamp stamped on every [`FieldEvent`], in epoch milliseconds.
    fn now_millis(&self) -> i64 {
        system_time_millis()
    }
}

pub(crate) fn system_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Outcome of one [`FieldModel::validate`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub messages: Vec<String>,
}

impl ValidationResult {
    pub fn passed() -> Self {
        Self {
            success: true,
            messages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Empty,
    Value(String),
    Validation(ValidationResult),
    Custom(serde_json::Value),
}

impl EventPayload {
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_validation(&self) -> Option<&ValidationResult> {
        match self {
            Self::Validation(result) => Some(result),
            _ => None,
        }
    }
}

/// Record handed to every listener.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEvent<E> {
    pub element: E,
    pub event: String,
    pub data: EventPayload,
    pub time: i64,
}

pub type Listener<H> =
    Rc<dyn Fn(&mut FieldModel<H>, &mut H, &FieldEvent<<H as FieldHost>::Element>)>;

/// Wraps a closure as a [`Listener`]. Keep the returned handle to `unbind` it later.
pub fn listener<H, F>(f: F) -> Listener<H>
where
    H: FieldHost,
    F: Fn(&mut FieldModel<H>, &mut H, &FieldEvent<H::Element>) + 'static,
{
    Rc::new(f)
}

type Predicate<H> = Rc<dyn Fn(&H, <H as FieldHost>::Element, &str) -> bool>;

pub struct Validator<H: FieldHost> {
    predicate: Predicate<H>,
    message: Option<String>,
}

impl<H: FieldHost> Clone for Validator<H> {
    fn clone(&self) -> Self {
        Self {
            predicate: Rc::clone(&self.predicate),
            message: self.message.clone(),
        }
    }
}

impl<H: FieldHost> fmt::Debug for Validator<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl<H: FieldHost> Validator<H> {
    /// Validator over the candidate value only.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + 'static,
    {
        Self {
            predicate: Rc::new(move |_: &H, _: H::Element, value: &str| predicate(value)),
            message: None,
        }
    }

    /// Validator that may inspect the host, e.g. a checkbox's checkedness.
    pub fn with_host<F>(predicate: F) -> Self
    where
        F: Fn(&H, H::Element, &str) -> bool + 'static,
    {
        Self {
            predicate: Rc::new(predicate),
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn non_empty() -> Self {
        Self::new(|value| !value.is_empty()).message(NON_EMPTY_MESSAGE)
    }

    /// Whole-value regular expression match, like the HTML `pattern` attribute.
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Result<Self> {
        let regex = fancy_regex::Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            Error::InvalidPattern {
                pattern: pattern.to_string(),
                source: Box::new(source),
            }
        })?;
        Ok(Self::new(move |value| regex.is_match(value).unwrap_or(false)).message(message))
    }

    pub fn message_text(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn check(&self, host: &H, element: H::Element, value: &str) -> bool {
        (self.predicate)(host, element, value)
    }
}

/// Custom event declared at construction, optionally with a first listener.
pub struct CustomEvent<H: FieldHost> {
    name: String,
    callback: Option<Listener<H>>,
}

impl<H: FieldHost> From<&str> for CustomEvent<H> {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            callback: None,
        }
    }
}

impl<H: FieldHost> From<String> for CustomEvent<H> {
    fn from(name: String) -> Self {
        Self {
            name,
            callback: None,
        }
    }
}

type ReadyHook<H> = Box<dyn FnOnce(&mut FieldModel<H>, &mut H) -> Result<()>>;

/// Construction options for [`FieldModel::new`].
pub struct FieldOptions<H: FieldHost> {
    element: H::Element,
    validators: Vec<Validator<H>>,
    events: Vec<CustomEvent<H>>,
    on_ready: Option<ReadyHook<H>>,
}

impl<H: FieldHost> FieldOptions<H> {
    pub fn new(element: H::Element) -> Self {
        Self {
            element,
            validators: Vec::new(),
            events: Vec::new(),
            on_ready: None,
        }
    }

    pub fn validator(mut self, validator: Validator<H>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn validators(mut self, validators: impl IntoIterator<Item = Validator<H>>) -> Self {
        self.validators.extend(validators);
        self
    }

    pub fn event(mut self, event: impl Into<CustomEvent<H>>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn event_with(mut self, name: &str, callback: Listener<H>) -> Self {
        self.events.push(CustomEvent {
            name: name.to_string(),
            callback: Some(callback),
        });
        self
    }

    /// Runs once, after events and validators are in place and before
    /// [`FieldModel::new`] returns.
    pub fn on_ready<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut FieldModel<H>, &mut H) -> Result<()> + 'static,
    {
        self.on_ready = Some(Box::new(hook));
        self
    }
}

pub struct FieldModel<H: FieldHost> {
    element: H::Element,
    value: String,
    events: HashMap<String, Vec<Listener<H>>>,
    validators: Vec<Validator<H>>,
}

impl<H: FieldHost> fmt::Debug for FieldModel<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events = self.events.keys().collect::<Vec<_>>();
        events.sort();
        f.debug_struct("FieldModel")
            .field("element", &self.element)
            .field("value", &self.value)
            .field("events", &events)
            .field("validators", &self.validators)
            .finish()
    }
}

impl<H: FieldHost> FieldModel<H> {
    /// Binds to `options.element`, seeds the cached value from it, registers
    /// the built-in and custom events, builds the validator chain (non-empty
    /// check first) and finally runs the ready hook.
    pub fn new(host: &mut H, options: FieldOptions<H>) -> Result<Self> {
        let FieldOptions {
            element,
            validators,
            events,
            on_ready,
        } = options;

        let mut model = Self {
            element,
            value: host.read_value(element),
            events: HashMap::new(),
            validators: Vec::with_capacity(validators.len() + 1),
        };

        for name in BUILTIN_EVENTS {
            model.events.insert(name.to_string(), Vec::new());
        }
        for custom in events {
            let listeners = model.events.entry(custom.name).or_default();
            if let Some(callback) = custom.callback {
                listeners.push(callback);
            }
        }

        model.validators.push(Validator::non_empty());
        model.validators.extend(validators);

        if let Some(hook) = on_ready {
            hook(&mut model, host)?;
        }
        Ok(model)
    }

    pub fn element(&self) -> H::Element {
        self.element
    }

    /// Cached value. May differ from the element's value until the next
    /// `save` or `sync`.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.events.contains_key(event)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events.get(event).map(Vec::len).unwrap_or(0)
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// Appends a listener. Unregistered event names are ignored.
    pub fn bind(&mut self, event: &str, listener: Listener<H>) -> &mut Self {
        match self.events.get_mut(event) {
            Some(listeners) => listeners.push(listener),
            None => tracing::debug!(event, "bind ignored: event is not registered on this field"),
        }
        self
    }

    /// Removes the first listener that is the same `Rc` as `listener`.
    pub fn unbind(&mut self, event: &str, listener: &Listener<H>) -> &mut Self {
        let Some(listeners) = self.events.get_mut(event) else {
            tracing::debug!(event, "unbind ignored: event is not registered on this field");
            return self;
        };
        if let Some(position) = listeners
            .iter()
            .position(|existing| Rc::ptr_eq(existing, listener))
        {
            listeners.remove(position);
        }
        self
    }

    /// Replaces the cached value when it changed and either passes validation
    /// or `force` is set. Validation runs (and fires `validate`) even when forced.
    pub fn update(&mut self, host: &mut H, value: &str, force: bool) -> &mut Self {
        if self.value == value {
            return self;
        }
        let valid = self.validate(host, Some(value)).success;
        if valid || force {
            self.value = value.to_string();
            let payload = EventPayload::Value(self.value.clone());
            self.trigger(host, UPDATE, payload);
        }
        self
    }

    /// Writes the cached value into the element.
    pub fn save(&mut self, host: &mut H) -> &mut Self {
        host.write_value(self.element, &self.value);
        let payload = EventPayload::Value(self.value.clone());
        self.trigger(host, SAVE, payload)
    }

    /// Reloads the cached value from the element.
    pub fn sync(&mut self, host: &mut H) -> &mut Self {
        self.value = host.read_value(self.element);
        let payload = EventPayload::Value(self.value.clone());
        self.trigger(host, SYNC, payload)
    }

    /// Runs the whole validator chain against `value` (or the cached value)
    /// and collects every failure message.
    pub fn validate(&mut self, host: &mut H, value: Option<&str>) -> ValidationResult {
        let candidate = value.map_or_else(|| self.value.clone(), str::to_owned);
        let mut result = ValidationResult::passed();

        for validator in &self.validators {
            if !validator.check(host, self.element, &candidate) {
                result.success = false;
                result.messages.push(
                    validator
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("\"{candidate}\" is not a valid value.")),
                );
            }
        }

        self.trigger(host, VALIDATE, EventPayload::Validation(result.clone()));
        result
    }

    /// Calls the listeners registered for `event` in registration order.
    /// Listeners added or removed while dispatching take effect on the next trigger.
    pub fn trigger(&mut self, host: &mut H, event: &str, data: EventPayload) -> &mut Self {
        let Some(listeners) = self.events.get(event).cloned() else {
            tracing::debug!(event, "trigger ignored: event is not registered on this field");
            return self;
        };

        tracing::trace!(event, listeners = listeners.len(), "dispatching field event");
        for listener in listeners {
            let record = FieldEvent {
                element: self.element,
                event: event.to_string(),
                data: data.clone(),
                time: host.now_millis(),
            };
            listener(&mut *self, &mut *host, &record);
        }
        self
    }
}
