//! Styleable custom form widgets bound to native form controls.
//!
//! A [`FieldModel`] caches the value of one native element, runs a chain of
//! [`Validator`]s against it and dispatches named events to listeners. The
//! [`FormFactory`] scans a document subtree, matches elements against
//! [`Blueprint`]s and hands each match to a [`WidgetAdapter`] that builds the
//! custom markup around the native control.
//!
//! The document is an in-process [`Dom`] owned by a [`Page`], which also
//! models the user interactions (click, focus, typing, ...) that drive the
//! widgets.
//!
//! ```
//! use custom_forms::{FormFactory, Page, ScanOptions};
//!
//! let mut page = Page::from_html("<form><input id='tos' type='checkbox'></form>")?;
//! let mut factory = FormFactory::with_default_adapters();
//! let root = page.dom().root();
//! factory.scan(&mut page, root, &ScanOptions::new())?;
//!
//! page.click("#custom-tos")?;
//! page.assert_checked("#tos", true)?;
//! page.assert_has_class("#custom-tos", "checked", true)?;
//! # Ok::<(), custom_forms::Error>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod dom;
mod factory;
pub mod field;
mod html;
mod matcher;
mod options;
mod page;
mod selector;
pub mod widgets;

pub use dom::{Dom, NodeId};
pub use factory::{FormFactory, WidgetAdapter};
pub use field::{
    CustomEvent, EventPayload, FieldEvent, FieldHost, FieldModel, FieldOptions, Listener,
    ValidationResult, Validator, listener,
};
pub use matcher::{AcceptedValue, AttributeFilter, Blueprint, BlueprintRegistry};
pub use options::{CssMap, OptionMap, ScanOptions, deep_merge};
pub use page::{DomEvent, DomListener, FieldId, ListenerId, Page, dom_listener};

pub(crate) use field::VALIDATE;
pub(crate) use options::{css_map, resolve_settings};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("html parse error: {0}")]
    HtmlParse(String),
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("type mismatch for {selector}: expected {expected}, actual {actual}")]
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    #[error("not an element: {0}")]
    NotAnElement(String),
    #[error("invalid tree operation: {0}")]
    InvalidTreeOperation(String),
    #[error("invalid settings for adapter `{adapter}`: {source}")]
    InvalidSettings {
        adapter: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },
    #[error(
        "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
    )]
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}
