//! Property values and property maps carried by descriptions.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

/// A shared event callback.
///
/// Handlers compare by identity: two handlers are equal only when they
/// wrap the same callback instance. Rebinding an event property to a new
/// closure therefore always counts as a change, even if the closure body
/// is identical.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&PropValue)>);

impl Handler {
    /// Wrap a callback.
    pub fn new(callback: impl Fn(&PropValue) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    /// Invoke the callback with an event payload.
    pub fn call(&self, payload: &PropValue) {
        (self.0)(payload);
    }

    /// Whether both handles point at the same callback instance.
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// A single property value.
#[derive(Clone, Debug)]
pub enum PropValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Handler(Handler),
}

impl PropValue {
    /// Returns the handler if this value is one.
    pub const fn as_handler(&self) -> Option<&Handler> {
        match self {
            Self::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    /// Returns the string slice if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this value can be rendered as text content.
    pub const fn is_primitive(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Number(_) | Self::Str(_))
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            // total_cmp keeps NaN equal to itself so re-renders stay no-ops
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b) == Ordering::Equal,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a.same_as(b),
            _ => false,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{value:.0}")
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
            Self::Handler(_) => f.write_str("[handler]"),
        }
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Number(value) => serializer.serialize_f64(*value),
            Self::Str(value) => serializer.serialize_str(value),
            Self::Handler(_) => serializer.serialize_str("[handler]"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Handler> for PropValue {
    fn from(value: Handler) -> Self {
        Self::Handler(value)
    }
}

/// Property mapping of a description, ordered by key.
///
/// The reserved `children` key never appears here; children live in the
/// description's own ordered list.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Props(BTreeMap<String, PropValue>);

impl Props {
    /// Create an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a property, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a property.
    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.0.remove(key)
    }

    /// Look up a property.
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no properties.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_handler_identity() {
        let f = Handler::new(|_| {});
        let g = Handler::new(|_| {});
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn test_handler_call() {
        let seen = Rc::new(Cell::new(false));
        let flag = Rc::clone(&seen);
        let handler = Handler::new(move |_| flag.set(true));
        handler.call(&PropValue::Null);
        assert!(seen.get());
    }

    #[test]
    fn test_nan_equals_itself() {
        assert_eq!(PropValue::Number(f64::NAN), PropValue::Number(f64::NAN));
        assert_ne!(PropValue::Number(1.0), PropValue::Str("1".into()));
    }

    #[test]
    fn test_display_integers_without_fraction() {
        assert_eq!(PropValue::from(3).to_string(), "3");
        assert_eq!(PropValue::from(2.5).to_string(), "2.5");
        assert_eq!(PropValue::Null.to_string(), "");
    }

    #[test]
    fn test_props_builder_and_lookup() {
        let props = Props::new().with("id", "foo").with("tabIndex", 2);
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("id").and_then(PropValue::as_str), Some("foo"));
        assert!(!props.contains_key("class"));
    }

    #[test]
    fn test_props_serialize_as_map() {
        let props = Props::new().with("id", "foo").with("hidden", true);
        let json = serde_json::to_string(&props).ok();
        assert_eq!(json.as_deref(), Some(r#"{"hidden":true,"id":"foo"}"#));
    }
}
