//! State events: translated platform callbacks bound for the client.
//!
//! A [`StateEvent`] is a name plus an ordered bag of primitive
//! properties. Names are always `<category prefix><suffix>`; see
//! [`translate`] for the per-category tables.

pub mod sink;
pub mod translate;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use sink::EventSink;

/// A primitive property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(n) => write!(f, "{n}"),
            PropertyValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Insertion-ordered property bag.
pub type PropertyBag = IndexMap<String, PropertyValue>;

/// A translated state event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEvent {
    pub name: String,
    pub properties: PropertyBag,
}

impl StateEvent {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self {
            name: format!("{prefix}{suffix}"),
            properties: PropertyBag::new(),
        }
    }

    /// Append a property, builder style.
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_concatenates_prefix_and_suffix() {
        let e = StateEvent::new("onCallStateChanged", "Idle");
        assert_eq!(e.name, "onCallStateChangedIdle");
        assert!(e.properties.is_empty());
    }

    #[test]
    fn properties_keep_insertion_order() {
        let e = StateEvent::new("x", "Y")
            .with("b", 1)
            .with("a", true)
            .with("c", "text");
        let keys: Vec<&str> = e.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(e.property("a"), Some(&PropertyValue::Bool(true)));
    }

    #[test]
    fn property_value_untagged_on_the_wire() {
        let bag: PropertyBag = [
            ("Cause".to_string(), PropertyValue::Int(16)),
            ("Type".to_string(), PropertyValue::Text("Foreground".into())),
            ("Roaming".to_string(), PropertyValue::Bool(false)),
        ]
        .into_iter()
        .collect();
        let encoded = rmp_serde::to_vec_named(&bag).unwrap();
        let decoded: PropertyBag = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(decoded, bag);
    }
}
