//! Structured debug representation.
//!
//! State-machine bugs are diagnosed from transition logs, so every action and
//! event exposes a stable identifier plus a dictionary of its relevant fields.
//! Keys are kept in sorted order (`serde_json::Map` is a `BTreeMap`), which
//! makes the rendered description stable across runs.
//!
//! Secrets (passwords, confirmation codes, tokens) must never be placed in the
//! dictionary; implementations record their presence instead.

use serde_json::{Map, Value};

/// Stable, structured description used for diagnostic logging.
///
/// # Example
///
/// ```
/// use authflow_core::debug::DebugDictionary;
/// use serde_json::{Map, Value};
///
/// struct ValidateConfig {
///     region: String,
/// }
///
/// impl DebugDictionary for ValidateConfig {
///     fn identifier(&self) -> &'static str {
///         "ValidateConfig"
///     }
///
///     fn debug_dictionary(&self) -> Map<String, Value> {
///         let mut dict = Map::new();
///         dict.insert("identifier".into(), self.identifier().into());
///         dict.insert("region".into(), self.region.clone().into());
///         dict
///     }
/// }
///
/// let action = ValidateConfig { region: "us-east-1".into() };
/// assert_eq!(
///     action.debug_description(),
///     r#"{"identifier":"ValidateConfig","region":"us-east-1"}"#
/// );
/// ```
pub trait DebugDictionary {
    /// Stable, human-readable name.
    fn identifier(&self) -> &'static str;

    /// Relevant fields, keyed by name. Always contains `identifier`.
    fn debug_dictionary(&self) -> Map<String, Value> {
        let mut dict = Map::new();
        dict.insert(
            "identifier".to_string(),
            Value::String(self.identifier().to_string()),
        );
        dict
    }

    /// Compact JSON rendering of [`debug_dictionary`](Self::debug_dictionary).
    fn debug_description(&self) -> String {
        Value::Object(self.debug_dictionary()).to_string()
    }
}

/// Start a dictionary for `identifier` and extend it with `fields`.
///
/// Helper for implementations that only add a handful of scalar fields.
#[must_use]
pub fn dictionary<I>(identifier: &'static str, fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    let mut dict = Map::new();
    dict.insert(
        "identifier".to_string(),
        Value::String(identifier.to_string()),
    );
    for (key, value) in fields {
        dict.insert(key.to_string(), value);
    }
    dict
}
