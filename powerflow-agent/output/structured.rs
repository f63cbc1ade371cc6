use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{PowerflowError, Result};

/// Nested key/value result filled in place by the structured call surface
///
/// Serializes through serde as plain JSON values; nothing in the engine
/// produces wire text itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredValue {
    Number(f64),
    Signed(i64),
    Unsigned(u64),
    Bool(bool),
    Text(String),
    List(Vec<StructuredValue>),
    Object(BTreeMap<String, StructuredValue>),
}

impl Default for StructuredValue {
    fn default() -> Self {
        StructuredValue::Object(BTreeMap::new())
    }
}

impl StructuredValue {
    pub fn object() -> Self {
        Self::default()
    }

    pub fn builder() -> ObjectBuilder {
        ObjectBuilder::default()
    }

    pub fn is_object(&self) -> bool {
        matches!(self, StructuredValue::Object(_))
    }

    pub fn get(&self, key: &str) -> Option<&StructuredValue> {
        match self {
            StructuredValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Follow a path of object keys
    pub fn pointer<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Option<&StructuredValue> {
        path.into_iter().try_fold(self, |value, key| value.get(key))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            StructuredValue::Number(n) => Some(n),
            StructuredValue::Signed(n) => Some(n as f64),
            StructuredValue::Unsigned(n) => Some(n as f64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            StructuredValue::Unsigned(n) => Some(n),
            StructuredValue::Signed(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            StructuredValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            StructuredValue::Object(map) => map.len(),
            StructuredValue::List(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every key of `fields` into this object, replacing existing keys
    ///
    /// The target is checked before anything is inserted, so a failed merge
    /// leaves it untouched.
    pub fn merge(&mut self, fields: BTreeMap<String, StructuredValue>) -> Result<()> {
        match self {
            StructuredValue::Object(map) => {
                map.extend(fields);
                Ok(())
            }
            other => Err(PowerflowError::OutputSerialization(format!(
                "cannot populate a non-object value ({})",
                other.kind()
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            StructuredValue::Number(_) => "number",
            StructuredValue::Signed(_) => "signed",
            StructuredValue::Unsigned(_) => "unsigned",
            StructuredValue::Bool(_) => "bool",
            StructuredValue::Text(_) => "text",
            StructuredValue::List(_) => "list",
            StructuredValue::Object(_) => "object",
        }
    }
}

/// Builder for one object level
#[derive(Debug, Default, Clone)]
pub struct ObjectBuilder {
    fields: BTreeMap<String, StructuredValue>,
}

impl ObjectBuilder {
    pub fn field(mut self, key: impl Into<String>, value: impl Into<StructuredValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StructuredValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn into_fields(self) -> BTreeMap<String, StructuredValue> {
        self.fields
    }

    pub fn build(self) -> StructuredValue {
        StructuredValue::Object(self.fields)
    }
}

impl From<ObjectBuilder> for StructuredValue {
    fn from(builder: ObjectBuilder) -> Self {
        builder.build()
    }
}

impl From<f64> for StructuredValue {
    fn from(value: f64) -> Self {
        StructuredValue::Number(value)
    }
}

impl From<i32> for StructuredValue {
    fn from(value: i32) -> Self {
        StructuredValue::Signed(i64::from(value))
    }
}

impl From<u8> for StructuredValue {
    fn from(value: u8) -> Self {
        StructuredValue::Unsigned(u64::from(value))
    }
}

impl From<u32> for StructuredValue {
    fn from(value: u32) -> Self {
        StructuredValue::Unsigned(u64::from(value))
    }
}

impl From<u64> for StructuredValue {
    fn from(value: u64) -> Self {
        StructuredValue::Unsigned(value)
    }
}

impl From<bool> for StructuredValue {
    fn from(value: bool) -> Self {
        StructuredValue::Bool(value)
    }
}

impl From<&str> for StructuredValue {
    fn from(value: &str) -> Self {
        StructuredValue::Text(value.to_string())
    }
}

impl From<String> for StructuredValue {
    fn from(value: String) -> Self {
        StructuredValue::Text(value)
    }
}

impl<T: Into<StructuredValue>> From<Vec<T>> for StructuredValue {
    fn from(values: Vec<T>) -> Self {
        StructuredValue::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_nests_objects() {
        let value = StructuredValue::builder()
            .field("host", "node01")
            .field(
                "socket_0",
                StructuredValue::builder()
                    .field("pkg_watts", 42.5)
                    .field("locked", false),
            )
            .build();

        assert_eq!(
            value.pointer(["socket_0", "pkg_watts"]).and_then(StructuredValue::as_f64),
            Some(42.5)
        );
        assert_eq!(
            value.pointer(["socket_0", "locked"]).and_then(StructuredValue::as_bool),
            Some(false)
        );
        assert!(value.pointer(["socket_1"]).is_none());
    }

    #[test]
    fn test_merge_into_non_object_is_rejected() {
        let mut target = StructuredValue::Number(1.0);
        let fields = StructuredValue::builder().field("a", 1u32).into_fields();
        assert!(matches!(
            target.merge(fields),
            Err(PowerflowError::OutputSerialization(_))
        ));
        assert_eq!(target, StructuredValue::Number(1.0));
    }

    #[test]
    fn test_merge_keeps_existing_keys() {
        let mut target = StructuredValue::builder().field("caller", true).build();
        target
            .merge(StructuredValue::builder().field("socket_0", 1u32).into_fields())
            .unwrap();
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let value = StructuredValue::builder()
            .field("tdp_watts", 115.0)
            .field("raw", 0x15_83C0u64)
            .field("turbo_mhz", vec![3300u32, 3100])
            .build();

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["tdp_watts"], serde_json::json!(115.0));
        assert_eq!(json["raw"], serde_json::json!(0x15_83C0u64));
        assert_eq!(json["turbo_mhz"], serde_json::json!([3300, 3100]));
    }
}
