//! Field specs and ordered field sets.
//!
//! A `FieldSpec` is the raw ordered parameter list `["char", 8]`: scalar type name
//! first, type specific parameters after. It is persisted as-is (JSON array text) so
//! new parameter shapes never need a metadata schema change. A `FieldSet` keeps the
//! declaration order of the fields of one entity type and rejects duplicate names.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::catalog::ScalarKind;
use crate::error::{RegistryError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSpec(Vec<Value>);

impl FieldSpec {
    pub fn new(type_name: &str) -> Self { Self(vec![Value::String(type_name.to_string())]) }

    pub fn with_param(mut self, param: impl Into<Value>) -> Self {
        self.0.push(param.into());
        self
    }

    pub fn type_name(&self) -> Option<&str> { self.0.first().and_then(|v| v.as_str()) }

    /// Positional parameters following the type name.
    pub fn params(&self) -> &[Value] { if self.0.is_empty() { &[] } else { &self.0[1..] } }

    pub fn values(&self) -> &[Value] { &self.0 }

    /// Resolve the type name against the catalog.
    pub fn kind(&self, field_name: &str) -> Result<ScalarKind> {
        let first = self.0.first().ok_or_else(|| RegistryError::invalid_field(field_name, "field spec is empty"))?;
        let type_name = first
            .as_str()
            .ok_or_else(|| RegistryError::invalid_field(field_name, format!("type name must be a string, got {}", first)))?;
        ScalarKind::parse(type_name).ok_or_else(|| RegistryError::UnsupportedType { type_name: type_name.to_string() })
    }

    /// Same spec with the type name in canonical lowercase.
    pub fn normalized(&self) -> Self {
        let mut values = self.0.clone();
        if let Some(Value::String(s)) = values.first_mut() { *s = s.to_ascii_lowercase(); }
        Self(values)
    }

    pub fn encode(&self) -> String { Value::Array(self.0.clone()).to_string() }

    pub fn decode(text: &str) -> std::result::Result<Self, serde_json::Error> { serde_json::from_str(text) }
}

impl From<Vec<Value>> for FieldSpec {
    fn from(values: Vec<Value>) -> Self { Self(values) }
}

/// Ordered, name-unique collection of field specs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<(String, FieldSpec)>,
}

impl FieldSet {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, field_name: impl Into<String>, spec: FieldSpec) -> Result<()> {
        let field_name = field_name.into();
        if self.contains(&field_name) {
            return Err(RegistryError::DuplicateField { field_name });
        }
        self.fields.push((field_name, spec));
        Ok(())
    }

    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, FieldSpec)>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for (name, spec) in pairs { set.insert(name, spec)?; }
        Ok(set)
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(n, _)| n == field_name).map(|(_, s)| s)
    }

    pub fn contains(&self, field_name: &str) -> bool { self.get(field_name).is_some() }

    pub fn names(&self) -> Vec<&str> { self.fields.iter().map(|(n, _)| n.as_str()).collect() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> { self.fields.iter().map(|(n, s)| (n.as_str(), s)) }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, spec) in &self.fields { map.serialize_entry(name, spec)?; }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldSetVisitor;

        impl<'de> Visitor<'de> for FieldSetVisitor {
            type Value = FieldSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping field names to [type, params...] arrays")
            }

            // Entries arrive in document order, which is the declaration order.
            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<FieldSet, A::Error> {
                let mut set = FieldSet::new();
                while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
                    set.insert(name, spec).map_err(serde::de::Error::custom)?;
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(FieldSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_accessors() {
        let spec = FieldSpec::new("CHAR").with_param(8);
        assert_eq!(spec.type_name(), Some("CHAR"));
        assert_eq!(spec.params(), &[json!(8)]);
        assert_eq!(spec.kind("code").unwrap(), ScalarKind::Char);
        assert_eq!(spec.normalized().values(), &[json!("char"), json!(8)]);
        assert_eq!(spec.normalized().encode(), r#"["char",8]"#);
    }

    #[test]
    fn spec_kind_errors() {
        let empty = FieldSpec::from(Vec::<Value>::new());
        assert_eq!(empty.kind("x").unwrap_err().code_str(), "invalid_field_spec");
        let numeric = FieldSpec::from(vec![json!(5)]);
        assert_eq!(numeric.kind("x").unwrap_err().code_str(), "invalid_field_spec");
        match FieldSpec::new("currency").kind("x") {
            Err(RegistryError::UnsupportedType { type_name }) => assert_eq!(type_name, "currency"),
            other => panic!("expected UnsupportedType, got {:?}", other),
        }
    }

    #[test]
    fn decode_keeps_unknown_parameter_shapes() {
        let spec = FieldSpec::decode(r#"["decimal",{"precision":10,"scale":2}]"#).unwrap();
        assert_eq!(spec.type_name(), Some("decimal"));
        assert_eq!(spec.params()[0]["scale"], json!(2));
        assert!(FieldSpec::decode("not json").is_err());
    }

    #[test]
    fn field_set_preserves_order_and_rejects_duplicates() {
        let mut set = FieldSet::new();
        set.insert("c", FieldSpec::new("text")).unwrap();
        set.insert("a", FieldSpec::new("integer")).unwrap();
        set.insert("b", FieldSpec::new("date")).unwrap();
        assert_eq!(set.names(), vec!["c", "a", "b"]);
        let err = set.insert("a", FieldSpec::new("json")).unwrap_err();
        assert_eq!(err.code_str(), "duplicate_field");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn field_set_json_roundtrip_keeps_document_order() {
        let text = r#"{"zeta":["string"],"alpha":["char",8],"mid":["uuid"]}"#;
        let set: FieldSet = serde_json::from_str(text).unwrap();
        assert_eq!(set.names(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), text);
        assert!(serde_json::from_str::<FieldSet>(r#"{"a":["text"],"a":["json"]}"#).is_err());
    }
}
