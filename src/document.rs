//! Document identity and field representation

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Ordered mapping of field names to JSON values
pub type Fields = Map<String, Value>;

/// Store-assigned document identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub u64);

impl DocId {
    /// The first id handed out by an empty table
    pub const FIRST: DocId = DocId(1);

    /// The id following this one
    pub fn next(self) -> DocId {
        DocId(self.0 + 1)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        DocId(id)
    }
}

/// A stored record: id plus its field mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier assigned by the store
    pub id: DocId,

    /// Field mapping, in insertion order
    pub fields: Fields,
}

impl Document {
    /// Create a document from an id and its fields
    pub fn new(id: DocId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Look up a top-level field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Resolve a dot-separated path (`"address.city"`) into nested objects
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Serialize the document to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize a document from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Build a `Fields` mapping from a JSON object literal.
///
/// Non-object values yield an empty mapping.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_doc_id_ordering_and_next() {
        assert!(DocId(1) < DocId(2));
        assert_eq!(DocId::FIRST.next(), DocId(2));
        assert_eq!(DocId::from(5).to_string(), "5");
    }

    #[test]
    fn test_lookup_nested_path() {
        let doc = Document::new(
            DocId(1),
            fields(json!({"name": "Ada", "address": {"city": "London", "zip": 1}})),
        );

        assert_eq!(doc.get("name"), Some(&json!("Ada")));
        assert_eq!(doc.lookup("address.city"), Some(&json!("London")));
        assert_eq!(doc.lookup("address.street"), None);
        assert_eq!(doc.lookup("name.first"), None);
        assert_eq!(doc.lookup("missing"), None);
    }

    #[test]
    fn test_fields_preserve_insertion_order() {
        let f = fields(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let names: Vec<&str> = f.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_fields_from_non_object() {
        assert!(fields(json!(42)).is_empty());
    }

    #[test]
    fn test_json_serialization() {
        let doc = Document::new(DocId(9), fields(json!({"int": 1, "char": "a"})));
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"id\":9"));

        let back = Document::from_json(&json).unwrap();
        assert_eq!(back, doc);

        assert!(Document::from_json("not json").is_err());
    }
}
