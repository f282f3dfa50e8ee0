//! Document data model
//!
//! Layout di wire:
//! ┌─────────────────────────────────────────────────────┐
//! │ total_len: i32 LE (includes itself + terminator)    │
//! ├─────────────────────────────────────────────────────┤
//! │ element*: [tag u8][name\0][value]                   │
//! ├─────────────────────────────────────────────────────┤
//! │ 0x00                                                │
//! └─────────────────────────────────────────────────────┘
//!
//! A `Document` keeps insertion order and unique field names.

/// Minimum encoded document: length prefix + terminator.
pub const EMPTY_DOCUMENT_SIZE: usize = 5;

/// Element type tag written before each field name.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Boolean = 0x08,
    Null = 0x0a,
    Int32 = 0x10,
    /// Wide integer
    Int64 = 0x12,
}

impl ElementType {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Double),
            0x02 => Some(Self::String),
            0x03 => Some(Self::Document),
            0x04 => Some(Self::Array),
            0x05 => Some(Self::Binary),
            0x08 => Some(Self::Boolean),
            0x0a => Some(Self::Null),
            0x10 => Some(Self::Int32),
            0x12 => Some(Self::Int64),
            _ => None,
        }
    }
}

/// Field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    Binary { subtype: u8, data: Vec<u8> },
    Boolean(bool),
    Null,
    Int32(i32),
    Int64(i64),
}

impl Value {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::Document,
            Value::Array(_) => ElementType::Array,
            Value::Binary { .. } => ElementType::Binary,
            Value::Boolean(_) => ElementType::Boolean,
            Value::Null => ElementType::Null,
            Value::Int32(_) => ElementType::Int32,
            Value::Int64(_) => ElementType::Int64,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Document(d)
    }
}

/// Ordered field-name-to-value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. An existing name keeps its position and takes the new
    /// value; the previous value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((key, value));
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

/// The document sent by the exchange client: `{long: 100, james: "perry"}`.
pub fn sample_document() -> Document {
    Document::new()
        .with("long", Value::Int64(100))
        .with("james", "perry")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_document() {
        let doc = sample_document();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["long", "james"]);
        assert_eq!(doc.get("long"), Some(&Value::Int64(100)));
        assert_eq!(doc.get("james"), Some(&Value::String("perry".into())));
    }

    #[test]
    fn test_duplicate_key_keeps_last_value_first_position() {
        let mut doc = Document::new();
        doc.insert("a", 1i64);
        doc.insert("b", true);
        let previous = doc.insert("a", "second");

        assert_eq!(previous, Some(Value::Int64(1)));
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&Value::String("second".into())));
    }

    #[test]
    fn test_from_iter_dedups() {
        let doc: Document = vec![("x", 1i32), ("y", 2), ("x", 3)].into_iter().collect();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("x"), Some(&Value::Int32(3)));
    }

    #[test]
    fn test_element_type_tags() {
        assert_eq!(Value::Int64(0).element_type() as u8, 0x12);
        assert_eq!(Value::from("s").element_type() as u8, 0x02);
        assert_eq!(ElementType::from_u8(0x12), Some(ElementType::Int64));
        assert_eq!(ElementType::from_u8(0x07), None);
    }
}
