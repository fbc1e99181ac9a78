//! Generic JSON value tree
//!
//! [`BayeuxValue`] is what the wire codec produces and consumes. Objects
//! keep their entries in insertion order so that a parse/serialize round
//! trip reproduces the original text, and equality is order-sensitive for
//! the same reason.

/// A node in a parsed JSON tree
#[derive(Debug, Clone, PartialEq)]
pub enum BayeuxValue {
    /// Ordered string-keyed mapping
    Object(Vec<(String, BayeuxValue)>),
    /// Ordered sequence
    Array(Vec<BayeuxValue>),
    String(String),
    /// 64-bit integer (no float marker seen while scanning)
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl BayeuxValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BayeuxValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BayeuxValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BayeuxValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BayeuxValue::Integer(i) => Some(*i as f64),
            BayeuxValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, BayeuxValue)]> {
        match self {
            BayeuxValue::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[BayeuxValue]> {
        match self {
            BayeuxValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key in an object value. Linear scan; objects on this
    /// wire are small.
    pub fn get(&self, key: &str) -> Option<&BayeuxValue> {
        match self {
            BayeuxValue::Object(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Insert or replace a key in an object value. No-op on non-objects.
    pub fn put(&mut self, key: &str, value: BayeuxValue) {
        if let BayeuxValue::Object(entries) = self {
            if let Some(slot) = entries.iter_mut().find(|(k, _)| k == key) {
                slot.1 = value;
            } else {
                entries.push((key.to_string(), value));
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// True for objects and arrays with no entries.
    pub fn is_empty(&self) -> bool {
        match self {
            BayeuxValue::Object(entries) => entries.is_empty(),
            BayeuxValue::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Render a scalar as the string form used for loosely-typed fields
    /// (the original server stringified ids and versions this way).
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            BayeuxValue::String(s) => Some(s.clone()),
            BayeuxValue::Integer(i) => Some(i.to_string()),
            BayeuxValue::Float(f) => Some(f.to_string()),
            BayeuxValue::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for BayeuxValue {
    fn from(v: &str) -> Self {
        BayeuxValue::String(v.to_string())
    }
}

impl From<String> for BayeuxValue {
    fn from(v: String) -> Self {
        BayeuxValue::String(v)
    }
}

impl From<i64> for BayeuxValue {
    fn from(v: i64) -> Self {
        BayeuxValue::Integer(v)
    }
}

impl From<f64> for BayeuxValue {
    fn from(v: f64) -> Self {
        BayeuxValue::Float(v)
    }
}

impl From<bool> for BayeuxValue {
    fn from(v: bool) -> Self {
        BayeuxValue::Boolean(v)
    }
}
