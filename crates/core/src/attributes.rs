//! Attribute mappings
//!
//! An [`Attributes`] value is the insertion-ordered key/value structure a
//! parser produces from a provider response. Keys are provider field names
//! (`volumeId`, `instancesSet`, `CreationDate`) at the wire level, or local
//! names (`volume_id`) once decoded through a [`Schema`](crate::Schema).

use indexmap::IndexMap;
use jiff::Timestamp;
use serde::Serialize;

use crate::schema::FieldType;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Timestamp(Timestamp),
    String(String),
    List(Vec<Value>),
    Map(Attributes),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::String(s) => parse_timestamp(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Attributes> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a wire value into the declared field type.
    ///
    /// Parsers hand over text for most scalars; values that cannot be
    /// converted are kept as they are.
    pub fn coerce(self, ty: FieldType) -> Value {
        match (ty, self) {
            (FieldType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => Value::String(s),
            },
            (FieldType::Boolean, Value::String(s)) => match s.trim() {
                "true" | "enabled" => Value::Boolean(true),
                "false" | "disabled" => Value::Boolean(false),
                _ => Value::String(s),
            },
            (FieldType::Timestamp, Value::String(s)) => match parse_timestamp(&s) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::String(s),
            },
            (FieldType::String, Value::Integer(n)) => Value::String(n.to_string()),
            (_, value) => value,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Map(map) => write!(f, "{}", serde_json::to_string(map).unwrap_or_default()),
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

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Attributes> for Value {
    fn from(map: Attributes) -> Self {
        Value::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Parse the timestamp formats providers put on the wire: RFC 3339
/// (EC2, S3 listings), RFC 2822 (HTTP `Last-Modified`) and offset-less
/// ISO 8601 (Cloud Files listings, taken as UTC).
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = text.parse::<Timestamp>() {
        return Some(ts);
    }
    if let Ok(zoned) = jiff::fmt::rfc2822::parse(text) {
        return Some(zoned.timestamp());
    }
    text.parse::<jiff::civil::DateTime>()
        .ok()
        .and_then(|dt| dt.to_zoned(jiff::tz::TimeZone::UTC).ok())
        .map(|zoned| zoned.timestamp())
}

/// Insertion-ordered attribute mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value, keeping the key's original position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_timestamp(&self, key: &str) -> Option<Timestamp> {
        self.get(key).and_then(Value::as_timestamp)
    }

    pub fn get_map(&self, key: &str) -> Option<&Attributes> {
        self.get(key).and_then(Value::as_map)
    }

    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_list)
    }

    /// Remove a key, preserving the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into self; existing keys are overwritten in place,
    /// new keys are appended in `other`'s order.
    pub fn merge(&mut self, other: Attributes) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    /// Copy of self without the given keys
    pub fn without(&self, keys: &[&str]) -> Attributes {
        self.iter()
            .filter(|(k, _)| !keys.contains(k))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Sorted key names, recursing into maps and list elements with
    /// dotted paths (`instancesSet.instanceState.code`).
    pub fn key_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(self, "", &mut paths);
        paths.sort();
        paths.dedup();
        paths
    }
}

fn collect_paths(attrs: &Attributes, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in attrs.iter() {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };
        collect_value_paths(value, &path, out);
        out.push(path);
    }
}

fn collect_value_paths(value: &Value, path: &str, out: &mut Vec<String>) {
    match value {
        Value::Map(map) => collect_paths(map, path, out),
        Value::List(items) => {
            for item in items {
                collect_value_paths(item, path, out);
            }
        }
        _ => {}
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Attributes {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let attrs = Attributes::new()
            .with("volumeId", "vol-1")
            .with("size", 10)
            .with("status", "creating");
        let keys: Vec<&str> = attrs.keys().collect();
        assert_eq!(keys, vec!["volumeId", "size", "status"]);
    }

    #[test]
    fn test_merge_overwrites_in_place() {
        let mut attrs = Attributes::new().with("status", "creating").with("size", 1);
        attrs.merge(Attributes::new().with("status", "available").with("device", "/dev/sdh"));
        let keys: Vec<&str> = attrs.keys().collect();
        assert_eq!(keys, vec!["status", "size", "device"]);
        assert_eq!(attrs.get_str("status"), Some("available"));
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut attrs = Attributes::new().with("a", 1).with("b", 2).with("c", 3);
        attrs.remove("b");
        let keys: Vec<&str> = attrs.keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(Value::from("42").coerce(FieldType::Integer), Value::Integer(42));
        assert_eq!(Value::from("true").coerce(FieldType::Boolean), Value::Boolean(true));
        assert_eq!(Value::from("disabled").coerce(FieldType::Boolean), Value::Boolean(false));
        assert_eq!(Value::from("n/a").coerce(FieldType::Integer), Value::from("n/a"));
        assert!(matches!(
            Value::from("2009-10-12T17:50:30.000Z").coerce(FieldType::Timestamp),
            Value::Timestamp(_)
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc3339 = parse_timestamp("2009-10-12T17:50:30Z").unwrap();
        let rfc2822 = parse_timestamp("Mon, 12 Oct 2009 17:50:30 GMT").unwrap();
        let civil = parse_timestamp("2009-10-12T17:50:30.000000").unwrap();
        assert_eq!(rfc3339, rfc2822);
        assert_eq!(rfc3339, civil);
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_key_paths_recurse() {
        let instance = Attributes::new()
            .with("instanceId", "i-1")
            .with("instanceState", Attributes::new().with("code", 0).with("name", "pending"));
        let attrs = Attributes::new()
            .with("reservationId", "r-1")
            .with("instancesSet", vec![Value::Map(instance)]);
        assert_eq!(
            attrs.key_paths(),
            vec![
                "instancesSet",
                "instancesSet.instanceId",
                "instancesSet.instanceState",
                "instancesSet.instanceState.code",
                "instancesSet.instanceState.name",
                "reservationId",
            ]
        );
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = Attributes::new().with("name", "b").with("owner", "me");
        let b = Attributes::new().with("owner", "me").with("name", "b");
        assert_eq!(a, b);
    }
}
