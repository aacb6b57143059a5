//! Per-type attribute schemas
//!
//! A [`Schema`] is the ordered list of `(wire name, local name, type)` fields
//! a model declares. One generic [`Schema::decode`] turns a wire mapping into
//! the model's local attributes and [`Schema::encode`] goes the other way.

use crate::attributes::{Attributes, Value};

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    Timestamp,
    Map,
    List,
}

/// One declared attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Provider field name
    pub wire: &'static str,
    /// Name used by the model and its accessors
    pub local: &'static str,
    pub ty: FieldType,
}

impl Field {
    pub const fn new(wire: &'static str, local: &'static str, ty: FieldType) -> Self {
        Self { wire, local, ty }
    }
}

/// Attribute schema of a model type
#[derive(Debug)]
pub struct Schema {
    /// Identity field; absent from attributes until the model is persisted
    pub identity: Field,
    pub fields: &'static [Field],
}

impl Schema {
    /// All fields, identity first
    pub fn all_fields(&self) -> impl Iterator<Item = &Field> {
        std::iter::once(&self.identity).chain(self.fields.iter())
    }

    /// Look up a field by local name
    pub fn field(&self, local: &str) -> Option<&Field> {
        self.all_fields().find(|f| f.local == local)
    }

    /// Look up a field by wire name
    pub fn wire_field(&self, wire: &str) -> Option<&Field> {
        self.all_fields().find(|f| f.wire == wire)
    }

    pub fn contains(&self, local: &str) -> bool {
        self.field(local).is_some()
    }

    /// Decode a wire mapping into local attributes.
    ///
    /// Only declared fields survive; the result follows schema order and
    /// every value is coerced to its declared type. Null values are dropped.
    pub fn decode(&self, wire: &Attributes) -> Attributes {
        let mut local = Attributes::new();
        for field in self.all_fields() {
            if let Some(value) = wire.get(field.wire) {
                if value.is_null() {
                    continue;
                }
                local.insert(field.local, value.clone().coerce(field.ty));
            }
        }
        local
    }

    /// Encode local attributes back into a wire mapping
    pub fn encode(&self, local: &Attributes) -> Attributes {
        let mut wire = Attributes::new();
        for field in self.all_fields() {
            if let Some(value) = local.get(field.local) {
                wire.insert(field.wire, value.clone());
            }
        }
        wire
    }

    /// Keep only declared local names and coerce their values.
    ///
    /// Used for attributes handed to a model by the caller rather than
    /// decoded from a response.
    pub fn filter_local(&self, local: Attributes) -> Attributes {
        let mut kept = Attributes::new();
        for (key, value) in local {
            match self.field(&key) {
                Some(field) if !value.is_null() => {
                    kept.insert(key, value.coerce(field.ty));
                }
                Some(_) => {}
                None => tracing::debug!(attribute = %key, "Dropping undeclared attribute"),
            }
        }
        kept
    }

    /// Coerce a single local value for `local`, or `None` if undeclared
    pub fn coerce(&self, local: &str, value: Value) -> Option<Value> {
        self.field(local).map(|f| value.coerce(f.ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static VOLUME: Schema = Schema {
        identity: Field::new("volumeId", "volume_id", FieldType::String),
        fields: &[
            Field::new("availabilityZone", "availability_zone", FieldType::String),
            Field::new("size", "size", FieldType::Integer),
            Field::new("createTime", "create_time", FieldType::Timestamp),
        ],
    };

    #[test]
    fn test_decode_renames_and_drops_unknown() {
        let wire = Attributes::new()
            .with("requestId", "req-1")
            .with("size", "10")
            .with("volumeId", "vol-1")
            .with("availabilityZone", "us-east-1a");
        let local = VOLUME.decode(&wire);
        let keys: Vec<&str> = local.keys().collect();
        assert_eq!(keys, vec!["volume_id", "availability_zone", "size"]);
        assert_eq!(local.get_i64("size"), Some(10));
        assert_eq!(local.get("size"), Some(&Value::Integer(10)));
    }

    #[test]
    fn test_decode_types_timestamps() {
        let wire = Attributes::new().with("createTime", "2009-10-12T17:50:30.000Z");
        let local = VOLUME.decode(&wire);
        assert!(matches!(local.get("create_time"), Some(Value::Timestamp(_))));
    }

    #[test]
    fn test_encode_restores_wire_names() {
        let local = Attributes::new().with("volume_id", "vol-1").with("size", 5);
        let wire = VOLUME.encode(&local);
        assert_eq!(wire.get_str("volumeId"), Some("vol-1"));
        assert_eq!(wire.get_i64("size"), Some(5));
        assert!(!wire.contains_key("volume_id"));
    }

    #[test]
    fn test_filter_local_keeps_declared_only() {
        let local = Attributes::new()
            .with("size", "8")
            .with("colour", "blue")
            .with("availability_zone", Value::Null);
        let kept = VOLUME.filter_local(local);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get("size"), Some(&Value::Integer(8)));
    }
}
