//! Model trait
//!
//! A model is a typed wrapper over a decoded attribute mapping plus the
//! connection it was loaded through. The schema decides which attributes a
//! model may hold; the provider crates supply the create, delete and fetch
//! requests for each type.

use async_trait::async_trait;

use crate::attributes::{Attributes, Value};
use crate::error::{Error, Result};
use crate::schema::Schema;

/// Where a model is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built locally, not yet created on the provider
    New,
    /// Exists on the provider
    Persisted,
    /// Deleted through `destroy`
    Destroyed,
}

/// Changes recorded on a new model and applied once `save` has created it
#[derive(Debug, Clone)]
pub struct PendingChanges<C> {
    changes: Vec<C>,
}

impl<C> Default for PendingChanges<C> {
    fn default() -> Self {
        Self {
            changes: Vec::new(),
        }
    }
}

impl<C> PendingChanges<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: C) {
        self.changes.push(change);
    }

    /// Take every recorded change, oldest first
    pub fn drain(&mut self) -> Vec<C> {
        std::mem::take(&mut self.changes)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[async_trait]
pub trait Model: Sized + Send + Sync {
    /// Provider connection handle the model issues requests through
    type Connection: Clone + Send + Sync;

    fn schema() -> &'static Schema;

    fn from_parts(connection: Self::Connection, attributes: Attributes, lifecycle: Lifecycle)
    -> Self;

    fn connection(&self) -> &Self::Connection;

    fn attributes(&self) -> &Attributes;

    fn attributes_mut(&mut self) -> &mut Attributes;

    fn lifecycle(&self) -> Lifecycle;

    fn set_lifecycle(&mut self, lifecycle: Lifecycle);

    /// Type-specific reshaping of a wire mapping before it is decoded
    fn prepare(wire: Attributes) -> Attributes {
        wire
    }

    /// Build a persisted model from a provider response mapping
    fn from_wire(connection: Self::Connection, wire: Attributes) -> Self {
        let local = Self::schema().decode(&Self::prepare(wire));
        Self::from_parts(connection, local, Lifecycle::Persisted)
    }

    /// Build a new, unsaved model from caller-supplied local attributes
    fn build(connection: Self::Connection, attributes: Attributes) -> Self {
        let local = Self::schema().filter_local(attributes);
        Self::from_parts(connection, local, Lifecycle::New)
    }

    fn identity(&self) -> Option<&str> {
        self.attributes().get_str(Self::schema().identity.local)
    }

    fn is_new(&self) -> bool {
        self.lifecycle() == Lifecycle::New
    }

    fn get(&self, local: &str) -> Option<&Value> {
        self.attributes().get(local)
    }

    /// Set a declared attribute; undeclared names are rejected
    fn set(&mut self, local: &str, value: impl Into<Value> + Send) -> Result<()> {
        let value = Self::schema()
            .coerce(local, value.into())
            .ok_or_else(|| Error::General(format!("Unknown attribute '{local}'")))?;
        self.attributes_mut().insert(local, value);
        Ok(())
    }

    /// Merge a provider response mapping into the current attributes
    fn merge_wire(&mut self, wire: Attributes) {
        let local = Self::schema().decode(&Self::prepare(wire));
        self.attributes_mut().merge(local);
    }

    /// Identity of a persisted model, or `InvalidState` for new and destroyed ones
    fn require_identity(&self) -> Result<String> {
        match self.lifecycle() {
            Lifecycle::New => Err(Error::InvalidState(format!(
                "{} has not been saved",
                Self::schema().identity.local
            ))),
            Lifecycle::Destroyed => Err(Error::InvalidState(format!(
                "{} has been destroyed",
                self.identity().unwrap_or_default()
            ))),
            Lifecycle::Persisted => self.identity().map(str::to_string).ok_or_else(|| {
                Error::InvalidState(format!(
                    "Missing {} on persisted model",
                    Self::schema().identity.local
                ))
            }),
        }
    }

    /// Wire mappings of every resource of this type within `scope`.
    ///
    /// `scope` carries local attribute names (`volume_id`, ...) narrowing
    /// the listing.
    async fn fetch_all(connection: &Self::Connection, scope: &Attributes) -> Result<Vec<Attributes>>;

    /// Wire mapping of the resource with identity `id`, or `None` if absent
    async fn fetch(connection: &Self::Connection, id: &str) -> Result<Option<Attributes>> {
        let identity = Self::schema().identity.wire;
        let all = Self::fetch_all(connection, &Attributes::new()).await?;
        Ok(all
            .into_iter()
            .find(|wire| wire.get_str(identity) == Some(id)))
    }

    /// Create the resource on the provider, then flush pending changes
    async fn save(&mut self) -> Result<()>;

    /// Delete the resource on the provider
    async fn destroy(&mut self) -> Result<bool>;

    /// Re-fetch by identity and replace the attributes
    async fn reload(&mut self) -> Result<()> {
        let id = self.require_identity()?;
        match Self::fetch(self.connection(), &id).await? {
            Some(wire) => {
                *self.attributes_mut() = Self::schema().decode(&Self::prepare(wire));
                Ok(())
            }
            None => Err(Error::NotFound(format!("{id} no longer exists"))),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal in-memory model shared by the core tests

    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::schema::{Field, FieldType};

    pub static NOTE: Schema = Schema {
        identity: Field::new("noteId", "note_id", FieldType::String),
        fields: &[
            Field::new("title", "title", FieldType::String),
            Field::new("topic", "topic", FieldType::String),
            Field::new("words", "words", FieldType::Integer),
        ],
    };

    #[derive(Debug, Clone, Default)]
    pub struct Store {
        pub rows: Arc<Mutex<Vec<Attributes>>>,
    }

    impl Store {
        pub fn ids(&self) -> Vec<String> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .filter_map(|r| r.get_str("noteId").map(str::to_string))
                .collect()
        }
    }

    #[derive(Debug, Clone)]
    pub struct Note {
        store: Store,
        attributes: Attributes,
        lifecycle: Lifecycle,
    }

    #[async_trait]
    impl Model for Note {
        type Connection = Store;

        fn schema() -> &'static Schema {
            &NOTE
        }

        fn from_parts(store: Store, attributes: Attributes, lifecycle: Lifecycle) -> Self {
            Self {
                store,
                attributes,
                lifecycle,
            }
        }

        fn connection(&self) -> &Store {
            &self.store
        }

        fn attributes(&self) -> &Attributes {
            &self.attributes
        }

        fn attributes_mut(&mut self) -> &mut Attributes {
            &mut self.attributes
        }

        fn lifecycle(&self) -> Lifecycle {
            self.lifecycle
        }

        fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
            self.lifecycle = lifecycle;
        }

        async fn fetch_all(store: &Store, scope: &Attributes) -> Result<Vec<Attributes>> {
            let rows = store.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|r| match scope.get_str("topic") {
                    Some(topic) => r.get_str("topic") == Some(topic),
                    None => true,
                })
                .cloned()
                .collect())
        }

        async fn save(&mut self) -> Result<()> {
            if !self.is_new() {
                return Err(Error::Unsupported("notes are immutable".to_string()));
            }
            let mut rows = self.store.rows.lock().unwrap();
            let mut wire = NOTE.encode(&self.attributes);
            wire.insert("noteId", format!("note-{}", rows.len() + 1));
            wire.insert("requestId", "req-1");
            rows.push(wire.clone());
            drop(rows);
            self.merge_wire(wire);
            self.lifecycle = Lifecycle::Persisted;
            Ok(())
        }

        async fn destroy(&mut self) -> Result<bool> {
            let id = self.require_identity()?;
            let mut rows = self.store.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| r.get_str("noteId") != Some(id.as_str()));
            if rows.len() == before {
                return Err(Error::status(&[200], 404, "missing"));
            }
            self.lifecycle = Lifecycle::Destroyed;
            Ok(true)
        }
    }
}
