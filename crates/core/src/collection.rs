//! Collections of models
//!
//! A [`Collection`] is the ordered set of models of one type reachable
//! through a connection, optionally narrowed by a scope (the volume a
//! snapshot list belongs to, for instance). It dereferences to a slice of
//! whatever was fetched last.

use std::ops::Deref;

use crate::attributes::Attributes;
use crate::error::Result;
use crate::model::Model;

pub struct Collection<M: Model> {
    connection: M::Connection,
    scope: Attributes,
    items: Vec<M>,
}

impl<M: Model> Collection<M> {
    pub fn new(connection: M::Connection) -> Self {
        Self::scoped(connection, Attributes::new())
    }

    /// Collection narrowed by local attributes, e.g. `volume_id`
    pub fn scoped(connection: M::Connection, scope: Attributes) -> Self {
        Self {
            connection,
            scope,
            items: Vec::new(),
        }
    }

    pub fn connection(&self) -> &M::Connection {
        &self.connection
    }

    pub fn scope(&self) -> &Attributes {
        &self.scope
    }

    /// Replace the contents with a fresh listing, in provider order
    pub async fn reload(&mut self) -> Result<&[M]> {
        let wire = M::fetch_all(&self.connection, &self.scope).await?;
        self.items = wire
            .into_iter()
            .map(|w| M::from_wire(self.connection.clone(), w))
            .collect();
        tracing::debug!(count = self.items.len(), "Collection reloaded");
        Ok(&self.items)
    }

    /// Every model in scope; always re-fetches
    pub async fn all(&mut self) -> Result<&[M]> {
        self.reload().await
    }

    /// Model with identity `id`, or `None` when the provider has no such resource
    pub async fn get(&self, id: &str) -> Result<Option<M>> {
        Ok(M::fetch(&self.connection, id)
            .await?
            .map(|wire| M::from_wire(self.connection.clone(), wire)))
    }

    /// Unsaved model carrying `attributes` plus the collection's scope
    pub fn new_model(&self, attributes: Attributes) -> M {
        let mut model = M::build(self.connection.clone(), attributes);
        for (key, value) in self.scope.iter() {
            if M::schema().contains(key) && model.get(key).is_none() {
                model.attributes_mut().insert(key, value.clone());
            }
        }
        model
    }

    /// Build, save and append a model
    pub async fn create(&mut self, attributes: Attributes) -> Result<M>
    where
        M: Clone,
    {
        let mut model = self.new_model(attributes);
        model.save().await?;
        self.items.push(model.clone());
        Ok(model)
    }

    /// Identities of the loaded models
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().filter_map(|m| m.identity()).collect()
    }

    pub fn into_vec(self) -> Vec<M> {
        self.items
    }
}

impl<M: Model> Deref for Collection<M> {
    type Target = [M];

    fn deref(&self) -> &[M] {
        &self.items
    }
}

impl<'a, M: Model> IntoIterator for &'a Collection<M> {
    type Item = &'a M;
    type IntoIter = std::slice::Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<M: Model + std::fmt::Debug> std::fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("scope", &self.scope)
            .field("items", &self.items)
            .finish()
    }
}
