//! nb-core: Core library for the nimbus cloud client
//!
//! This crate provides the provider-independent pieces of nimbus:
//! - Attribute mappings and per-type schemas
//! - Model and Collection traits
//! - The `Backend` seam with a signed remote implementation
//! - Retry policy, configuration and profiles
//!
//! Provider adapters (`nb-aws`, `nb-rackspace`) build their request
//! catalogs, parsers and mock backends on top of these types.

pub mod attributes;
pub mod backend;
pub mod collection;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod model;
pub mod retry;
pub mod schema;
pub mod transport;

pub use attributes::{Attributes, Value};
pub use backend::{Addressing, Backend, Endpoint, RemoteBackend, Signer};
pub use collection::Collection;
pub use config::{Config, ConfigManager, Profile, ProfileManager, Provider, RetryConfig};
pub use error::{Error, Result};
pub use http::{Method, Parser, RawResponse, Request, Response};
pub use mock::IdGenerator;
pub use model::{Lifecycle, Model, PendingChanges};
pub use retry::{Backoff, RetryBackend, is_transient};
pub use schema::{Field, FieldType, Schema};
pub use transport::{HttpTransport, Transport, TransportOptions};
