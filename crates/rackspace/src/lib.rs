//! nb-rackspace: Rackspace Cloud Files for nimbus
//!
//! A [`Files`] connection authenticates once against the Rackspace auth
//! service, then signs every storage request with the returned
//! `X-Auth-Token`. Listings are requested as JSON; account, container and
//! object metadata arrive in response headers.
//!
//! ```no_run
//! use nb_core::Attributes;
//! use nb_rackspace::Files;
//!
//! # async fn demo() -> nb_core::Result<()> {
//! let files = Files::mock();
//! let container = files
//!     .containers()
//!     .create(Attributes::new().with("name", "backups"))
//!     .await?;
//! println!("{:?}", container.name());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod files;
pub mod signer;

pub use auth::{DEFAULT_AUTH_URL, Session, authenticate};
pub use files::{Container, ContainerRef, Files, FilesMock, ListOptions, Object};
pub use signer::TokenSigner;
