//! Cloud collaborators for the invoice pipeline.
//!
//! The stages only ever talk to two traits:
//!
//! - [`ObjectStore`] for `read`, `write` and server-side `copy` of objects
//! - [`Publisher`] for publishing JSON messages to a topic
//!
//! [`GcsObjectStore`] and [`PubSubPublisher`] are the production adapters,
//! both authenticated through a [`TokenSource`]. The [`memory`] module holds
//! in-process replacements.

mod auth;
mod error;
pub mod memory;
mod pubsub;
mod storage;
mod uri;

pub use auth::{MetadataTokenSource, TokenSource};
pub use error::{AuthError, PublishError, StorageError, UriError};
pub use memory::{InMemoryObjectStore, InMemoryPublisher, PublishedMessage, StoredObject};
pub use pubsub::{PubSubPublisher, Publisher};
pub use storage::{GcsObjectStore, ObjectStore};
pub use uri::{parse_gcs_uri, ObjectLocation};
