//! Document storage backends.
//!
//! [`DocumentStore`] is the async trait the sink writes through: upsert one
//! JSON document into a collection by id.
//! [`MemoryStore`] keeps documents in process, for dry runs and tests.
//! [`DirStore`] writes one JSON file per document under a local directory.

mod dir;
mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

use anyhow::Result;
use serde_json::Value;

/// Insert-or-overwrite storage keyed by `(collection, id)`.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert(&self, collection: &str, id: &str, document: &Value) -> Result<()>;
}
