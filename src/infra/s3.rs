use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use bus_ingest::store::DocumentStore;
use serde_json::Value;

/// Stores documents as JSON objects in S3.
///
/// Keys are `<prefix>/<database>/<collection>/<id>.json`. `PutObject`
/// replaces an existing object under the same key, which gives upsert-by-id.
pub struct S3DocumentStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3DocumentStore {
    /// Creates a store using the ambient AWS configuration (env vars, instance
    /// profile, etc.) already loaded by `aws_config::load_from_env`.
    pub fn new(config: &aws_config::SdkConfig, bucket: &str, prefix: &str, database: &str) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
            bucket: bucket.to_string(),
            prefix: key_prefix(prefix, database),
        }
    }
}

fn key_prefix(prefix: &str, database: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        database.to_string()
    } else {
        format!("{prefix}/{database}")
    }
}

fn object_key(prefix: &str, collection: &str, id: &str) -> String {
    format!("{prefix}/{collection}/{id}.json")
}

#[async_trait::async_trait]
impl DocumentStore for S3DocumentStore {
    async fn upsert(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let key = object_key(&self.prefix, collection, id);
        let body = serde_json::to_vec(document)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .with_context(|| format!("S3 PutObject failed for '{key}'"))?;

        Ok(())
    }
}
