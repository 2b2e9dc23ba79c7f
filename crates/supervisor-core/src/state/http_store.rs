use crate::{error::StoreError, state::StatusStore};
use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use tracing::debug;

/// Document store reached over HTTP: every write is a `PUT {base_url}/{key}`.
pub struct HttpStatusStore {
    client: Client,
    base_url: String,
}

impl HttpStatusStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url_for(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl StatusStore for HttpStatusStore {
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let url = self.url_for(key);
        debug!(%url, "Writing status document");

        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(value.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
