//! Knowledge-base (vector store) endpoints

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ensure_success, ApiClient};
use crate::error::{ApiError, Result};

#[derive(Serialize)]
struct CreateStoreRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

/// A file attached to a vector store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: Option<String>,
    pub filename: String,
    pub vector_store_id: String,
}

impl ApiClient {
    pub async fn create_vector_store(&self, name: &str) -> Result<VectorStore> {
        let url = self.url("/kb/vector-stores");

        let response = self
            .authorize(self.client.post(&url))
            .json(&CreateStoreRequest { name })
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let store: VectorStore = response.json().await?;
        info!("created vector store {}", store.id);
        Ok(store)
    }

    /// Upload a local file into a vector store as a multipart `file` part.
    pub async fn upload_knowledge_file(
        &self,
        vector_store_id: &str,
        path: &Path,
    ) -> Result<UploadedFile> {
        let vector_store_id = vector_store_id.trim();
        if vector_store_id.is_empty() {
            return Err(ApiError::Config(
                "vector store id not configured".to_string(),
            ));
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::Config(format!("not a file: {}", path.display())))?;

        let bytes = tokio::fs::read(path).await?;
        debug!("uploading {} ({} bytes)", filename, bytes.len());

        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename.clone()));
        let url = self.url(&format!("/kb/vector-stores/{}/files", vector_store_id));

        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        // Some deployments answer 204 or a non-JSON ack
        let text = response.text().await?;
        let parsed = serde_json::from_str::<UploadResponse>(&text).ok();

        info!("uploaded {} to vector store {}", filename, vector_store_id);
        Ok(UploadedFile {
            id: parsed.as_ref().and_then(|r| r.id.clone()),
            filename: parsed
                .and_then(|r| r.filename)
                .unwrap_or(filename),
            vector_store_id: vector_store_id.to_string(),
        })
    }
}
