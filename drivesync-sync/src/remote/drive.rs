//! Google Drive store implementation.
//!
//! Uses Google Drive API v3. Sync metadata lives in `appProperties`, which
//! are private to the OAuth client that wrote them. Obtaining and refreshing
//! the access token is the caller's job.

use super::store::{
    ByteStream, NewNode, NodeField, NodeQuery, NodeUpdate, RemoteNode, RemoteStore,
};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drivesync_types::NodeId;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Body, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Base URL for Google Drive API (e.g. `https://www.googleapis.com`).
    pub api_base_url: String,
    /// Page size for file listings (Drive caps this at 1000).
    pub page_size: u32,
    /// TCP connect timeout in seconds. Transfers themselves are bounded by
    /// the engine's idle timeout, not by a total request timeout.
    pub connect_timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com".to_string(),
            page_size: 1000,
            connect_timeout_secs: 30,
        }
    }
}

/// Google Drive API response structures.
#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    size: Option<String>,
    #[serde(rename = "modifiedTime")]
    modified_time: Option<String>,
    #[serde(rename = "sha256Checksum")]
    sha256_checksum: Option<String>,
    #[serde(rename = "appProperties", default)]
    app_properties: BTreeMap<String, String>,
}

impl From<DriveFile> for RemoteNode {
    fn from(file: DriveFile) -> Self {
        let modified_at = file.modified_time.and_then(|t| {
            DateTime::parse_from_rfc3339(&t)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        });
        RemoteNode {
            id: NodeId::new(file.id),
            name: file.name,
            parents: file.parents.into_iter().map(NodeId::new).collect(),
            checksum: file.sha256_checksum.map(|c| c.to_ascii_lowercase()),
            is_dir: file.mime_type.as_deref() == Some(FOLDER_MIME_TYPE),
            size: file.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            modified_at,
            properties: file.app_properties,
        }
    }
}

fn field_name(field: NodeField) -> &'static str {
    match field {
        NodeField::Id => "id",
        NodeField::Name => "name",
        NodeField::Parents => "parents",
        NodeField::Checksum => "sha256Checksum",
        NodeField::Kind => "mimeType",
        NodeField::Size => "size",
        NodeField::ModifiedAt => "modifiedTime",
        NodeField::Properties => "appProperties",
    }
}

/// Comma-separated Drive field list; `id` is always included.
pub fn file_fields(fields: &[NodeField]) -> String {
    let mut names = vec!["id"];
    for field in fields {
        let name = field_name(*field);
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(",")
}

/// Escapes a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Translates a [`NodeQuery`] into the Drive `q` syntax.
pub fn query_string(query: &NodeQuery) -> String {
    match query {
        NodeQuery::Property { key, value } => format!(
            "appProperties has {{ key='{}' and value='{}' }} and trashed = false",
            escape_query_value(key),
            escape_query_value(value)
        ),
        NodeQuery::Children(parent) => format!(
            "'{}' in parents and trashed = false",
            escape_query_value(parent.as_str())
        ),
    }
}

/// Google Drive store.
pub struct DriveStore {
    config: DriveConfig,
    client: Client,
    access_token: Arc<RwLock<Option<String>>>,
}

impl DriveStore {
    /// Creates a new Google Drive store.
    pub fn new(config: DriveConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Sets the bearer token used for every request.
    pub async fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write().await = Some(token.into());
    }

    /// Whether a token has been set.
    pub async fn is_authenticated(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    async fn token(&self) -> SyncResult<String> {
        self.access_token
            .read()
            .await
            .clone()
            .ok_or_else(|| SyncError::Auth("no access token set".to_string()))
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.config.api_base_url)
    }

    fn file_url(&self, id: &NodeId) -> String {
        format!("{}/drive/v3/files/{}", self.config.api_base_url, id)
    }

    fn upload_url(&self, id: &NodeId) -> String {
        format!("{}/upload/drive/v3/files/{}", self.config.api_base_url, id)
    }

    /// Replaces a file's content with a streamed media upload.
    async fn upload_media(&self, id: &NodeId, content: ByteStream) -> SyncResult<RemoteNode> {
        let token = self.token().await?;
        let fields = file_fields(NodeField::ALL);
        let response = self
            .client
            .patch(self.upload_url(id))
            .bearer_auth(&token)
            .query(&[("uploadType", "media"), ("fields", fields.as_str())])
            .header("Content-Type", "application/octet-stream")
            .body(Body::wrap_stream(content))
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("upload failed: {e}")))?;

        let file: DriveFile = check(response, "upload")
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("parse upload response failed: {e}")))?;
        Ok(file.into())
    }
}

async fn check(response: Response, what: &str) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(SyncError::Auth(format!("{what} rejected: {body}")));
    }
    Err(SyncError::Api {
        status: status.as_u16(),
        message: format!("{what} failed: {body}"),
    })
}

#[async_trait]
impl RemoteStore for DriveStore {
    fn provider_name(&self) -> &'static str {
        "Google Drive"
    }

    async fn get_node(&self, id: &NodeId) -> SyncResult<Option<RemoteNode>> {
        let token = self.token().await?;
        let fields = file_fields(NodeField::ALL);

        let response = self
            .client
            .get(self.file_url(id))
            .bearer_auth(&token)
            .query(&[("fields", fields.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("get file failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let file: DriveFile = check(response, "get file")
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("failed to parse file: {e}")))?;
        Ok(Some(file.into()))
    }

    async fn list_nodes(
        &self,
        query: &NodeQuery,
        fields: &[NodeField],
    ) -> SyncResult<Vec<RemoteNode>> {
        let token = self.token().await?;
        let q = query_string(query);
        let fields = format!("nextPageToken,files({})", file_fields(fields));
        let page_size = self.config.page_size.to_string();

        let mut all_nodes = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.files_url())
                .bearer_auth(&token)
                .query(&[
                    ("q", q.as_str()),
                    ("fields", fields.as_str()),
                    ("pageSize", page_size.as_str()),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SyncError::Network(format!("file list failed: {e}")))?;

            let file_list: DriveFileList = check(response, "file list")
                .await?
                .json()
                .await
                .map_err(|e| SyncError::Network(format!("failed to parse file list: {e}")))?;

            all_nodes.extend(file_list.files.into_iter().map(RemoteNode::from));

            page_token = file_list.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!("Listed {} Drive files for {:?}", all_nodes.len(), query);
        Ok(all_nodes)
    }

    async fn create_node(
        &self,
        node: NewNode,
        content: Option<ByteStream>,
    ) -> SyncResult<RemoteNode> {
        let token = self.token().await?;
        let fields = file_fields(NodeField::ALL);

        let mut metadata = serde_json::json!({
            "name": node.name,
            "parents": [node.parent.as_str()],
            "appProperties": node.properties,
        });
        if node.is_dir {
            metadata["mimeType"] = serde_json::Value::from(FOLDER_MIME_TYPE);
        }

        let response = self
            .client
            .post(self.files_url())
            .bearer_auth(&token)
            .query(&[("fields", fields.as_str())])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("create failed: {e}")))?;

        let created: DriveFile = check(response, "create")
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("parse create response failed: {e}")))?;
        let created = RemoteNode::from(created);
        info!("Created {} (id: {})", created.name, created.id);

        match content {
            Some(content) => self.upload_media(&created.id, content).await,
            None => Ok(created),
        }
    }

    async fn update_node(
        &self,
        id: &NodeId,
        update: NodeUpdate,
        content: Option<ByteStream>,
    ) -> SyncResult<RemoteNode> {
        let mut latest = None;

        if !update.is_empty() {
            let token = self.token().await?;
            let fields = file_fields(NodeField::ALL);
            let metadata = serde_json::json!({ "appProperties": update.properties });

            let response = self
                .client
                .patch(self.file_url(id))
                .bearer_auth(&token)
                .query(&[("fields", fields.as_str())])
                .json(&metadata)
                .send()
                .await
                .map_err(|e| SyncError::Network(format!("update failed: {e}")))?;

            let file: DriveFile = check(response, "update")
                .await?
                .json()
                .await
                .map_err(|e| SyncError::Network(format!("parse update response failed: {e}")))?;
            latest = Some(RemoteNode::from(file));
        }

        if let Some(content) = content {
            latest = Some(self.upload_media(id, content).await?);
        }

        match latest {
            Some(node) => Ok(node),
            None => self
                .get_node(id)
                .await?
                .ok_or_else(|| SyncError::Api {
                    status: 404,
                    message: format!("file {id} not found"),
                }),
        }
    }

    async fn download(&self, id: &NodeId) -> SyncResult<ByteStream> {
        let token = self.token().await?;

        debug!("Downloading file: {}", id);

        let response = self
            .client
            .get(self.file_url(id))
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("download failed: {e}")))?;

        let response = check(response, "download").await?;
        Ok(response
            .bytes_stream()
            .map_err(|e| SyncError::Network(format!("read download body failed: {e}")))
            .boxed())
    }

    async fn delete_node(&self, id: &NodeId) -> SyncResult<()> {
        let token = self.token().await?;

        debug!("Deleting file: {}", id);

        let response = self
            .client
            .delete(self.file_url(id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("delete failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response, "delete").await?;

        info!("Deleted file: {}", id);
        Ok(())
    }
}
