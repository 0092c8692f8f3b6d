use bytes::Bytes;
use drivesync_sync::remote::drive::FOLDER_MIME_TYPE;
use drivesync_sync::{
    ByteStream, DriveConfig, DriveStore, NewNode, NodeField, NodeQuery, NodeUpdate, RemoteStore,
    SyncError,
};
use drivesync_sync::root::linkage_properties;
use drivesync_types::NodeId;
use futures::StreamExt;
use serde_json::json;
use std::collections::BTreeMap;
use wiremock::matchers::{
    body_partial_json, body_string, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn store_for(server: &MockServer) -> DriveStore {
    let store = DriveStore::new(DriveConfig {
        api_base_url: server.uri(),
        ..Default::default()
    })
    .unwrap();
    store.set_access_token("test-token").await;
    store
}

fn file_json(id: &str, name: &str, parent: &str, folder: bool) -> serde_json::Value {
    let mime_type = if folder { FOLDER_MIME_TYPE } else { "text/plain" };
    let mut file = json!({
        "id": id,
        "name": name,
        "parents": [parent],
        "mimeType": mime_type,
        "modifiedTime": "2024-05-01T10:00:00.000Z",
        "appProperties": { "syncRootId": "root1" },
    });
    if !folder {
        file["size"] = json!("5");
        file["sha256Checksum"] = json!("2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824");
    }
    file
}

fn bytes_stream(content: &'static [u8]) -> ByteStream {
    futures::stream::iter(vec![Ok(Bytes::from_static(content))]).boxed()
}

// ── Config and construction ─────────────────────────────────────

#[test]
fn drive_config_default() {
    let cfg = DriveConfig::default();
    assert_eq!(cfg.api_base_url, "https://www.googleapis.com");
    assert_eq!(cfg.page_size, 1000);
    assert_eq!(cfg.connect_timeout_secs, 30);
}

#[test]
fn drive_config_serde_fills_defaults() {
    let cfg: DriveConfig = serde_json::from_str(r#"{"page_size": 50}"#).unwrap();
    assert_eq!(cfg.page_size, 50);
    assert_eq!(cfg.api_base_url, "https://www.googleapis.com");
}

#[tokio::test]
async fn requests_without_token_fail_with_auth() {
    let store = DriveStore::new(DriveConfig::default()).unwrap();
    assert_eq!(store.provider_name(), "Google Drive");
    assert!(!store.is_authenticated().await);

    let err = store.get_node(&NodeId::from("x")).await.unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
    assert!(err.is_setup());
}

// ── Reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn get_node_maps_drive_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/f1"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("f1", "a.txt", "d1", false)))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let node = store.get_node(&NodeId::from("f1")).await.unwrap().unwrap();

    assert_eq!(node.name, "a.txt");
    assert_eq!(node.parents, vec![NodeId::from("d1")]);
    assert!(!node.is_dir);
    assert_eq!(node.size, 5);
    assert_eq!(
        node.checksum.as_deref(),
        Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
    );
    assert_eq!(node.property("syncRootId"), Some("root1"));
}

#[tokio::test]
async fn get_missing_node_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    assert!(store.get_node(&NodeId::from("gone")).await.unwrap().is_none());
}

#[tokio::test]
async fn list_follows_pagination() {
    let server = MockServer::start().await;
    let q = "appProperties has { key='syncRootId' and value='root1' } and trashed = false";

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", q))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [file_json("d1", "docs", "root1", true)],
            "nextPageToken": "page-2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", q))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [file_json("f1", "a.txt", "d1", false)],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let query = NodeQuery::Property {
        key: "syncRootId".to_string(),
        value: "root1".to_string(),
    };
    let nodes = store.list_nodes(&query, NodeField::TREE).await.unwrap();

    let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["docs", "a.txt"]);
    assert!(nodes[0].is_dir);
}

#[tokio::test]
async fn list_children_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'root1' in parents and trashed = false"))
        .and(query_param("fields", "nextPageToken,files(id)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let nodes = store
        .list_nodes(&NodeQuery::Children(NodeId::from("root1")), &[NodeField::Id])
        .await
        .unwrap();
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn download_streams_media() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/f1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let mut stream = store.download(&NodeId::from("f1")).await.unwrap();
    let mut content = Vec::new();
    while let Some(chunk) = stream.next().await {
        content.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(content, b"hello");
}

// ── Writes ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_directory_sends_folder_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(json!({
            "name": "docs",
            "parents": ["root1"],
            "mimeType": FOLDER_MIME_TYPE,
            "appProperties": { "syncRootId": "root1" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("d1", "docs", "root1", true)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let root = NodeId::from("root1");
    let created = store
        .create_node(
            NewNode {
                name: "docs".to_string(),
                parent: root.clone(),
                is_dir: true,
                properties: linkage_properties(&root),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(created.id, NodeId::from("d1"));
    assert!(created.is_dir);
}

#[tokio::test]
async fn create_file_uploads_media() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "f1",
            "name": "a.txt",
            "parents": ["d1"],
            "mimeType": "text/plain",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/f1"))
        .and(query_param("uploadType", "media"))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("f1", "a.txt", "d1", false)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let created = store
        .create_node(
            NewNode {
                name: "a.txt".to_string(),
                parent: NodeId::from("d1"),
                is_dir: false,
                properties: BTreeMap::new(),
            },
            Some(bytes_stream(b"hello")),
        )
        .await
        .unwrap();
    assert_eq!(created.size, 5);
    assert!(created.checksum.is_some());
}

#[tokio::test]
async fn update_properties_patches_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/root1"))
        .and(body_partial_json(json!({ "appProperties": { "syncRoot": "true" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "root1",
            "name": "Sync",
            "mimeType": FOLDER_MIME_TYPE,
            "appProperties": { "syncRoot": "true" },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let update = NodeUpdate {
        properties: BTreeMap::from([("syncRoot".to_string(), "true".to_string())]),
    };
    let node = store
        .update_node(&NodeId::from("root1"), update, None)
        .await
        .unwrap();
    assert_eq!(node.property("syncRoot"), Some("true"));
}

#[tokio::test]
async fn delete_tolerates_missing_node() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    store.delete_node(&NodeId::from("gone")).await.unwrap();
}

// ── Errors ──────────────────────────────────────────────────────

#[tokio::test]
async fn server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/f1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let err = store.delete_node(&NodeId::from("f1")).await.unwrap_err();
    match err {
        SyncError::Api { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("backend error"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let err = store
        .list_nodes(&NodeQuery::Children(NodeId::from("r")), &[NodeField::Id])
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
}
