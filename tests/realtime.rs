//! End-to-end tests: a real server on a free port, real HTTP and
//! WebSocket clients talking to it.

use std::sync::Arc;
use std::time::Duration;

use coedit::clients::{ClientError, CollabConnection, DocumentApiClient, DocumentSync};
use coedit::config::Config;
use coedit::db::filedocs::FileRepository;
use coedit::models::{
    ClientMessage, CursorPosition, DocumentUpdate, JoinMessage, Operation, ServerMessage, UserInfo,
};
use coedit::routes::app_router;
use coedit::services::DocumentStore;
use coedit::state::AppState;
use tokio::time::timeout;

struct TestServer {
    addr: std::net::SocketAddr,
    _dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::open(dir.path()).await.unwrap();
        let state = AppState::new(DocumentStore::new(Arc::new(repo)));
        let app = app_router(state, &Config::default());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, _dir: dir }
    }

    fn api(&self) -> DocumentApiClient {
        DocumentApiClient::new(format!("http://{}/api", self.addr)).unwrap()
    }

    async fn connect(&self) -> CollabConnection {
        CollabConnection::connect(&format!("ws://{}/ws", self.addr)).await.unwrap()
    }
}

async fn next(conn: &mut CollabConnection) -> ServerMessage {
    timeout(Duration::from_secs(2), conn.next_event())
        .await
        .expect("timed out waiting for an event")
        .expect("channel closed")
}

async fn assert_silent(conn: &mut CollabConnection) {
    let got = timeout(Duration::from_millis(200), conn.next_event()).await;
    assert!(got.is_err(), "unexpected event: {:?}", got);
}

/// Send a ping and wait for its pong, so everything sent before it has been handled
async fn settle(conn: &mut CollabConnection) {
    conn.send(ClientMessage::Ping).unwrap();
    assert!(matches!(next(conn).await, ServerMessage::Pong(_)));
}

#[tokio::test]
async fn test_document_api_round_trip() {
    let server = TestServer::start().await;
    let api = server.api();

    let doc = api.create_document(Some("Minutes".to_string())).await.unwrap();
    assert_eq!(doc.title, "Minutes");
    assert_eq!(doc.content, "");

    let updated = api
        .update_document(doc.id, &DocumentUpdate::content("<p>agenda</p>"))
        .await
        .unwrap();
    assert_eq!(updated.title, "Minutes");
    assert!(updated.last_modified > doc.last_modified);

    assert_eq!(api.get_document(doc.id).await.unwrap(), updated);

    let untitled = api.create_document(None).await.unwrap();
    let listed = api.list_documents().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, untitled.id);
    assert_eq!(listed[0].title, "Untitled Document");

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(api.get_document(missing).await, Err(ClientError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn test_changes_reach_peers_but_not_sender() {
    let server = TestServer::start().await;
    let doc = server.api().create_document(None).await.unwrap();

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    assert_ne!(alice.connection_id(), bob.connection_id());

    alice
        .send(ClientMessage::Join(JoinMessage {
            document_id: doc.id,
            user: Some(UserInfo {
                name: Some("Alice".to_string()),
                color: None,
            }),
        }))
        .unwrap();
    settle(&mut alice).await;

    bob.send(ClientMessage::Join(JoinMessage {
        document_id: doc.id,
        user: None,
    }))
    .unwrap();
    match next(&mut alice).await {
        ServerMessage::Joined(joined) => assert_eq!(joined.connection_id, bob.connection_id()),
        other => panic!("expected joined, got {:?}", other),
    }

    for text in ["<p>a</p>", "<p>ab</p>", "<p>abc</p>"] {
        bob.send(ClientMessage::Change(coedit::models::ChangeMessage {
            document_id: doc.id,
            content: text.to_string(),
            operation: Operation::Insert,
        }))
        .unwrap();
    }
    for text in ["<p>a</p>", "<p>ab</p>", "<p>abc</p>"] {
        match next(&mut alice).await {
            ServerMessage::Update(update) => {
                assert_eq!(update.content, text);
                assert_eq!(update.sender_id, bob.connection_id());
            }
            other => panic!("expected update, got {:?}", other),
        }
    }
    assert_silent(&mut bob).await;

    alice
        .send(ClientMessage::Cursor(coedit::models::CursorMessage {
            document_id: doc.id,
            position: CursorPosition { index: 3, length: 0 },
        }))
        .unwrap();
    match next(&mut bob).await {
        ServerMessage::CursorUpdate(cursor) => {
            assert_eq!(cursor.sender_id, alice.connection_id());
            assert_eq!(cursor.position.index, 3);
        }
        other => panic!("expected cursorUpdate, got {:?}", other),
    }
    assert_silent(&mut alice).await;

    let bob_id = bob.connection_id();
    bob.close().await;
    match next(&mut alice).await {
        ServerMessage::Left(left) => assert_eq!(left.connection_id, bob_id),
        other => panic!("expected left, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let server = TestServer::start().await;
    let api = server.api();
    let first = api.create_document(None).await.unwrap();
    let second = api.create_document(None).await.unwrap();

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    for (conn, id) in [(&mut alice, first.id), (&mut bob, second.id)] {
        conn.send(ClientMessage::Join(JoinMessage {
            document_id: id,
            user: None,
        }))
        .unwrap();
        settle(conn).await;
    }

    bob.send(ClientMessage::Change(coedit::models::ChangeMessage {
        document_id: second.id,
        content: "elsewhere".to_string(),
        operation: Operation::Update,
    }))
    .unwrap();
    settle(&mut bob).await;
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_sync_clients_converge_and_persist() {
    let server = TestServer::start().await;
    let api = server.api();
    let doc = api.create_document(None).await.unwrap();

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    let mut alice_sync = DocumentSync::with_save_delay(
        &doc,
        alice.sender(),
        Arc::new(api.clone()),
        Duration::from_millis(100),
    );
    let mut bob_sync = DocumentSync::with_save_delay(
        &doc,
        bob.sender(),
        Arc::new(api.clone()),
        Duration::from_millis(100),
    );

    alice_sync.join(None).unwrap();
    settle(&mut alice).await;
    bob_sync.join(None).unwrap();
    settle(&mut bob).await;
    assert!(!alice_sync.apply_remote(next(&mut alice).await));
    assert_eq!(alice_sync.peers().len(), 1);

    alice_sync.local_edit("<p>shared</p>").unwrap();
    assert!(bob_sync.apply_remote(next(&mut bob).await));
    assert_eq!(bob_sync.content(), "<p>shared</p>");
    assert!(!bob_sync.has_pending_save());

    alice_sync.flush().await.unwrap();
    assert_eq!(api.get_document(doc.id).await.unwrap().content, "<p>shared</p>");
}
