//! Drives `handle_connection` over a real socket: axum on an ephemeral port,
//! tokio-tungstenite on the client side.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use uuid::Uuid;

use parley_chat::{MemoryStore, MessageDraft, NewUser, Services, SystemClock, UserStore};
use parley_gateway::connection::handle_connection;
use parley_gateway::dispatcher::Dispatcher;
use parley_types::api::Claims;
use parley_types::events::{GatewayCommand, GatewayEvent};
use parley_types::models::{AccountStatus, MessageStatus, UserRecord};

const SECRET: &str = "gateway-test-secret";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone)]
struct TestState {
    dispatcher: Dispatcher,
    services: Services<MemoryStore>,
}

struct Harness {
    addr: SocketAddr,
    store: Arc<MemoryStore>,
    state: TestState,
}

async fn gateway(ws: WebSocketUpgrade, State(state): State<TestState>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state.dispatcher, state.services, SECRET.to_string()))
}

async fn start() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let state = TestState {
        dispatcher: Dispatcher::new(),
        services: Services::new(store.clone(), Arc::new(SystemClock)),
    };
    let app = Router::new().route("/gateway", get(gateway)).with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Harness { addr, store, state }
}

impl Harness {
    fn user(&self, email: &str, first: &str) -> UserRecord {
        self.store
            .add_user(NewUser {
                email: email.to_string(),
                first_name: first.to_string(),
                last_name: "Tester".to_string(),
                profile_picture: None,
            })
            .unwrap()
    }

    fn is_active(&self, email: &str) -> bool {
        self.store.user_by_email(email).unwrap().unwrap().active_status
    }

    /// Open a socket and send Identify with `token`.
    async fn connect_with(&self, token: String) -> Client {
        let (mut client, _) = connect_async(format!("ws://{}/gateway", self.addr)).await.unwrap();
        send(&mut client, &GatewayCommand::Identify { token }).await;
        client
    }

    /// Connect as `user` and wait for Ready.
    async fn connect(&self, user: &UserRecord) -> Client {
        let mut client = self.connect_with(token(SECRET, user)).await;
        match next_event(&mut client).await {
            GatewayEvent::Ready { user_id, .. } => assert_eq!(user_id, user.id),
            other => panic!("expected Ready, got {:?}", other),
        }
        client
    }

    async fn wait_for_connections(&self, user_id: Uuid, count: usize) {
        for _ in 0..500 {
            if self.state.dispatcher.connection_count(user_id).await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("user never reached {} connections", count);
    }
}

fn token(secret: &str, user: &UserRecord) -> String {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        exp: 4_000_000_000,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

async fn send(client: &mut Client, cmd: &GatewayCommand) {
    let text = serde_json::to_string(cmd).unwrap();
    client.send(Message::Text(text.into())).await.unwrap();
}

/// Next JSON event, skipping control frames.
async fn next_event(client: &mut Client) -> GatewayEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("socket ended while waiting for an event: {:?}", other),
            }
        }
    })
    .await
    .expect("no event within 5s")
}

/// Skip events until a snapshot satisfies `accept`, and return its texts.
async fn snapshot_where<F>(client: &mut Client, accept: F) -> Vec<String>
where
    F: Fn(&[parley_types::models::MessageRecord]) -> bool,
{
    loop {
        if let GatewayEvent::ConversationSnapshot { messages, .. } = next_event(client).await {
            if accept(&messages) {
                return messages.into_iter().filter_map(|m| m.text).collect();
            }
        }
    }
}

async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held");
}

#[tokio::test]
async fn connecting_is_foreground_and_disconnecting_is_background() {
    let h = start().await;
    let alice = h.user("alice@x.com", "Alice");
    assert!(!h.is_active("alice@x.com"));

    let mut client = h.connect(&alice).await;
    wait_until(|| h.is_active("alice@x.com")).await;

    client.close(None).await.unwrap();
    wait_until(|| !h.is_active("alice@x.com")).await;
    h.wait_for_connections(alice.id, 0).await;
}

#[tokio::test]
async fn older_connection_keeps_user_active() {
    let h = start().await;
    let alice = h.user("alice@x.com", "Alice");

    let mut older = h.connect(&alice).await;
    let mut newer = h.connect(&alice).await;
    h.wait_for_connections(alice.id, 2).await;
    wait_until(|| h.is_active("alice@x.com")).await;

    // The newest socket goes first; the older one is still open.
    newer.close(None).await.unwrap();
    h.wait_for_connections(alice.id, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.is_active("alice@x.com"));

    older.close(None).await.unwrap();
    wait_until(|| !h.is_active("alice@x.com")).await;
}

#[tokio::test]
async fn open_conversation_streams_snapshots_until_closed() {
    let h = start().await;
    let alice = h.user("alice@x.com", "Alice");
    h.user("bob@x.com", "Bob");
    let messenger = h.state.services.messenger.clone();
    messenger
        .send("bob@x.com", "alice@x.com", MessageDraft::text("hello").unwrap())
        .unwrap();

    let mut client = h.connect(&alice).await;
    send(&mut client, &GatewayCommand::OpenConversation { peer: "bob@x.com".into() }).await;
    let initial = snapshot_where(&mut client, |_| true).await;
    assert_eq!(initial, vec!["hello".to_string()]);

    messenger
        .send("bob@x.com", "alice@x.com", MessageDraft::text("again").unwrap())
        .unwrap();
    let updated = snapshot_where(&mut client, |m| m.len() == 2).await;
    assert_eq!(updated, vec!["hello".to_string(), "again".to_string()]);

    // Read receipts flow back through the same snapshot stream.
    send(&mut client, &GatewayCommand::MarkSeen { peer: "bob@x.com".into() }).await;
    snapshot_where(&mut client, |m| m.iter().all(|msg| msg.status == MessageStatus::Seen)).await;

    send(&mut client, &GatewayCommand::CloseConversation).await;
    wait_until(|| messenger.subscriber_count("alice@x.com", "bob@x.com") == 0).await;

    messenger
        .send("bob@x.com", "alice@x.com", MessageDraft::text("after close").unwrap())
        .unwrap();
    let quiet = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            if let GatewayEvent::ConversationSnapshot { .. } = next_event(&mut client).await {
                return;
            }
        }
    })
    .await;
    assert!(quiet.is_err(), "snapshot arrived after CloseConversation");
}

#[tokio::test]
async fn disabled_account_is_refused() {
    let h = start().await;
    let alice = h.user("alice@x.com", "Alice");
    let stale_token = token(SECRET, &alice);
    h.store.set_account_status(alice.id, AccountStatus::Disabled).unwrap();

    let mut client = h.connect_with(stale_token).await;
    match next_event(&mut client).await {
        GatewayEvent::Error { message } => assert!(message.contains("disabled"), "{}", message),
        other => panic!("expected Error, got {:?}", other),
    }
    assert_eq!(h.state.dispatcher.connection_count(alice.id).await, 0);
    assert!(!h.is_active("alice@x.com"));
}

#[tokio::test]
async fn forged_token_gets_no_ready() {
    let h = start().await;
    let alice = h.user("alice@x.com", "Alice");

    let mut client = h.connect_with(token("not-the-secret", &alice)).await;
    let next = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("server should hang up");
    assert!(
        matches!(next, None | Some(Err(_)) | Some(Ok(Message::Close(_)))),
        "unexpected frame: {:?}",
        next
    );
    assert_eq!(h.state.dispatcher.connection_count(alice.id).await, 0);
}
