use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use parley_chat::{AppPhase, MessageStore, Services, SocialStore, Subscription, UserStore};
use parley_types::api::Claims;
use parley_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// A client has this long to send Identify after the socket opens.
pub const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection.
///
/// The client identifies with its JWT, then opens at most one conversation
/// at a time and receives its full snapshot after every change. Being
/// connected counts as being in the foreground for the activity flag.
pub async fn handle_connection<S>(
    socket: WebSocket,
    dispatcher: Dispatcher,
    services: Services<S>,
    jwt_secret: String,
) where
    S: MessageStore + UserStore + SocialStore + 'static,
{
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let Some(claims) = wait_for_identify(&mut receiver, &jwt_secret).await else {
        warn!("WebSocket client failed to identify, closing");
        return;
    };
    let user_id = claims.sub;
    let email = claims.email;

    // The token may outlive the account: re-check it like every REST call.
    let accounts = services.accounts.clone();
    match tokio::task::spawn_blocking(move || accounts.verify(user_id)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            warn!("{} ({}) refused at gateway: {}", email, user_id, e);
            let refusal = GatewayEvent::Error { message: e.to_string() };
            if send_event(&mut sender, &refusal).await {
                let _ = sender.send(Message::Close(None)).await;
            }
            return;
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            return;
        }
    }

    info!("{} ({}) connected to gateway", email, user_id);

    // Step 2: Send Ready, then everyone who is already here
    let ready = GatewayEvent::Ready {
        user_id,
        email: email.clone(),
    };
    if !send_event(&mut sender, &ready).await {
        return;
    }

    for (uid, other) in dispatcher.online_users().await {
        let event = GatewayEvent::PresenceUpdate {
            user_id: uid,
            email: other,
            active: true,
        };
        if !send_event(&mut sender, &event).await {
            return;
        }
    }

    // Step 3: Go active (broadcasts to everyone else on the first connection)
    let conn_id = dispatcher.user_online(user_id, email.clone()).await;
    set_presence(&services, &email, AppPhase::Foreground).await;

    let mut broadcast_rx = dispatcher.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + this connection's own events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                result = direct_rx.recv() => {
                    let Some(event) = result else { break };
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let email_recv = email.clone();
    let services_recv = services.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut forwarder: Option<JoinHandle<()>> = None;

        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&services_recv, &email_recv, cmd, &direct_tx, &mut forwarder).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            email_recv,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        if let Some(handle) = forwarder.take() {
            handle.abort();
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if dispatcher.user_offline(user_id, conn_id).await {
        set_presence(&services, &email, AppPhase::Background).await;
    }
    info!("{} ({}) disconnected from gateway", email, user_id);
}

async fn wait_for_identify<R>(receiver: &mut R, jwt_secret: &str) -> Option<Claims>
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) = serde_json::from_str::<GatewayCommand>(&text) {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

async fn handle_command<S>(
    services: &Services<S>,
    email: &str,
    cmd: GatewayCommand,
    direct_tx: &mpsc::UnboundedSender<GatewayEvent>,
    forwarder: &mut Option<JoinHandle<()>>,
) where
    S: MessageStore + UserStore + SocialStore + 'static,
{
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::OpenConversation { peer } => {
            if let Some(previous) = forwarder.take() {
                previous.abort();
            }

            debug!("{} opening conversation with {}", email, peer);
            let messenger = services.messenger.clone();
            let viewer = email.to_string();
            match tokio::task::spawn_blocking(move || messenger.subscribe(&viewer, &peer)).await {
                Ok(Ok(sub)) => {
                    *forwarder = Some(tokio::spawn(forward_snapshots(sub, direct_tx.clone())));
                }
                Ok(Err(e)) => report(direct_tx, e.to_string()),
                Err(e) => error!("spawn_blocking join error: {}", e),
            }
        }

        GatewayCommand::CloseConversation => {
            if let Some(previous) = forwarder.take() {
                previous.abort();
                debug!("{} closed their conversation", email);
            }
        }

        GatewayCommand::MarkSeen { peer } => {
            let messenger = services.messenger.clone();
            let viewer = email.to_string();
            match tokio::task::spawn_blocking(move || messenger.mark_seen(&viewer, &peer)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => report(direct_tx, e.to_string()),
                Err(e) => error!("spawn_blocking join error: {}", e),
            }
        }
    }
}

/// Push the current snapshot, then one per change, until the subscription
/// is aborted or the connection's outgoing channel closes.
async fn forward_snapshots(mut sub: Subscription, tx: mpsc::UnboundedSender<GatewayEvent>) {
    let conversation = sub.key().to_string();

    let initial = sub.current();
    if tx.send(snapshot_event(&conversation, &initial)).is_err() {
        return;
    }

    loop {
        tokio::select! {
            next = sub.changed() => {
                let Some(snapshot) = next else { break };
                if tx.send(snapshot_event(&conversation, &snapshot)).is_err() {
                    break;
                }
            }
            _ = tx.closed() => break,
        }
    }
}

fn snapshot_event(conversation: &str, snapshot: &parley_chat::Snapshot) -> GatewayEvent {
    GatewayEvent::ConversationSnapshot {
        conversation: conversation.to_string(),
        messages: snapshot.as_ref().clone(),
    }
}

fn report(direct_tx: &mpsc::UnboundedSender<GatewayEvent>, message: String) {
    let _ = direct_tx.send(GatewayEvent::Error { message });
}

async fn set_presence<S>(services: &Services<S>, email: &str, phase: AppPhase)
where
    S: MessageStore + UserStore + SocialStore + 'static,
{
    let presence = services.presence.clone();
    let email = email.to_string();
    let result = tokio::task::spawn_blocking(move || presence.transition(Some(&email), phase)).await;
    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("Failed to record {:?}: {}", phase, e),
        Err(e) => error!("spawn_blocking join error: {}", e),
    }
}

/// Serialize and send one event. Returns false once the socket is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}
