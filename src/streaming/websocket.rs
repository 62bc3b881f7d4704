// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! WebSocket server for alert subscribers

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::core::{Notification, NotificationDispatcher};
use crate::enrollment::EnrollmentService;
use crate::pipeline::Acknowledgement;

/// WebSocket server
pub struct EventServer {
    port: u16,
    max_clients: usize,
    clients: Arc<RwLock<HashMap<String, ClientHandle>>>,
    dispatcher: Arc<NotificationDispatcher>,
    acknowledgements: Option<mpsc::UnboundedSender<Acknowledgement>>,
    enrollment: Option<Arc<EnrollmentService>>,
}

struct ClientHandle {
    addr: SocketAddr,
    connected_at: DateTime<Utc>,
}

/// What a connection handler needs from the server
#[derive(Clone)]
struct Shared {
    clients: Arc<RwLock<HashMap<String, ClientHandle>>>,
    dispatcher: Arc<NotificationDispatcher>,
    acknowledgements: Option<mpsc::UnboundedSender<Acknowledgement>>,
    enrollment: Option<Arc<EnrollmentService>>,
}

/// Connection cap shared by the accept loop
struct ConnectionSlots {
    in_use: Arc<AtomicUsize>,
    max: usize,
}

/// One occupied slot, given back on drop
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlots {
    fn acquire(&self) -> Option<ConnectionSlot> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.max).then_some(n + 1))
            .ok()
            .map(|_| ConnectionSlot(self.in_use.clone()))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Deserialize)]
struct ResetAlert {
    room: String,
}

#[derive(Debug, Deserialize)]
struct NewPerson {
    name: String,
    image: String,
}

impl EventServer {
    pub fn new(port: u16, max_clients: usize, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            port,
            max_clients,
            clients: Arc::new(RwLock::new(HashMap::new())),
            dispatcher,
            acknowledgements: None,
            enrollment: None,
        }
    }

    /// Forward `user_reset_alert` messages to the hazard pipeline
    pub fn with_acknowledgements(mut self, tx: mpsc::UnboundedSender<Acknowledgement>) -> Self {
        self.acknowledgements = Some(tx);
        self
    }

    /// Accept `add_new_person` requests
    pub fn with_enrollment(mut self, enrollment: Arc<EnrollmentService>) -> Self {
        self.enrollment = Some(enrollment);
        self
    }

    /// Bind and serve in the background; returns the bound address
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<SocketAddr> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        let local = listener.local_addr()?;

        info!("WebSocket server listening on ws://{}", local);

        let slots = ConnectionSlots {
            in_use: Arc::new(AtomicUsize::new(0)),
            max: self.max_clients,
        };
        let shared = Shared {
            clients: self.clients.clone(),
            dispatcher: self.dispatcher.clone(),
            acknowledgements: self.acknowledgements.clone(),
            enrollment: self.enrollment.clone(),
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                // Held from accept, so handshakes in flight count too
                                let Some(slot) = slots.acquire() else {
                                    warn!("Max clients reached, rejecting connection from {}", addr);
                                    continue;
                                };

                                // Subscribe now so nothing published after accept is missed
                                let events = shared.dispatcher.subscribe();
                                tokio::spawn(handle_connection(stream, addr, shared.clone(), events, slot));
                            }
                            Err(e) => {
                                error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("WebSocket server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(local)
    }

    pub async fn get_client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn get_client_addrs(&self) -> Vec<SocketAddr> {
        self.clients.read().await.values().map(|c| c.addr).collect()
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    shared: Shared,
    mut events: broadcast::Receiver<crate::core::Event>,
    _slot: ConnectionSlot,
) {
    let client_id = uuid::Uuid::new_v4().to_string();

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    // Register client
    let count = {
        let mut clients = shared.clients.write().await;
        clients.insert(
            client_id.clone(),
            ClientHandle {
                addr,
                connected_at: Utc::now(),
            },
        );
        clients.len()
    };
    info!("Client connected from {} (id: {}, {} connected)", addr, client_id, count);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Send welcome message
    let welcome = serde_json::json!({
        "type": "welcome",
        "client_id": client_id,
        "server": crate::NAME,
        "version": env!("CARGO_PKG_VERSION"),
    });

    if let Err(e) = ws_sender.send(Message::Text(welcome.to_string())).await {
        warn!("Failed to send welcome: {}", e);
    }

    loop {
        tokio::select! {
            // Incoming messages from client
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received from {}: {}", addr, text);
                        if let Some(reply) = handle_command(&text, addr, &shared).await {
                            if let Err(e) = ws_sender.send(Message::Text(reply.to_string())).await {
                                warn!("Failed to reply to {}: {}", addr, e);
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("WebSocket closed by client {}", addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            // Outgoing notifications
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let json = match event.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to serialize event #{}: {}", event.id, e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sender.send(Message::Text(json.to_string())).await {
                            warn!("Failed to send to {}: {}", addr, e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Client {} missed {} events", addr, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Remove client
    let (count, connected_at) = {
        let mut clients = shared.clients.write().await;
        let handle = clients.remove(&client_id);
        (clients.len(), handle.map(|h| h.connected_at))
    };

    let duration = connected_at
        .map(|at| (Utc::now() - at).num_seconds())
        .unwrap_or_default();
    info!(
        "Client {} disconnected after {}s ({} connected)",
        addr, duration, count
    );
}

/// Handle one inbound command; returns the direct reply, if any
async fn handle_command(text: &str, addr: SocketAddr, shared: &Shared) -> Option<serde_json::Value> {
    let cmd = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            debug!("Ignoring non-JSON message from {}: {}", addr, e);
            return None;
        }
    };
    let cmd_type = cmd.get("type").and_then(|v| v.as_str())?;
    let data = cmd.get("data").cloned().unwrap_or(serde_json::Value::Null);

    match cmd_type {
        "ping" => Some(serde_json::json!({"type": "pong"})),
        "test_event" => {
            info!("Test event from {}: {}", addr, data);
            None
        }
        "user_reset_alert" => {
            match serde_json::from_value::<ResetAlert>(data) {
                Ok(reset) => {
                    info!("User acknowledged alert in {}, re-arming detection", reset.room);
                    match &shared.acknowledgements {
                        Some(tx) => {
                            if tx.send(Acknowledgement { room: reset.room }).is_err() {
                                warn!("Hazard pipeline is not running; acknowledgement dropped");
                            }
                        }
                        None => debug!("No hazard pipeline to acknowledge"),
                    }
                }
                Err(e) => warn!("Malformed user_reset_alert from {}: {}", addr, e),
            }
            None
        }
        "add_new_person" => {
            let result = match (serde_json::from_value::<NewPerson>(data), &shared.enrollment) {
                (Ok(person), Some(enrollment)) => {
                    info!("Received request to add new person: {}", person.name);
                    enrollment
                        .enroll_data_uri(&person.name, &person.image)
                        .await
                        .map_err(|e| e.to_string())
                }
                (Err(e), _) => Err(format!("malformed add_new_person request: {}", e)),
                (Ok(_), None) => Err("enrollment is not available".to_string()),
            };

            match result {
                Ok(enrollment) => Some(serde_json::json!({
                    "type": "add_person_ok",
                    "data": { "name": enrollment.name },
                })),
                Err(error) => {
                    warn!("Error adding new person: {}", error);
                    shared.dispatcher.publish(Notification::AddPersonError { error });
                    None
                }
            }
        }
        other => {
            debug!("Unknown command {:?} from {}", other, addr);
            None
        }
    }
}
