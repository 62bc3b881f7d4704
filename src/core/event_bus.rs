// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Notification dispatcher: fan-out of alert and activity events to every
//! connected subscriber.
//!
//! Delivery is fire-and-forget. A subscriber only sees events published
//! after it subscribed, and a subscriber that falls more than `capacity`
//! events behind loses the oldest ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Danger,
    Cleared,
}

/// Hazard raised or cleared for one sensor kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub sensor: String,
    pub status: AlertStatus,
    pub description: String,
}

impl AlertEvent {
    pub fn raised(label: &str) -> Self {
        Self {
            sensor: format!("{} Sensor", label),
            status: AlertStatus::Danger,
            description: format!("{} detected in video feed!", label),
        }
    }

    pub fn cleared(label: &str) -> Self {
        Self {
            sensor: format!("{} Sensor", label),
            status: AlertStatus::Cleared,
            description: format!("{} no longer detected in video feed.", label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityStatus {
    Known,
    Unknown,
}

impl IdentityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStatus::Known => "Known",
            IdentityStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityEventKind {
    Face,
}

/// A person seen at the front door for the first time in the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub title: String,
    pub status: IdentityStatus,
    pub description: String,
    /// `data:image/jpeg;base64,...` crop of the face, when encoding succeeded
    pub image_url: Option<String>,
    pub image_hint: ActivityEventKind,
}

impl ActivityEvent {
    pub fn face(name: &str, known: bool, image_url: Option<String>) -> Self {
        let status = if known {
            IdentityStatus::Known
        } else {
            IdentityStatus::Unknown
        };
        Self {
            title: name.to_string(),
            status,
            description: format!("{} person detected at the front door.", status.as_str()),
            image_url,
            image_hint: ActivityEventKind::Face,
        }
    }
}

/// Everything that crosses into the subscriber-facing surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Notification {
    HazardAlert(AlertEvent),
    HazardCleared(AlertEvent),
    ActivityAlert(ActivityEvent),
    AddPersonError { error: String },
}

impl Notification {
    /// Wire name, also used as the MQTT topic suffix
    pub fn name(&self) -> &'static str {
        match self {
            Notification::HazardAlert(_) => "hazard_alert",
            Notification::HazardCleared(_) => "hazard_cleared",
            Notification::ActivityAlert(_) => "activity_alert",
            Notification::AddPersonError { .. } => "add_person_error",
        }
    }
}

/// Published event as seen by subscribers
#[derive(Debug, Clone)]
pub struct Event {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: Arc<Notification>,
}

impl Event {
    /// `{"type", "data", "id", "timestamp"}` JSON for transports
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self.payload.as_ref())?;
        value["id"] = serde_json::json!(self.id);
        value["timestamp"] = serde_json::json!(self.timestamp.to_rfc3339());
        Ok(value)
    }
}

/// Shared by both pipelines and the enrollment path
pub struct NotificationDispatcher {
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl NotificationDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    /// Deliver to every current subscriber; returns how many received it
    pub fn publish(&self, payload: Notification) -> usize {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let name = payload.name();
        let event = Event {
            id,
            timestamp: Utc::now(),
            payload: Arc::new(payload),
        };
        match self.event_tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No subscribers for {} event #{}", name, id);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }

    pub fn published_count(&self) -> u64 {
        self.event_counter.load(Ordering::Relaxed)
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = NotificationDispatcher::new(8);
        assert_eq!(bus.publish(Notification::HazardAlert(AlertEvent::raised("Fire"))), 0);
        assert_eq!(bus.published_count(), 1);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = NotificationDispatcher::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let delivered = bus.publish(Notification::HazardAlert(AlertEvent::raised("Smoke")));
        assert_eq!(delivered, 2);

        let ea = a.recv().await.unwrap();
        let eb = b.recv().await.unwrap();
        assert_eq!(ea.id, eb.id);
        assert_eq!(
            *ea.payload,
            Notification::HazardAlert(AlertEvent {
                sensor: "Smoke Sensor".into(),
                status: AlertStatus::Danger,
                description: "Smoke detected in video feed!".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = NotificationDispatcher::new(8);
        bus.publish(Notification::HazardCleared(AlertEvent::cleared("Fire")));

        let mut late = bus.subscribe();
        bus.publish(Notification::HazardCleared(AlertEvent::cleared("Smoke")));

        let event = late.recv().await.unwrap();
        assert_eq!(event.id, 1);
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_publishers_deliver_whole_events() {
        let bus = Arc::new(NotificationDispatcher::new(1024));
        let mut rx = bus.subscribe();

        let mut handles = Vec::new();
        for label in ["Fire", "Smoke"] {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    bus.publish(Notification::HazardAlert(AlertEvent::raised(label)));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut fire = 0;
        let mut smoke = 0;
        let mut ids = std::collections::HashSet::new();
        while let Ok(event) = rx.try_recv() {
            assert!(ids.insert(event.id));
            match event.payload.as_ref() {
                Notification::HazardAlert(alert) if alert.sensor == "Fire Sensor" => {
                    assert_eq!(alert.description, "Fire detected in video feed!");
                    fire += 1;
                }
                Notification::HazardAlert(alert) => {
                    assert_eq!(alert.description, "Smoke detected in video feed!");
                    smoke += 1;
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!((fire, smoke), (100, 100));
    }

    #[test]
    fn test_wire_format_uses_event_names() {
        let event = Event {
            id: 7,
            timestamp: Utc::now(),
            payload: Arc::new(Notification::ActivityAlert(ActivityEvent {
                title: "Jane Doe".into(),
                status: IdentityStatus::Known,
                description: "Known person detected at the front door.".into(),
                image_url: None,
                image_hint: ActivityEventKind::Face,
            })),
        };

        let json = event.to_json().unwrap();
        assert_eq!(json["type"], "activity_alert");
        assert_eq!(json["id"], 7);
        assert_eq!(json["data"]["status"], "Known");
        assert_eq!(json["data"]["imageHint"], "face");

        let cleared = serde_json::to_value(Notification::HazardCleared(AlertEvent::cleared("Fire"))).unwrap();
        assert_eq!(cleared["data"]["status"], "CLEARED");
    }
}
