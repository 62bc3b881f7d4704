// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! MQTT mirror of the notification stream

use anyhow::{anyhow, Result};
use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::StreamingConfig;
use crate::core::{Event, NotificationDispatcher};

/// Publishes every notification to `<prefix>/<event name>`
pub struct MqttMirror {
    client: AsyncClient,
    topic_prefix: String,
    broker: String,
}

impl MqttMirror {
    /// Create the client and spawn its event loop. Connection happens in the
    /// background; an unreachable broker is retried every 5 seconds.
    pub fn new(config: &StreamingConfig) -> Self {
        let mut options = MqttOptions::new(&config.mqtt_client_id, &config.mqtt_broker, config.mqtt_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.mqtt_username, &config.mqtt_password) {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 100);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(MqttEvent::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT connected");
                    }
                    Ok(MqttEvent::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                        debug!("MQTT disconnecting");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT error: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        Self {
            client,
            topic_prefix: config.mqtt_topic_prefix.trim_end_matches('/').to_string(),
            broker: format!("{}:{}", config.mqtt_broker, config.mqtt_port),
        }
    }

    pub fn topic_for(&self, event: &Event) -> String {
        format!("{}/{}", self.topic_prefix, event.payload.name())
    }

    pub async fn publish(&self, event: &Event) -> Result<()> {
        let json = serde_json::to_vec(&event.to_json()?)?;

        self.client
            .publish(self.topic_for(event), QoS::AtLeastOnce, false, json)
            .await
            .map_err(|e| anyhow!("MQTT publish failed: {}", e))?;

        Ok(())
    }

    /// Mirror `dispatcher` until shutdown
    pub fn spawn(
        self,
        dispatcher: &NotificationDispatcher,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let mut events = dispatcher.subscribe();
        let mirror = Arc::new(self);
        info!("Mirroring notifications to MQTT broker {}", mirror.broker);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(event) => {
                                if let Err(e) = mirror.publish(&event).await {
                                    error!("{}", e);
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(missed)) => {
                                warn!("MQTT mirror missed {} events", missed);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }

            if let Err(e) = mirror.client.disconnect().await {
                debug!("MQTT disconnect failed: {}", e);
            }
        })
    }
}
