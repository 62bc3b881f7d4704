// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Streaming module - MJPEG viewers, WebSocket subscribers, MQTT mirror

mod mjpeg;
mod mqtt;
mod websocket;

pub use mjpeg::*;
pub use mqtt::*;
pub use websocket::*;

use serde::{Deserialize, Serialize};

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Serve MJPEG viewer routes
    pub http_enabled: bool,
    pub http_port: u16,
    /// JPEG quality of viewer frames and face crops
    pub jpeg_quality: u8,
    /// Encoded frames buffered per viewer before the oldest are dropped
    pub viewer_buffer: usize,

    /// Enable WebSocket event server
    pub websocket_enabled: bool,
    pub websocket_port: u16,
    pub websocket_max_clients: usize,

    /// Mirror notifications to MQTT
    pub mqtt_enabled: bool,
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic_prefix: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            http_enabled: true,
            http_port: 5000,
            jpeg_quality: 80,
            viewer_buffer: 4,

            websocket_enabled: true,
            websocket_port: 8765,
            websocket_max_clients: 10,

            mqtt_enabled: false,
            mqtt_broker: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_client_id: "homewatch".to_string(),
            mqtt_username: None,
            mqtt_password: None,
            mqtt_topic_prefix: "homewatch".to_string(),
        }
    }
}
