// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Hazard alert debouncing

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::{AlertEvent, Notification};
use crate::inference::{FIRE_LABEL, SMOKE_LABEL};

/// Sensor kinds announced as cleared when an alert ends
const TRACKED_SENSORS: [&str; 2] = [FIRE_LABEL, SMOKE_LABEL];

/// How hazard labels turn into alerts. One policy per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardPolicy {
    /// Alert on Clear -> Alerting, announce clearance on Alerting -> Clear
    EdgeTriggered,
    /// At most one alert per cooldown interval, never a clearance;
    /// a user acknowledgement re-arms immediately
    Cooldown { cooldown_secs: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardAlertState {
    Clear,
    Alerting,
}

#[derive(Debug)]
enum Mode {
    Edge {
        state: HazardAlertState,
    },
    Cooldown {
        cooldown: Duration,
        last_alert: DateTime<Utc>,
    },
}

/// Per-pipeline hazard alert state
#[derive(Debug)]
pub struct HazardAlertMachine {
    mode: Mode,
}

impl HazardAlertMachine {
    pub fn new(policy: &HazardPolicy) -> Self {
        let mode = match policy {
            HazardPolicy::EdgeTriggered => Mode::Edge {
                state: HazardAlertState::Clear,
            },
            HazardPolicy::Cooldown { cooldown_secs } => Mode::Cooldown {
                cooldown: Duration::milliseconds((cooldown_secs * 1000.0) as i64),
                last_alert: DateTime::<Utc>::default(),
            },
        };
        Self { mode }
    }

    /// Latch state; `None` under the cooldown policy
    pub fn state(&self) -> Option<HazardAlertState> {
        match &self.mode {
            Mode::Edge { state } => Some(*state),
            Mode::Cooldown { .. } => None,
        }
    }

    /// Feed one frame's label
    pub fn observe(&mut self, label: Option<&str>, now: DateTime<Utc>) -> Vec<Notification> {
        match &mut self.mode {
            Mode::Edge { state } => match (*state, label) {
                (HazardAlertState::Clear, Some(label)) => {
                    *state = HazardAlertState::Alerting;
                    warn!("Hazard raised: {}", label);
                    vec![Notification::HazardAlert(AlertEvent::raised(label))]
                }
                (HazardAlertState::Alerting, None) => {
                    *state = HazardAlertState::Clear;
                    info!("Hazard cleared");
                    TRACKED_SENSORS
                        .iter()
                        .map(|sensor| Notification::HazardCleared(AlertEvent::cleared(sensor)))
                        .collect()
                }
                _ => Vec::new(),
            },
            Mode::Cooldown { cooldown, last_alert } => match label {
                Some(label) if now - *last_alert > *cooldown => {
                    *last_alert = now;
                    warn!("Hazard raised: {}", label);
                    vec![Notification::HazardAlert(AlertEvent::raised(label))]
                }
                _ => Vec::new(),
            },
        }
    }

    /// User acknowledged the alert; re-arms the cooldown policy
    pub fn acknowledge(&mut self) {
        match &mut self.mode {
            Mode::Cooldown { last_alert, .. } => {
                *last_alert = DateTime::<Utc>::default();
                info!("Hazard alert acknowledged, cooldown re-armed");
            }
            Mode::Edge { .. } => debug!("Acknowledgement ignored by edge-triggered policy"),
        }
    }
}
