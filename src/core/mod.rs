// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Core engine module - clock, pacing, notification fan-out and wiring

mod clock;
mod engine;
mod event_bus;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Engine;
pub use event_bus::{
    ActivityEvent, ActivityEventKind, AlertEvent, AlertStatus, Event, IdentityStatus, Notification,
    NotificationDispatcher,
};
pub use scheduler::{FrameScheduler, PacingStats};
