// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Alert state machines
//!
//! Both machines are owned by exactly one pipeline and take the current time
//! as an argument, so they can be driven by a [`crate::core::Clock`] or by
//! plain timestamps in tests.

mod hazard;
mod identity;

pub use hazard::{HazardAlertMachine, HazardAlertState, HazardPolicy};
pub use identity::DedupWindow;
