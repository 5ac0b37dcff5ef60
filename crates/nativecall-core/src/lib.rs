// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Nativecall — Core types, errors and configuration shared by the bridge and
// by native-layer integrations.

pub mod config;
pub mod error;
pub mod types;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use types::*;
