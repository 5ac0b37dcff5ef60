// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Promise-style wrappers, one per native module shape.

pub mod channel;
pub mod direct;

pub use channel::MessageChannelModule;
pub use direct::DirectObjectModule;
