// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Method discovery on direct-object modules.

use crate::object::NativeObject;

/// Candidate method names of `module`: its own enumerable keys, followed by
/// every own property name of its immediate prototype.
///
/// Names are not deduplicated, and non-callable names are included; callers
/// filter on the resolved property.
pub fn get_keys(module: &NativeObject) -> Vec<String> {
    let mut keys = module.own_keys();
    if let Some(prototype) = module.prototype() {
        keys.extend(prototype.own_property_names());
    }
    keys
}
