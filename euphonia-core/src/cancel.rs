// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `cancel` module provides cooperative cancellation.

use std::cell::Cell;
use std::rc::Rc;

/// A cooperative cancellation flag.
///
/// Cloning yields a handle to the same flag. Decoders check the token at page fetches and packet
/// boundaries; work in-flight between checkpoints completes before cancellation is observed.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Default::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.get()
    }
}
