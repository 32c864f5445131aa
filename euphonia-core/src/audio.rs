// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module defines the sample output interface.

/// `SampleSink` receives decoded interleaved floating-point samples.
///
/// A decoder requests a writable region of at least the size it is about to produce with
/// [`SampleSink::get_writable`], fills a prefix of it, then commits the filled length with
/// [`SampleSink::advance`].
pub trait SampleSink {
    /// Returns a writable slice of at least `min_samples` samples.
    fn get_writable(&mut self, min_samples: usize) -> &mut [f32];

    /// Commits `written` samples of the most recently returned writable region.
    fn advance(&mut self, written: usize);
}

/// A growable, memory-backed [`SampleSink`].
#[derive(Default)]
pub struct VecSink {
    samples: Vec<f32>,
    len: usize,
}

impl VecSink {
    pub fn new() -> Self {
        Default::default()
    }

    /// All samples committed so far.
    pub fn samples(&self) -> &[f32] {
        &self.samples[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl SampleSink for VecSink {
    fn get_writable(&mut self, min_samples: usize) -> &mut [f32] {
        if self.samples.len() < self.len + min_samples {
            self.samples.resize(self.len + min_samples, 0.0);
        }
        &mut self.samples[self.len..]
    }

    fn advance(&mut self, written: usize) {
        self.len += written;
        debug_assert!(self.len <= self.samples.len());
    }
}

#[cfg(test)]
mod tests {
    use super::{SampleSink, VecSink};

    #[test]
    fn verify_vec_sink() {
        let mut sink = VecSink::new();

        let buf = sink.get_writable(4);
        buf[..3].copy_from_slice(&[1.0, 2.0, 3.0]);
        sink.advance(3);

        let buf = sink.get_writable(2);
        buf[..2].copy_from_slice(&[4.0, 5.0]);
        sink.advance(2);

        assert_eq!(sink.samples(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(sink.len(), 5);
    }
}
