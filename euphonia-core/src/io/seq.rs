// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::rc::Rc;

use smallvec::SmallVec;

use super::PooledBuf;

/// A contiguous run of bytes borrowed from a pool-owned buffer.
///
/// Runs share ownership of the backing buffer. The buffer returns to its pool once the last run
/// (or other handle) referencing it is dropped.
#[derive(Clone)]
pub struct ByteRun {
    buf: Rc<PooledBuf>,
    start: usize,
    end: usize,
}

impl ByteRun {
    pub fn new(buf: Rc<PooledBuf>, start: usize, end: usize) -> Self {
        assert!(start <= end && end <= buf.len());
        ByteRun { buf, start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }
}

/// A logically contiguous, possibly chunked, sequence of bytes.
///
/// A `ByteSeq` is an ordered list of [`ByteRun`]s. A codec packet contained within a single Ogg
/// page is a sequence of one run borrowing that page's payload; a packet spanning pages holds one
/// run per contributing page.
#[derive(Clone, Default)]
pub struct ByteSeq {
    runs: SmallVec<[ByteRun; 2]>,
    len: usize,
}

impl ByteSeq {
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds a single-run sequence by copying the given bytes into a detached buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut seq = ByteSeq::new();
        if !bytes.is_empty() {
            let buf = Rc::new(PooledBuf::detached(bytes.to_vec()));
            let end = buf.len();
            seq.push_run(ByteRun::new(buf, 0, end));
        }
        seq
    }

    /// Appends a run to the end of the sequence. Empty runs are discarded.
    pub fn push_run(&mut self, run: ByteRun) {
        if !run.is_empty() {
            self.len += run.len();
            self.runs.push(run);
        }
    }

    pub fn clear(&mut self) {
        self.runs.clear();
        self.len = 0;
    }

    /// The total number of bytes in the sequence.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn runs(&self) -> &[ByteRun] {
        &self.runs
    }

    /// Copies the sequence into a single contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for run in &self.runs {
            out.extend_from_slice(run.bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{ByteRun, ByteSeq};
    use crate::io::PooledBuf;

    #[test]
    fn verify_chunked_len() {
        let buf = Rc::new(PooledBuf::detached(vec![1, 2, 3, 4, 5, 6, 7, 8]));

        let mut seq = ByteSeq::new();
        seq.push_run(ByteRun::new(buf.clone(), 0, 3));
        seq.push_run(ByteRun::new(buf.clone(), 3, 3));
        seq.push_run(ByteRun::new(buf, 5, 8));

        // The empty run is discarded.
        assert_eq!(seq.runs().len(), 2);
        assert_eq!(seq.len(), 6);
        assert_eq!(seq.to_vec(), &[1, 2, 3, 6, 7, 8]);
    }

    #[test]
    fn verify_from_slice() {
        let seq = ByteSeq::from_slice(&[0xde, 0xad]);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.to_vec(), &[0xde, 0xad]);

        assert!(ByteSeq::from_slice(&[]).is_empty());
    }
}
