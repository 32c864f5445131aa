// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::io::{Read, Seek};

use log::debug;

use crate::errors::{end_of_stream_error, seek_error, Result, SeekErrorKind};

use super::MediaSource;

/// The size of the intermediate read buffer.
const BUF_LEN: usize = 8 * 1024;

/// `MediaSourceStream` is a buffered reader over a [`MediaSource`] that tracks the absolute
/// position of its cursor within the stream.
///
/// Seeking discards the intermediate buffer. Reads larger than the intermediate buffer bypass it
/// entirely.
pub struct MediaSourceStream<S: MediaSource> {
    inner: S,
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
    /// Absolute stream offset of `buf[0]`.
    base: u64,
    seekable: bool,
}

impl<S: MediaSource> MediaSourceStream<S> {
    pub fn new(mut inner: S) -> Self {
        let seekable = inner.is_seekable();

        // For seekable sources the stream may not start at offset 0.
        let base = if seekable { inner.stream_position().unwrap_or(0) } else { 0 };

        MediaSourceStream {
            inner,
            buf: vec![0u8; BUF_LEN].into_boxed_slice(),
            pos: 0,
            end: 0,
            base,
            seekable,
        }
    }

    /// The absolute position of the next byte to be read.
    pub fn pos(&self) -> u64 {
        self.base + self.pos as u64
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn byte_len(&self) -> Option<u64> {
        self.inner.byte_len()
    }

    /// Reads a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        if self.pos == self.end {
            self.refill()?;

            if self.end == 0 {
                return end_of_stream_error();
            }
        }

        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly enough bytes to fill `out`.
    pub fn read_buf_exact(&mut self, out: &mut [u8]) -> Result<()> {
        let mut written = 0;

        while written < out.len() {
            if self.pos == self.end {
                let rem = out.len() - written;

                if rem >= self.buf.len() {
                    // Bypass the intermediate buffer for large reads.
                    self.inner.read_exact(&mut out[written..])?;
                    self.base += (self.end + rem) as u64;
                    self.pos = 0;
                    self.end = 0;
                    return Ok(());
                }

                self.refill()?;

                if self.end == 0 {
                    return end_of_stream_error();
                }
            }

            let count = (self.end - self.pos).min(out.len() - written);
            out[written..written + count].copy_from_slice(&self.buf[self.pos..self.pos + count]);
            self.pos += count;
            written += count;
        }

        Ok(())
    }

    /// Seeks to an absolute position in the stream, discarding the buffer.
    pub fn seek(&mut self, from: io::SeekFrom) -> Result<u64> {
        let abs = match from {
            io::SeekFrom::Current(delta) => {
                let target = self.pos() as i64 + delta;

                if target < 0 {
                    return seek_error(SeekErrorKind::OutOfRange);
                }

                self.inner.seek(io::SeekFrom::Start(target as u64))?
            }
            other => self.inner.seek(other)?,
        };

        debug!("seek to byte {}", abs);

        self.base = abs;
        self.pos = 0;
        self.end = 0;

        Ok(abs)
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn refill(&mut self) -> Result<()> {
        self.base += self.end as u64;
        self.pos = 0;
        self.end = 0;

        loop {
            match self.inner.read(&mut self.buf) {
                Ok(count) => {
                    self.end = count;
                    return Ok(());
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
