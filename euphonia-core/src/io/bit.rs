// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::SeekFrom;

use crate::errors::{end_of_stream_error, out_of_range_error, seek_error, Result, SeekErrorKind};

use super::ByteSeq;

/// `BitReader` reads bits LSb-first from a [`ByteSeq`].
///
/// The reader buffers up-to 64 bits in an accumulator. A byte fill that would push the buffered
/// bit count past 64 preserves the excess bits of that byte in an 8-bit overflow register, so the
/// buffered count may momentarily reach 71. A negative buffered count encodes a pending sub-byte
/// skip: the next fill discards that many bits before the first valid bit. This single convention
/// services both forward skips past the buffered bits and bit-granular seeking, which never touch
/// the underlying bytes.
pub struct BitReader<'a> {
    seq: &'a ByteSeq,
    /// Index of the run the byte cursor is in.
    run_idx: usize,
    /// Byte offset of the cursor within the current run.
    run_pos: usize,
    /// Total bytes consumed from the sequence.
    consumed: usize,
    /// Bit accumulator. The LSb is the next bit in the stream.
    acc: u64,
    /// Bits of the last filled byte that did not fit the accumulator.
    spill: u8,
    /// Number of buffered bits, or, if negative, pending bits to skip.
    avail: i64,
}

impl<'a> BitReader<'a> {
    pub fn new(seq: &'a ByteSeq) -> Self {
        BitReader { seq, run_idx: 0, run_pos: 0, consumed: 0, acc: 0, spill: 0, avail: 0 }
    }

    /// The current position in bits from the start of the sequence.
    pub fn position(&self) -> u64 {
        (8 * self.consumed as i64 - self.avail) as u64
    }

    /// The number of bits between the current position and the end of the sequence.
    pub fn bits_left(&self) -> u64 {
        (8 * self.seq.len() as u64).saturating_sub(self.position())
    }

    /// Examines up-to `count` bits without advancing the reader.
    ///
    /// Returns the number of bits actually available, which is less than `count` only at the end
    /// of the sequence, and the bits themselves with all non-requested bits masked off. Counts
    /// greater than 64 are rejected.
    pub fn peek(&mut self, count: u32) -> Result<(u32, u64)> {
        if count > 64 {
            return out_of_range_error("bits: peek count exceeds 64");
        }

        while self.avail < i64::from(count) {
            if !self.fill() {
                break;
            }
        }

        let got = self.avail.clamp(0, i64::from(count)) as u32;

        let value = if count == 0 { 0 } else { self.acc & (u64::MAX >> (64 - count)) };

        Ok((got, value))
    }

    /// Advances the reader by `count` bits.
    ///
    /// Bits beyond the buffered set become a pending skip satisfied by the next fill. Returns
    /// true if the sequence contains enough bytes to cover the advance.
    pub fn try_advance(&mut self, count: u32) -> bool {
        let count = i64::from(count);

        if count == 0 {
            return true;
        }

        if count < self.avail {
            if count >= 64 {
                // Only overflow bits survive a shift this large.
                self.acc = u64::from(self.spill) >> (count - 64);
                self.spill = 0;
            }
            else {
                self.acc >>= count;
                self.acc |= u64::from(self.spill) << (64 - count);

                if self.avail - count > 64 {
                    self.spill >>= count;
                }
                else {
                    self.spill = 0;
                }
            }

            self.avail -= count;

            true
        }
        else {
            // Discard the buffer. The residual becomes a pending skip.
            self.acc = 0;
            self.spill = 0;
            self.avail -= count;

            let left = 8 * (self.seq.len() - self.consumed) as i64;

            left + self.avail >= 0
        }
    }

    /// Reads `count` bits, failing if the sequence ends before `count` bits are available.
    pub fn read(&mut self, count: u32) -> Result<u64> {
        let (got, value) = self.peek(count)?;

        if got < count {
            return end_of_stream_error();
        }

        self.try_advance(count);

        Ok(value)
    }

    /// Reads a single bit.
    #[inline(always)]
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read(1)? == 1)
    }

    /// Reads up-to 32 bits.
    #[inline(always)]
    pub fn read_bits_leq32(&mut self, count: u32) -> Result<u32> {
        debug_assert!(count <= 32);
        Ok(self.read(count)? as u32)
    }

    /// Repositions the reader to a bit position without reading from the sequence.
    ///
    /// The byte cursor is moved to the byte containing the target bit and the residual bit offset
    /// is recorded as a pending skip, absorbed by the next fill.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64> {
        let total_bits = 8 * self.seq.len() as i64;

        let target = match from {
            SeekFrom::Start(bits) => bits.min(i64::MAX as u64) as i64,
            SeekFrom::Current(delta) => self.position() as i64 + delta,
            SeekFrom::End(delta) => {
                // A forward seek from the end is an error.
                if delta > 0 {
                    return seek_error(SeekErrorKind::OutOfRange);
                }
                total_bits + delta
            }
        };

        if target < 0 || target > total_bits {
            return seek_error(SeekErrorKind::OutOfRange);
        }

        let bytes = (target / 8) as usize;
        let rem = target % 8;

        // Walk the runs to the byte containing the target bit.
        let mut idx = 0;
        let mut pos = bytes;

        let runs = self.seq.runs();

        while idx < runs.len() && pos >= runs[idx].len() {
            pos -= runs[idx].len();
            idx += 1;
        }

        self.run_idx = idx;
        self.run_pos = pos;
        self.consumed = bytes;
        self.acc = 0;
        self.spill = 0;
        self.avail = -rem;

        Ok(target as u64)
    }

    /// Pulls one byte from the sequence into the accumulator. Returns false at the end of the
    /// sequence.
    fn fill(&mut self) -> bool {
        let byte = loop {
            let Some(run) = self.seq.runs().get(self.run_idx) else { return false };

            if self.run_pos < run.len() {
                let byte = run.bytes()[self.run_pos];
                self.run_pos += 1;
                self.consumed += 1;
                break byte;
            }

            self.run_idx += 1;
            self.run_pos = 0;
        };

        if self.avail <= -8 {
            // The entire byte is consumed by the pending skip.
            self.avail += 8;
        }
        else if self.avail < 0 {
            // The pending skip consumes the low bits of the byte.
            let skip = (-self.avail) as u32;
            self.acc = u64::from(byte >> skip);
            self.avail = i64::from(8 - skip);
        }
        else if self.avail <= 56 {
            self.acc |= u64::from(byte) << self.avail;
            self.avail += 8;
        }
        else {
            // The byte straddles the top of the accumulator. The excess bits go to the overflow
            // register.
            debug_assert!(self.avail < 64);
            self.acc |= u64::from(byte) << self.avail;
            self.spill = byte >> (64 - self.avail);
            self.avail += 8;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use std::io::SeekFrom;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::BitReader;
    use crate::errors::Error;
    use crate::io::ByteSeq;

    const TEST_BYTES: &[u8] = &[0xfa, 0x23, 0x34, 0x51, 0x25, 0x8f, 0x40, 0x01, 0xf7];

    #[test]
    fn verify_read_simple() {
        let seq = ByteSeq::from_slice(TEST_BYTES);
        let mut bs = BitReader::new(&seq);

        assert_eq!(bs.read(5).unwrap(), 0x1a);
        assert_eq!(bs.position(), 5);
    }

    #[test]
    fn verify_peek_and_big_advance() {
        let seq = ByteSeq::from_slice(TEST_BYTES);
        let mut bs = BitReader::new(&seq);

        assert!(bs.try_advance(5));

        assert_eq!(bs.peek(63).unwrap(), (63, 0x380a_0479_2a89_a11f));

        assert!(bs.try_advance(1));
        assert!(bs.try_advance(64));
        assert_eq!(bs.position(), 70);

        bs.seek(SeekFrom::Current(-69)).unwrap();
        assert_eq!(bs.position(), 1);

        assert_eq!(bs.peek(4).unwrap(), (4, 0xd));

        bs.seek(SeekFrom::Current(1)).unwrap();
        assert!(!bs.read_bool().unwrap());
    }

    #[test]
    fn verify_out_of_range() {
        let seq = ByteSeq::from_slice(TEST_BYTES);
        let mut bs = BitReader::new(&seq);

        assert!(matches!(bs.peek(65), Err(Error::OutOfRange(_))));
        assert!(matches!(bs.read(65), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn verify_truncated_peek() {
        let seq = ByteSeq::from_slice(&[0xff, 0x03]);
        let mut bs = BitReader::new(&seq);

        // Only 16 bits exist.
        assert_eq!(bs.peek(20).unwrap(), (16, 0x03ff));
        assert!(matches!(bs.read(20), Err(Error::EndOfStream)));

        // A failed read does not advance the reader.
        assert_eq!(bs.read(16).unwrap(), 0x03ff);
    }

    #[test]
    fn verify_peek_idempotent() {
        let seq = ByteSeq::from_slice(TEST_BYTES);
        let mut bs = BitReader::new(&seq);

        bs.read(7).unwrap();

        let first = bs.peek(40).unwrap();
        let second = bs.peek(40).unwrap();

        assert_eq!(first, second);
        assert_eq!(bs.position(), 7);
    }

    #[test]
    fn verify_read_then_seek_back() {
        let seq = ByteSeq::from_slice(TEST_BYTES);
        let mut bs = BitReader::new(&seq);

        bs.read(11).unwrap();
        let mark = bs.position();
        let value = bs.read(23).unwrap();

        bs.seek(SeekFrom::Current(-23)).unwrap();
        assert_eq!(bs.position(), mark);
        assert_eq!(bs.read(23).unwrap(), value);
    }

    #[test]
    fn verify_seek_origins() {
        let seq = ByteSeq::from_slice(TEST_BYTES);
        let mut bs = BitReader::new(&seq);

        bs.seek(SeekFrom::Start(17)).unwrap();
        assert_eq!(bs.position(), 17);

        bs.seek(SeekFrom::End(-8)).unwrap();
        assert_eq!(bs.position(), 64);
        assert_eq!(bs.read(8).unwrap(), 0xf7);

        // Forward seek from the end is an error.
        assert!(bs.seek(SeekFrom::End(1)).is_err());
        // Seeking before the start is an error.
        assert!(bs.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn verify_chunked_reads() {
        // The same bytes split across multiple runs must read identically.
        let whole = ByteSeq::from_slice(TEST_BYTES);

        let mut split = ByteSeq::new();
        for chunk in TEST_BYTES.chunks(2) {
            let sub = ByteSeq::from_slice(chunk);
            split.push_run(sub.runs()[0].clone());
        }

        let mut a = BitReader::new(&whole);
        let mut b = BitReader::new(&split);

        for &count in &[5, 1, 13, 32, 3, 11, 7] {
            assert_eq!(a.read(count).unwrap(), b.read(count).unwrap());
        }

        assert_eq!(a.position(), b.position());
    }

    /// Extracts `count` bits starting at bit `pos` from `bytes`, LSb-first.
    fn extract_bits(bytes: &[u8], pos: u64, count: u32) -> u64 {
        let mut value = 0u64;
        for i in 0..u64::from(count) {
            let bit_pos = pos + i;
            let byte = bytes[(bit_pos / 8) as usize];
            let bit = u64::from(byte >> (bit_pos % 8)) & 1;
            value |= bit << i;
        }
        value
    }

    #[test]
    fn verify_random_walk() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);

        let bytes: Vec<u8> = (0..256).map(|_| rng.gen()).collect();
        let seq = ByteSeq::from_slice(&bytes);
        let mut bs = BitReader::new(&seq);

        let total_bits = 8 * bytes.len() as u64;
        let mut pos = 0u64;

        for _ in 0..10_000 {
            if rng.gen_bool(0.75) {
                let count = rng.gen_range(0..=64u32);

                if pos + u64::from(count) <= total_bits {
                    assert_eq!(bs.read(count).unwrap(), extract_bits(&bytes, pos, count));
                    pos += u64::from(count);
                }
                else {
                    // Not enough bits left: a seek back to a readable position.
                    bs.seek(SeekFrom::Start(0)).unwrap();
                    pos = 0;
                }
            }
            else {
                let target = rng.gen_range(0..total_bits as i64);
                bs.seek(SeekFrom::Current(target - pos as i64)).unwrap();
                pos = target as u64;
            }

            assert_eq!(bs.position(), pos);
        }
    }
}
