// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test helpers for constructing synthetic OGG pages and bitstreams.

use euphonia_core::checksum::Crc32;

use crate::page::PageFlags;

/// Writes values LSb-first, the order the decoder consumes bits in.
pub struct BitWriter {
    bytes: Vec<u8>,
    bit: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter { bytes: Vec::new(), bit: 0 }
    }

    pub fn put(&mut self, value: u64, count: u32) {
        for i in 0..count {
            if self.bit % 8 == 0 {
                self.bytes.push(0);
            }

            let bit = (value >> i) & 1;
            *self.bytes.last_mut().unwrap() |= (bit as u8) << (self.bit % 8);
            self.bit += 1;
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Serializes one OGG page carrying the given packet runs.
///
/// Each slice in `packets` is a packet run placed on this page. When `final_complete` is false,
/// the last run is the leading portion of a packet continuing on the next page and must be a
/// multiple of 255 bytes long, since only 255-valued lacings can describe it.
pub fn build_page(
    serial: u32,
    sequence: u32,
    flags: PageFlags,
    granule: u64,
    packets: &[&[u8]],
    final_complete: bool,
) -> Vec<u8> {
    let mut lacing = Vec::new();

    for (i, packet) in packets.iter().enumerate() {
        let last = i + 1 == packets.len();

        let mut len = packet.len();

        while len >= 255 {
            lacing.push(255u8);
            len -= 255;
        }

        if last && !final_complete {
            assert_eq!(len, 0, "a partial run must be a multiple of 255 bytes");
        }
        else {
            lacing.push(len as u8);
        }
    }

    assert!(lacing.len() <= 255, "too many segments for one page");

    let mut raw = Vec::new();

    raw.extend_from_slice(b"OggS");
    raw.push(0);
    raw.push(flags.bits());
    raw.extend_from_slice(&granule.to_le_bytes());
    raw.extend_from_slice(&serial.to_le_bytes());
    raw.extend_from_slice(&sequence.to_le_bytes());
    raw.extend_from_slice(&[0u8; 4]);
    raw.push(lacing.len() as u8);
    raw.extend_from_slice(&lacing);

    for packet in packets {
        raw.extend_from_slice(packet);
    }

    let mut crc32 = Crc32::new(0);
    crc32.process_buf_bytes(&raw);

    raw[22..26].copy_from_slice(&crc32.crc().to_le_bytes());

    raw
}

/// Reconstructs the lacing values implied by a page's packet run lengths.
pub fn lacing_from_lens(packet_lens: &[u32], final_complete: bool) -> Vec<u8> {
    let mut lacing = Vec::new();

    for (i, &packet_len) in packet_lens.iter().enumerate() {
        let last = i + 1 == packet_lens.len();

        let mut len = packet_len;

        while len >= 255 {
            lacing.push(255u8);
            len -= 255;
        }

        if !(last && !final_complete) {
            lacing.push(len as u8);
        }
    }

    lacing
}
