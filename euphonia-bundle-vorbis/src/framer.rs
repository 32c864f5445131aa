// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use euphonia_core::io::{ByteRun, ByteSeq};

use log::warn;

use super::page::{Page, PageFlags, OGG_GRANULE_NONE};

/// One reassembled codec packet.
pub struct Packet {
    /// The packet bytes. Runs borrow the payload of each contributing page.
    pub data: ByteSeq,
    /// The granule position of the packet's page, if this packet is the last one completed on
    /// that page.
    pub granule: Option<u64>,
    /// True if this packet is the last one completed on its page.
    pub last_in_page: bool,
    /// True if this packet's page is the final page of the logical bitstream.
    pub end_of_stream: bool,
}

impl Packet {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// `PacketFramer` reassembles codec packets from the packet runs of consecutive pages of one
/// logical bitstream.
///
/// At most one packet is open across a page boundary at any time.
pub struct PacketFramer {
    /// The in-progress packet.
    part: ByteSeq,
    /// True if a packet is open, awaiting data from following pages.
    open: bool,
}

impl PacketFramer {
    pub fn new() -> Self {
        PacketFramer { part: ByteSeq::new(), open: false }
    }

    /// Discards any in-progress packet. Used after repositioning the stream.
    pub fn reset(&mut self) {
        self.part.clear();
        self.open = false;
    }

    /// Slices a page into packets, emitting every packet that completes on it.
    ///
    /// The final run of the page is held back as the in-progress packet when the page leaves it
    /// incomplete.
    pub fn submit_page(&mut self, page: &Page) -> Vec<Packet> {
        let mut packets = Vec::with_capacity(page.num_packets());

        // Unless the page continues a packet, any partial packet held over from the previous
        // page can never complete and is dropped.
        let mut drop_first = false;

        if !page.flags.contains(PageFlags::CONTINUES_PACKET) {
            if self.open && !self.part.is_empty() {
                warn!("discarding {} bytes of an unfinished packet", self.part.len());
            }
            self.reset();
        }
        else if !self.open {
            // A continuation without held-over data cannot produce a complete first packet.
            // Slice it off and drop it.
            warn!("unexpected continuation page, dropping its first packet run");
            drop_first = true;
        }

        let n_runs = page.packet_lens.len();
        let mut offset = 0usize;

        for (i, &len) in page.packet_lens.iter().enumerate() {
            let end = offset + len as usize;

            self.part.push_run(ByteRun::new(page.payload.clone(), offset, end));
            self.open = true;

            offset = end;

            let completes = i + 1 < n_runs || page.final_packet_is_complete;

            if completes {
                let data = std::mem::take(&mut self.part);
                self.open = false;

                if i == 0 && drop_first {
                    continue;
                }

                packets.push(Packet {
                    data,
                    granule: None,
                    last_in_page: false,
                    end_of_stream: page.flags.contains(PageFlags::ENDS_STREAM),
                });
            }
        }

        // The page granule position belongs to the last packet completed on it.
        if let Some(last) = packets.last_mut() {
            last.last_in_page = true;

            if page.granule != OGG_GRANULE_NONE {
                last.granule = Some(page.granule);
            }
        }

        packets
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}
