// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use euphonia_core::cancel::CancelToken;
use euphonia_core::errors::{seek_error, Error, Result, SeekErrorKind};
use euphonia_core::io::{BufferPool, MediaSource};

use log::{debug, warn};

use super::framer::{Packet, PacketFramer};
use super::page::{OggPageReader, Page, PageFlags, OGG_GRANULE_NONE};

/// `OggPacketReader` produces the packet stream of a single logical bitstream.
///
/// The reader locks onto the serial number of the first page it sees and discards pages of any
/// other logical stream. On seekable sources it implements granule-position seeking over the
/// page table, with per-packet refinement through a caller-supplied granule counter.
pub struct OggPacketReader<S: MediaSource> {
    pages: OggPageReader<S>,
    framer: PacketFramer,
    queue: VecDeque<Packet>,
    /// The serial of the logical stream being followed.
    serial: Option<u32>,
    cancel: CancelToken,
}

impl<S: MediaSource> OggPacketReader<S> {
    pub fn new(source: S, pool: BufferPool, cancel: CancelToken) -> Self {
        OggPacketReader {
            pages: OggPageReader::new(source, pool),
            framer: PacketFramer::new(),
            queue: VecDeque::new(),
            serial: None,
            cancel,
        }
    }

    /// Returns and clears the page reader's non-contiguity event flag.
    pub fn take_non_contiguity(&mut self) -> bool {
        self.pages.take_non_contiguity()
    }

    pub fn is_seekable(&self) -> bool {
        self.pages.is_seekable()
    }

    /// Returns the next packet of the logical stream, or `None` at the end of the stream.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            if let Some(packet) = self.queue.pop_front() {
                return Ok(Some(packet));
            }

            if !self.read_page_into_queue()? {
                return Ok(None);
            }
        }
    }

    /// Repositions the stream to its first page and discards all buffered packet state.
    pub fn restart(&mut self) -> Result<()> {
        if !self.pages.is_seekable() {
            return seek_error(SeekErrorKind::Unseekable);
        }

        let offset = self.pages.page_table().first().map_or(0, |info| info.offset);

        self.pages.seek_bytes(offset)?;
        self.framer.reset();
        self.queue.clear();

        Ok(())
    }

    /// Positions the packet stream so that decoded output resumes at, or at the packet boundary
    /// immediately before, the target granule position.
    ///
    /// `packet_granules` computes the number of granules a packet contributes without decoding
    /// it. `pre_roll` extra packets are queued ahead of the target packet to prime decoder
    /// lapping state. Returns the granule position of the first sample the target packet
    /// produces.
    pub fn seek_to(
        &mut self,
        target: u64,
        pre_roll: usize,
        packet_granules: &mut dyn FnMut(&Packet) -> u64,
    ) -> Result<u64> {
        if !self.pages.is_seekable() {
            return seek_error(SeekErrorKind::Unseekable);
        }

        // Locate the first page whose granule position reaches the target.
        let page_idx = self.find_page_for_granule(target)?;

        // The granule position at which that page's packets begin.
        let base = self.granule_before(page_idx);

        // Walk back to a framing-clean page with enough whole packets ahead of the target page
        // to satisfy the pre-roll.
        let start_idx = self.walk_back(page_idx, pre_roll);

        // Replay the pages through the framer, remembering where the target page's packets
        // begin in the replayed packet list.
        self.framer.reset();
        self.queue.clear();

        let mut replay: Vec<Packet> = Vec::new();
        let mut on_target = 0;

        for idx in start_idx..=page_idx {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let page = self.pages.seek_and_read_page(idx)?;

            if idx == page_idx {
                on_target = replay.len();
            }

            if self.accepts(&page) {
                replay.extend(self.framer.submit_page(&page));
            }
        }

        // Walk the target page's packets, accumulating granules, until the packet containing
        // the target is found.
        let mut reached = base;
        let mut chosen = replay.len();

        for (i, packet) in replay.iter().enumerate().skip(on_target) {
            let dur = packet_granules(packet);

            if reached + dur > target {
                chosen = i;
                break;
            }

            reached += dur;
        }

        if chosen == replay.len() && reached != target {
            warn!("seek: page granules disagree with packet granules");
        }

        // Queue the target packet and its pre-roll. The decoder suppresses the output of the
        // first packet after a seek, so output resumes at the reached position.
        let first = chosen.saturating_sub(pre_roll).min(replay.len());

        self.queue.extend(replay.drain(first..));

        Ok(reached)
    }

    /// Scans to the end of the stream and returns its final granule position.
    ///
    /// The underlying stream is left at the end of the stream; follow with `seek_to` or
    /// `restart` before reading more packets.
    pub fn total_granules(&mut self) -> Result<u64> {
        if !self.pages.is_seekable() {
            return seek_error(SeekErrorKind::Unseekable);
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let next = self.pages.page_table().len();

            match self.pages.seek_and_read_page(next) {
                Ok(_) => (),
                Err(Error::EndOfStream) => break,
                Err(err) => return Err(err),
            }
        }

        let serial = self.serial;

        let last = self
            .pages
            .page_table()
            .iter()
            .rev()
            .filter(|info| serial.map_or(true, |s| info.serial == s))
            .find(|info| info.granule != OGG_GRANULE_NONE);

        Ok(last.map_or(0, |info| info.granule))
    }

    /// Reads pages until one of the followed stream is consumed. Returns false at the end of
    /// the stream.
    fn read_page_into_queue(&mut self) -> Result<bool> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.pages.read_next_page() {
                Ok(page) => {
                    if !self.accepts(&page) {
                        continue;
                    }

                    self.queue.extend(self.framer.submit_page(&page));

                    return Ok(true);
                }
                Err(Error::EndOfStream) => return Ok(false),
                Err(Error::DecodeError(err)) => {
                    debug!("dropping corrupt page ({})", err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Locks onto the first serial seen, then filters pages against it.
    fn accepts(&mut self, page: &Page) -> bool {
        match self.serial {
            Some(serial) => serial == page.serial,
            None => {
                if !page.flags.contains(PageFlags::BEGINS_STREAM) {
                    warn!("stream does not begin with a first page");
                }

                self.serial = Some(page.serial);
                true
            }
        }
    }

    /// Extends the page table as needed and returns the index of the first page of the followed
    /// stream with a granule position at or past the target.
    fn find_page_for_granule(&mut self, target: u64) -> Result<usize> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let serial = self.serial;

            let found = self.pages.page_table().iter().position(|info| {
                serial.map_or(true, |s| info.serial == s)
                    && info.granule != OGG_GRANULE_NONE
                    && info.granule >= target
            });

            if let Some(idx) = found {
                return Ok(idx);
            }

            let next = self.pages.page_table().len();

            match self.pages.seek_and_read_page(next) {
                Ok(_) => (),
                // The stream ends before the target granule position.
                Err(Error::EndOfStream) => return seek_error(SeekErrorKind::OutOfRange),
                Err(err) => return Err(err),
            }
        }
    }

    /// The last granule position recorded before the given page.
    fn granule_before(&self, page_idx: usize) -> u64 {
        let serial = self.serial;

        self.pages.page_table()[..page_idx]
            .iter()
            .rev()
            .filter(|info| serial.map_or(true, |s| info.serial == s))
            .find(|info| info.granule != OGG_GRANULE_NONE)
            .map_or(0, |info| info.granule)
    }

    /// Walks back from the target page to a page starting a fresh packet, far enough that at
    /// least `pre_roll` packets complete before the target page.
    fn walk_back(&self, page_idx: usize, pre_roll: usize) -> usize {
        let table = self.pages.page_table();

        let back_to_clean = |mut idx: usize| {
            while idx > 0 && table[idx].flags.contains(PageFlags::CONTINUES_PACKET) {
                idx -= 1;
            }
            idx
        };

        let lead_packets = |idx: usize| -> usize {
            table[idx..page_idx].iter().map(|info| info.n_packets as usize).sum()
        };

        let mut idx = back_to_clean(page_idx);

        while idx > 0 && lead_packets(idx) < pre_roll {
            idx = back_to_clean(idx - 1);
        }

        idx
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use euphonia_core::cancel::CancelToken;
    use euphonia_core::io::BufferPool;

    use super::OggPacketReader;
    use crate::page::PageFlags;
    use crate::testutil::build_page;

    fn reader_over(raw: Vec<u8>) -> OggPacketReader<Cursor<Vec<u8>>> {
        OggPacketReader::new(Cursor::new(raw), BufferPool::new(), CancelToken::new())
    }

    /// A stream of `n_pages` pages, each holding one 2-byte packet worth 10 granules.
    fn synthetic_stream(serial: u32, n_pages: u32) -> Vec<u8> {
        let mut raw = Vec::new();

        for seq in 0..n_pages {
            let flags = if seq == 0 {
                PageFlags::BEGINS_STREAM
            }
            else if seq + 1 == n_pages {
                PageFlags::ENDS_STREAM
            }
            else {
                PageFlags::empty()
            };

            let body = [seq as u8, (seq + 1) as u8];
            raw.extend(build_page(serial, seq, flags, u64::from(seq + 1) * 10, &[&body], true));
        }

        raw
    }

    #[test]
    fn verify_packet_iteration() {
        let mut reader = reader_over(synthetic_stream(5, 4));

        for seq in 0..4u8 {
            let packet = reader.next_packet().unwrap().unwrap();
            assert_eq!(packet.data.to_vec(), &[seq, seq + 1]);
            assert_eq!(packet.granule, Some(u64::from(seq + 1) * 10));
            assert!(packet.last_in_page);
            assert_eq!(packet.end_of_stream, seq == 3);
        }

        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn verify_serial_filter() {
        // Interleave pages of a second logical stream. Only the first serial is followed.
        let mut raw = Vec::new();
        raw.extend(build_page(1, 0, PageFlags::BEGINS_STREAM, 10, &[&[0xaa, 0]], true));
        raw.extend(build_page(2, 0, PageFlags::BEGINS_STREAM, 10, &[&[0xbb, 0]], true));
        raw.extend(build_page(1, 1, PageFlags::ENDS_STREAM, 20, &[&[0xaa, 1]], true));

        let mut reader = reader_over(raw);

        assert_eq!(reader.next_packet().unwrap().unwrap().data.to_vec(), &[0xaa, 0]);
        assert_eq!(reader.next_packet().unwrap().unwrap().data.to_vec(), &[0xaa, 1]);
        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn verify_total_granules() {
        let mut reader = reader_over(synthetic_stream(5, 6));
        assert_eq!(reader.total_granules().unwrap(), 60);

        // The reader can restart and iterate again afterwards.
        reader.restart().unwrap();
        assert!(reader.next_packet().unwrap().is_some());
    }

    #[test]
    fn verify_seek_to_granule() {
        let mut reader = reader_over(synthetic_stream(5, 10));

        // Every packet contributes 10 granules.
        let reached = reader.seek_to(35, 1, &mut |_| 10).unwrap();

        // Granule 35 falls within the packet spanning (30, 40]: output resumes at 30, and one
        // pre-roll packet is queued ahead of it.
        assert_eq!(reached, 30);

        let first = reader.next_packet().unwrap().unwrap();
        assert_eq!(first.granule, Some(30));

        let second = reader.next_packet().unwrap().unwrap();
        assert_eq!(second.granule, Some(40));

        // Iteration continues seamlessly past the replayed pages.
        let third = reader.next_packet().unwrap().unwrap();
        assert_eq!(third.granule, Some(50));
    }

    #[test]
    fn verify_seek_past_end() {
        let mut reader = reader_over(synthetic_stream(5, 4));
        assert!(reader.seek_to(1000, 1, &mut |_| 10).is_err());
    }
}
