// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::SeekFrom;
use std::rc::Rc;

use euphonia_core::checksum::Crc32;
use euphonia_core::errors::{decode_error, Result};
use euphonia_core::io::{BufferPool, MediaSource, MediaSourceStream, PooledBuf};

use bitflags::bitflags;
use log::{debug, warn};
use smallvec::SmallVec;

const OGG_PAGE_MARKER: [u8; 4] = *b"OggS";
const OGG_PAGE_HEADER_SIZE: usize = 27;

pub const OGG_PAGE_MAX_SIZE: usize = OGG_PAGE_HEADER_SIZE + 255 + 255 * 255;

/// The granule position stored on pages on which no packet ends.
pub const OGG_GRANULE_NONE: u64 = u64::MAX;

bitflags! {
    /// OGG page header flags, stored at their wire bit positions.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// The first packet of this page continues a packet started on a previous page.
        const CONTINUES_PACKET = 0x01;
        /// This page is the first page of a logical bitstream.
        const BEGINS_STREAM = 0x02;
        /// This page is the last page of a logical bitstream.
        const ENDS_STREAM = 0x04;
    }
}

#[inline(always)]
fn read_u32_le(buf: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[..4]);
    u32::from_le_bytes(bytes)
}

#[inline(always)]
fn read_u64_le(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(bytes)
}

/// Metadata of a successfully read page, recorded in the append-only page table.
#[derive(Copy, Clone, Debug)]
pub struct PageInfo {
    /// Absolute byte offset of the page's capture pattern.
    pub offset: u64,
    pub granule: u64,
    pub serial: u32,
    pub sequence: u32,
    pub flags: PageFlags,
    /// Number of packets completed on this page.
    pub n_packets: u32,
}

/// A fully read and CRC-validated OGG page.
pub struct Page {
    pub granule: u64,
    pub serial: u32,
    pub sequence: u32,
    pub crc: u32,
    pub flags: PageFlags,
    /// Absolute byte offset of the page's capture pattern.
    pub seek_offset: u64,
    /// Index of this page in the page table, or `None` if it is not recorded there. A page read
    /// from inside the already-scanned region that was previously skipped as corrupt has no
    /// table entry.
    pub page_index: Option<u32>,
    /// Length of each packet run on this page, including a trailing partial run.
    pub packet_lens: SmallVec<[u32; 8]>,
    /// False if the final packet run continues on the next page.
    pub final_packet_is_complete: bool,
    /// Page body of exactly `sum(packet_lens)` bytes.
    pub payload: Rc<PooledBuf>,
}

impl Page {
    pub fn num_packets(&self) -> usize {
        let complete = self.packet_lens.len();
        if self.final_packet_is_complete {
            complete
        }
        else {
            complete - 1
        }
    }
}

/// A reader of OGG pages.
///
/// The reader synchronizes on the page capture pattern, validates each page's checksum, and
/// derives packet boundaries from the lacing values. Every page read in stream order is recorded
/// in an append-only page table so that it can be located and re-read during a seek.
pub struct OggPageReader<S: MediaSource> {
    stream: MediaSourceStream<S>,
    pool: BufferPool,
    page_table: Vec<PageInfo>,
    /// Absolute byte offset one past the last page recorded in the page table.
    scan_offset: u64,
    /// Latched when resynchronization skipped bytes. Cleared by `take_non_contiguity`.
    non_contiguity: bool,
}

impl<S: MediaSource> OggPageReader<S> {
    pub fn new(source: S, pool: BufferPool) -> Self {
        OggPageReader {
            stream: MediaSourceStream::new(source),
            pool,
            page_table: Vec::new(),
            scan_offset: 0,
            non_contiguity: false,
        }
    }

    /// Returns and clears the page non-contiguity event flag.
    ///
    /// The flag is latched whenever synchronization was regained after skipping bytes. It is
    /// recoverable: reading continues normally after the event.
    pub fn take_non_contiguity(&mut self) -> bool {
        std::mem::take(&mut self.non_contiguity)
    }

    pub fn page_table(&self) -> &[PageInfo] {
        &self.page_table
    }

    pub fn is_seekable(&self) -> bool {
        self.stream.is_seekable()
    }

    pub fn byte_len(&self) -> Option<u64> {
        self.stream.byte_len()
    }

    /// The absolute byte position of the underlying stream.
    pub fn pos(&self) -> u64 {
        self.stream.pos()
    }

    /// Repositions the underlying stream to an absolute byte offset.
    pub fn seek_bytes(&mut self, offset: u64) -> Result<()> {
        self.stream.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Reads the next page from the stream.
    ///
    /// The stream is synchronized to the next capture pattern first; skipped bytes latch the
    /// non-contiguity event. A checksum mismatch fails with a decode error and leaves the stream
    /// positioned just past the offending capture pattern so that the caller may retry.
    pub fn read_next_page(&mut self) -> Result<Page> {
        // Synchronize to the capture pattern. The window carries the last three bytes examined,
        // so a pattern split across read boundaries is found on a later iteration.
        let mut window = [0u8; 4];
        self.stream.read_buf_exact(&mut window)?;

        let mut skipped = 0u64;

        while window != OGG_PAGE_MARKER {
            window.copy_within(1.., 0);
            window[3] = self.stream.read_byte()?;
            skipped += 1;
        }

        if skipped > 0 {
            warn!("skipped {} bytes to regain page synchronization", skipped);
            self.non_contiguity = true;
        }

        let offset = self.stream.pos() - 4;

        // Fixed header, capture pattern included for checksumming.
        let mut hdr = [0u8; OGG_PAGE_HEADER_SIZE];
        hdr[..4].copy_from_slice(&OGG_PAGE_MARKER);
        self.stream.read_buf_exact(&mut hdr[4..])?;

        // There is only one OGG version, and that is version 0.
        if hdr[4] != 0 {
            return decode_error("ogg: invalid ogg version");
        }

        // Only the first 3 least-significant bits are used for flags.
        if hdr[5] & 0xf8 != 0 {
            return decode_error("ogg: invalid flag bits set");
        }

        let flags = PageFlags::from_bits_truncate(hdr[5]);
        let granule = read_u64_le(&hdr[6..14]);
        let serial = read_u32_le(&hdr[14..18]);
        let sequence = read_u32_le(&hdr[18..22]);
        let crc = read_u32_le(&hdr[22..26]);
        let n_segments = usize::from(hdr[26]);

        let mut lacing = [0u8; 255];
        self.stream.read_buf_exact(&mut lacing[..n_segments])?;

        let body_len: usize = lacing[..n_segments].iter().map(|&l| usize::from(l)).sum();

        let mut payload = self.pool.rent(body_len);
        self.stream.read_buf_exact(&mut payload)?;

        // The page checksum covers the header with a zeroed checksum field, the lacing values,
        // and the body.
        let mut crc32 = Crc32::new(0);

        hdr[22..26].fill(0);
        crc32.process_buf_bytes(&hdr);
        crc32.process_buf_bytes(&lacing[..n_segments]);
        crc32.process_buf_bytes(&payload);

        if crc32.crc() != crc {
            warn!("crc mismatch: expected {:#x}, got {:#x}", crc, crc32.crc());

            // Leave the stream positioned just past this capture pattern so the caller can
            // resynchronize on the next one.
            if self.stream.is_seekable() {
                self.stream.seek(SeekFrom::Start(offset + 4))?;
            }

            return decode_error("ogg: page crc mismatch");
        }

        // Accumulate lacing values into packet run lengths. A lacing value below 255 closes the
        // current packet; a final lacing value of 255 leaves it open for the next page.
        let mut packet_lens = SmallVec::new();
        let mut len = 0u32;

        for &lace in &lacing[..n_segments] {
            len += u32::from(lace);

            if lace < 255 {
                packet_lens.push(len);
                len = 0;
            }
        }

        let final_packet_is_complete = n_segments == 0 || lacing[n_segments - 1] < 255;

        if !final_packet_is_complete {
            packet_lens.push(len);
        }

        let n_packets =
            (packet_lens.len() - usize::from(!final_packet_is_complete)) as u32;

        // Record the page in the table, or find it if this offset was read before. Pages within
        // the scanned region but absent from the table were skipped as corrupt and are not
        // recorded; such a page carries no table index.
        let page_index = match self.page_table.binary_search_by_key(&offset, |p| p.offset) {
            Ok(idx) => Some(idx as u32),
            Err(idx) if offset >= self.scan_offset => {
                debug_assert_eq!(idx, self.page_table.len());

                self.page_table.push(PageInfo {
                    offset,
                    granule,
                    serial,
                    sequence,
                    flags,
                    n_packets,
                });

                self.scan_offset = self.stream.pos();

                Some(idx as u32)
            }
            Err(_) => None,
        };

        Ok(Page {
            granule,
            serial,
            sequence,
            crc,
            flags,
            seek_offset: offset,
            page_index,
            packet_lens,
            final_packet_is_complete,
            payload: Rc::new(payload),
        })
    }

    /// Reads the page with the given page table index.
    ///
    /// A page already recorded in the table is re-read, and re-validated, from its recorded
    /// offset. Otherwise, reading resumes from the end of the known region and scans forward,
    /// discarding intermediate pages, until the requested page is produced.
    pub fn seek_and_read_page(&mut self, index: usize) -> Result<Page> {
        if let Some(info) = self.page_table.get(index) {
            self.stream.seek(SeekFrom::Start(info.offset))?;
            return self.read_next_page();
        }

        self.stream.seek(SeekFrom::Start(self.scan_offset))?;

        loop {
            match self.read_next_page() {
                Ok(page) => {
                    if page.page_index == Some(index as u32) {
                        return Ok(page);
                    }
                }
                // Skip corrupt pages while scanning forward.
                Err(euphonia_core::errors::Error::DecodeError(err)) => {
                    debug!("skipping corrupt page while scanning ({})", err);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use euphonia_core::errors::Error;
    use euphonia_core::io::BufferPool;

    use super::{OggPageReader, PageFlags, OGG_GRANULE_NONE};
    use crate::testutil::build_page;

    fn reader_over(bytes: Vec<u8>) -> OggPageReader<Cursor<Vec<u8>>> {
        OggPageReader::new(Cursor::new(bytes), BufferPool::new())
    }

    #[test]
    fn verify_read_page() {
        let raw = build_page(
            0xdead_beef,
            0,
            PageFlags::BEGINS_STREAM,
            OGG_GRANULE_NONE,
            &[&[1, 2, 3], &[4, 5]],
            true,
        );

        let mut reader = reader_over(raw);
        let page = reader.read_next_page().unwrap();

        assert_eq!(page.serial, 0xdead_beef);
        assert_eq!(page.sequence, 0);
        assert_eq!(page.flags, PageFlags::BEGINS_STREAM);
        assert_eq!(page.granule, OGG_GRANULE_NONE);
        assert_eq!(page.seek_offset, 0);
        assert_eq!(page.page_index, Some(0));
        assert_eq!(page.packet_lens.as_slice(), &[3, 2]);
        assert!(page.final_packet_is_complete);
        assert_eq!(&page.payload[..], &[1, 2, 3, 4, 5]);
        assert!(!reader.take_non_contiguity());
    }

    #[test]
    fn verify_resync() {
        // Garbage before a valid page must be skipped with a non-contiguity event.
        let mut raw = b"garbage bytes OggZ!".to_vec();
        let garbage_len = raw.len() as u64;

        raw.extend(build_page(7, 0, PageFlags::empty(), 0, &[&[0xaa; 10]], true));

        let mut reader = reader_over(raw);
        let page = reader.read_next_page().unwrap();

        assert_eq!(page.seek_offset, garbage_len);
        assert!(reader.take_non_contiguity());
        // The event is cleared once taken.
        assert!(!reader.take_non_contiguity());
    }

    #[test]
    fn verify_crc_corruption() {
        let raw = build_page(7, 0, PageFlags::empty(), 0, &[&[0x5a; 20]], true);

        // Flip one bit inside the page body.
        let mut corrupt = raw.clone();
        let body_byte = corrupt.len() - 10;
        corrupt[body_byte] ^= 0x10;

        let mut reader = reader_over(corrupt);
        assert!(matches!(reader.read_next_page(), Err(Error::DecodeError(_))));

        // Restore the bit and re-read the same page.
        let mut reader = reader_over(raw);
        let page = reader.read_next_page().unwrap();
        assert_eq!(&page.payload[..], &[0x5a; 20]);
    }

    #[test]
    fn verify_reread_is_identical() {
        let mut raw = Vec::new();
        raw.extend(build_page(9, 0, PageFlags::BEGINS_STREAM, 0, &[&[1; 7]], true));
        raw.extend(build_page(9, 1, PageFlags::empty(), 512, &[&[2; 300], &[3; 4]], true));

        let mut reader = reader_over(raw);

        let _first = reader.read_next_page().unwrap();
        let second = reader.read_next_page().unwrap();

        let again = reader.seek_and_read_page(1).unwrap();

        assert_eq!(again.granule, second.granule);
        assert_eq!(again.serial, second.serial);
        assert_eq!(again.sequence, second.sequence);
        assert_eq!(again.crc, second.crc);
        assert_eq!(again.flags, second.flags);
        assert_eq!(again.packet_lens, second.packet_lens);
        assert_eq!(again.page_index, second.page_index);
        assert_eq!(&again.payload[..], &second.payload[..]);
    }

    #[test]
    fn verify_continued_packet_lens() {
        // The first 510 bytes of a packet continuing onto the next page: lacings 255, 255 leave
        // a 510 byte partial run.
        let partial = vec![0x11u8; 510];

        let raw = build_page(3, 0, PageFlags::empty(), OGG_GRANULE_NONE, &[&partial], false);

        let mut reader = reader_over(raw);
        let page = reader.read_next_page().unwrap();

        assert!(!page.final_packet_is_complete);
        assert_eq!(page.packet_lens.as_slice(), &[510]);
        assert_eq!(page.num_packets(), 0);
        assert_eq!(page.payload.len(), 510);
    }

    #[test]
    fn verify_unrecorded_page_has_no_index() {
        // A valid page embedded in the body of another page lies inside the scanned region but
        // is never recorded in the page table. Reading it directly must not fabricate an index.
        let inner = build_page(8, 3, PageFlags::empty(), 77, &[&[1, 2, 3]], true);
        let outer = build_page(8, 0, PageFlags::empty(), 0, &[&inner], true);

        let inner_offset = (outer.len() - inner.len()) as u64;

        let mut reader = reader_over(outer);

        let first = reader.read_next_page().unwrap();
        assert_eq!(first.page_index, Some(0));

        reader.seek_bytes(inner_offset).unwrap();

        let embedded = reader.read_next_page().unwrap();
        assert_eq!(embedded.granule, 77);
        assert_eq!(embedded.page_index, None);

        // The table is unchanged.
        assert_eq!(reader.page_table().len(), 1);
    }

    #[test]
    fn verify_lacing_round_trip() {
        use crate::testutil::lacing_from_lens;

        let big = vec![0x33u8; 700];
        let partial = vec![0x44u8; 255];

        let cases: Vec<(Vec<&[u8]>, bool)> = vec![
            (vec![&[1, 2, 3][..], &[][..], &big[..]], true),
            (vec![&big[..], &partial[..]], false),
            (vec![&[0xaa; 255][..]], true),
        ];

        for (packets, final_complete) in cases {
            let raw = build_page(1, 0, PageFlags::empty(), 0, &packets, final_complete);

            let n_segments = usize::from(raw[26]);
            let original_lacing = raw[27..27 + n_segments].to_vec();

            let mut reader = reader_over(raw);
            let page = reader.read_next_page().unwrap();

            let rebuilt = lacing_from_lens(&page.packet_lens, page.final_packet_is_complete);

            assert_eq!(rebuilt, original_lacing);
        }
    }

    #[test]
    fn verify_multiple_of_255_terminator() {
        // A complete packet whose length is a multiple of 255 ends with a zero lacing value.
        let packet = vec![0x22u8; 510];

        let raw = build_page(3, 0, PageFlags::empty(), 1024, &[&packet], true);

        let mut reader = reader_over(raw);
        let page = reader.read_next_page().unwrap();

        assert!(page.final_packet_is_complete);
        assert_eq!(page.packet_lens.as_slice(), &[510]);
        assert_eq!(page.num_packets(), 1);
    }
}
