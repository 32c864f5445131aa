// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Per-channel decode state for one audio packet.
pub struct DspChannel {
    /// Spectral coefficients, valid over the first half of the current block.
    pub spectrum: Vec<f32>,
    /// Floor envelope curve, valid over the first half of the current block.
    pub floor: Vec<f32>,
    /// The channel decodes no spectral data this packet.
    pub do_not_decode: bool,
}

impl DspChannel {
    pub fn new(bs1_exp: u8) -> Self {
        let n2 = (1usize << bs1_exp) >> 1;

        DspChannel { spectrum: vec![0.0; n2], floor: vec![0.0; n2], do_not_decode: false }
    }
}

/// The sample-range bookkeeping of one decoded block.
///
/// A block of `block_size` windowed samples breaks down into three ranges: samples before
/// `start` belong entirely to the previous block's overlap, samples in `[start, valid)` are
/// complete once the previous block is added, and samples in `[valid, total)` await overlap
/// with the next block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockGeometry {
    pub block_size: usize,
    /// Index of the first meaningful sample.
    pub start: usize,
    /// One past the last sample completed by this packet.
    pub valid: usize,
    /// One past the last sample this packet contributes to.
    pub total: usize,
}

impl BlockGeometry {
    /// Computes the geometry of a block from its size flags.
    ///
    /// For a long block bounded by a short block on either side, the overlap regions shrink to
    /// the short overlap width. When a long-to-short transition ends a page, the valid length
    /// is reduced by the difference of the half overlaps, matching the granule arithmetic of
    /// the reference encoder.
    pub fn compute(
        bs0_exp: u8,
        bs1_exp: u8,
        long_block: bool,
        prev_long: bool,
        next_long: bool,
        last_in_page: bool,
    ) -> BlockGeometry {
        let bs0 = 1usize << bs0_exp;
        let bs1 = 1usize << bs1_exp;

        let block_size = if long_block { bs1 } else { bs0 };

        let (left_half, right_half) = if long_block {
            (
                if prev_long { bs1 / 4 } else { bs0 / 4 },
                if next_long { bs1 / 4 } else { bs0 / 4 },
            )
        }
        else {
            (bs0 / 4, bs0 / 4)
        };

        let start = block_size / 4 - left_half;
        let total = 3 * block_size / 4 + right_half;
        let mut valid = total - 2 * right_half;

        if long_block && !next_long && last_in_page {
            valid -= (bs1 - bs0) / 4;
        }

        BlockGeometry { block_size, start, valid, total }
    }

    /// The number of samples this block contributes to the stream.
    pub fn contributed(&self) -> usize {
        self.valid - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::BlockGeometry;

    const BS0_EXP: u8 = 8; // 256
    const BS1_EXP: u8 = 11; // 2048

    #[test]
    fn verify_long_long_geometry() {
        let geom = BlockGeometry::compute(BS0_EXP, BS1_EXP, true, true, true, false);

        assert_eq!(geom.block_size, 2048);
        assert_eq!(geom.start, 0);
        assert_eq!(geom.valid, 1024);
        assert_eq!(geom.total, 2048);
        assert_eq!(geom.contributed(), 1024);
    }

    #[test]
    fn verify_short_geometry() {
        let geom = BlockGeometry::compute(BS0_EXP, BS1_EXP, false, false, false, false);

        assert_eq!(geom.block_size, 256);
        assert_eq!(geom.start, 0);
        assert_eq!(geom.valid, 128);
        assert_eq!(geom.total, 256);
    }

    #[test]
    fn verify_transition_geometry() {
        // Long block following a short block: the leading overlap shrinks.
        let geom = BlockGeometry::compute(BS0_EXP, BS1_EXP, true, false, true, false);

        assert_eq!(geom.start, 512 - 64);
        assert_eq!(geom.total, 2048);
        assert_eq!(geom.valid, 1024);
        assert_eq!(geom.contributed(), 512 + 64);

        // Long block followed by a short block: the trailing overlap shrinks.
        let geom = BlockGeometry::compute(BS0_EXP, BS1_EXP, true, true, false, false);

        assert_eq!(geom.start, 0);
        assert_eq!(geom.total, 1536 + 64);
        assert_eq!(geom.valid, 1536 - 64);

        // The overlap region handed to the next block matches its leading overlap.
        let next = BlockGeometry::compute(BS0_EXP, BS1_EXP, false, false, false, false);
        assert_eq!(geom.total - geom.valid, next.start + 2 * 64);
    }

    #[test]
    fn verify_page_end_trim() {
        let normal = BlockGeometry::compute(BS0_EXP, BS1_EXP, true, true, false, false);
        let at_page_end = BlockGeometry::compute(BS0_EXP, BS1_EXP, true, true, false, true);

        assert_eq!(normal.valid - at_page_end.valid, (2048 - 256) / 4);
    }
}
