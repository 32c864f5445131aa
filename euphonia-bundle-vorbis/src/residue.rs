// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;

use euphonia_core::errors::{decode_error, Result};
use euphonia_core::io::BitReader;

use super::codebook::Codebook;
use super::dsp::DspChannel;

#[derive(Debug, Default)]
struct ResidueClass {
    /// Bitmap of the decode stages this classification participates in.
    cascade: u8,
    /// Codebook number per participating stage.
    books: [u8; 8],
}

impl ResidueClass {
    #[inline(always)]
    fn is_used(&self, stage: usize) -> bool {
        debug_assert!(stage < 8);
        self.cascade & (1 << stage) != 0
    }
}

/// A residue definition from the setup header.
///
/// All three residue formats share the same partitioned layout and differ only in how decoded
/// vectors are written into the spectrum.
pub struct Residue {
    /// The residue format, 0, 1, or 2.
    kind: u16,
    /// First coded offset of the residue vector.
    begin: u32,
    /// One past the last coded offset of the residue vector.
    end: u32,
    partition_size: u32,
    classifications: u8,
    /// Codebook used to decode partition classifications.
    class_book: u8,
    classes: Vec<ResidueClass>,
    /// One past the highest stage used by any classification.
    max_stages: usize,
    /// Scratch area for partition classifications, channel-major.
    part_classes: Vec<u8>,
}

impl Residue {
    pub fn read_setup(
        bs: &mut BitReader<'_>,
        kind: u16,
        codebooks: &[Codebook],
    ) -> Result<Residue> {
        let begin = bs.read(24)? as u32;
        let end = bs.read(24)? as u32;
        let partition_size = bs.read(24)? as u32 + 1;
        let classifications = bs.read(6)? as u8 + 1;
        let class_book = bs.read(8)? as u8;

        if end < begin {
            return decode_error("vorbis: invalid residue begin and end");
        }

        if usize::from(class_book) >= codebooks.len() {
            return decode_error("vorbis: invalid residue classification codebook");
        }

        if codebooks[usize::from(class_book)].dimensions() == 0 {
            return decode_error("vorbis: residue classification codebook has no dimensions");
        }

        let mut classes = Vec::with_capacity(usize::from(classifications));

        for _ in 0..classifications {
            let low_bits = bs.read(3)? as u8;

            let high_bits = if bs.read_bool()? { bs.read(5)? as u8 } else { 0 };

            classes.push(ResidueClass { cascade: (high_bits << 3) | low_bits, books: [0; 8] });
        }

        for class in classes.iter_mut() {
            let cascade = class.cascade;
            for (stage, book) in class.books.iter_mut().enumerate() {
                if cascade & (1 << stage) == 0 {
                    continue;
                }

                *book = bs.read(8)? as u8;

                // Stage books write vectors into the spectrum, so they must carry a VQ table.
                match codebooks.get(usize::from(*book)) {
                    Some(codebook) if codebook.has_lookup() && codebook.dimensions() > 0 => (),
                    _ => return decode_error("vorbis: invalid codebook for residue stage"),
                }
            }
        }

        let max_stages =
            classes.iter().map(|c| 8 - c.cascade.leading_zeros() as usize).max().unwrap_or(0);

        Ok(Residue {
            kind,
            begin,
            end,
            partition_size,
            classifications,
            class_book,
            classes,
            max_stages,
            part_classes: Vec::new(),
        })
    }

    /// Decodes the residue vectors of the selected channels into their spectrum buffers.
    ///
    /// Channels marked do-not-decode are skipped, except under format 2 where all selected
    /// channels share one interleaved vector. Packet exhaustion mid-residue ends the decode
    /// cleanly, keeping everything written so far.
    pub fn decode(
        &mut self,
        bs: &mut BitReader<'_>,
        block_exp: u8,
        codebooks: &[Codebook],
        ch_sel: &[usize],
        channels: &mut [DspChannel],
    ) -> Result<()> {
        let n2 = (1usize << block_exp) >> 1;

        // Under format 2 the selected channels interleave into a single virtual vector.
        let is_interleaved = self.kind == 2;

        let vchannels = if is_interleaved { 1 } else { ch_sel.len() };

        let actual_size = if is_interleaved { n2 * ch_sel.len() } else { n2 };

        // The coded range of the vector, clamped to its actual size.
        let limit_begin = min(self.begin as usize, actual_size);
        let limit_end = min(self.end as usize, actual_size);

        let part_size = self.partition_size as usize;
        let parts = (limit_end - limit_begin) / part_size;

        // Zero the participating spectra. Decoded vectors accumulate into them.
        let mut any_decodable = false;

        for &ch in ch_sel {
            channels[ch].spectrum[..n2].fill(0.0);

            if !channels[ch].do_not_decode {
                any_decodable = true;
            }
        }

        if !any_decodable || parts == 0 {
            return Ok(());
        }

        let class_book = &codebooks[usize::from(self.class_book)];

        // Partitions whose classifications are decoded per classword.
        let cwords = usize::from(class_book.dimensions());

        // Classwords at the tail may describe partitions beyond the coded range. Pad the
        // scratch area so their classifications land somewhere and are ignored.
        let stride = parts + (cwords - parts % cwords) % cwords;

        self.part_classes.resize(stride * vchannels, 0);

        for stage in 0..self.max_stages {
            let mut part = 0;

            while part < parts {
                if stage == 0 {
                    // The classifications for this batch of partitions, one classword per
                    // (virtual) channel, are encoded ahead of the batch.
                    for v in 0..vchannels {
                        if !is_interleaved && channels[ch_sel[v]].do_not_decode {
                            continue;
                        }

                        let Some(code) = class_book.read_scalar(bs) else { return Ok(()) };

                        decode_classes(
                            code,
                            cwords,
                            u32::from(self.classifications),
                            &mut self.part_classes[v * stride + part..],
                        );
                    }
                }

                let batch_end = min(parts, part + cwords);

                for p in part..batch_end {
                    for v in 0..vchannels {
                        if !is_interleaved && channels[ch_sel[v]].do_not_decode {
                            continue;
                        }

                        let class_idx = usize::from(self.part_classes[v * stride + p]);

                        let class = match self.classes.get(class_idx) {
                            Some(class) => class,
                            None => return decode_error("vorbis: invalid classification"),
                        };

                        if !class.is_used(stage) {
                            continue;
                        }

                        let book = &codebooks[usize::from(class.books[stage])];

                        let offset = limit_begin + p * part_size;

                        let done = match self.kind {
                            0 => write_vectors_deinterleaved(
                                bs,
                                book,
                                &mut channels[ch_sel[v]].spectrum[offset..offset + part_size],
                            ),
                            1 => write_vectors_contiguous(
                                bs,
                                book,
                                &mut channels[ch_sel[v]].spectrum[offset..offset + part_size],
                            ),
                            _ => write_vectors_interleaved(
                                bs,
                                book,
                                ch_sel,
                                channels,
                                offset,
                                part_size,
                            ),
                        };

                        if !done {
                            return Ok(());
                        }
                    }
                }

                part = batch_end;
            }
        }

        Ok(())
    }
}

/// Splits a classword into its per-partition classifications, most significant digit first.
fn decode_classes(mut val: u32, count: usize, classifications: u32, out: &mut [u8]) {
    for out in out[..count].iter_mut().rev() {
        *out = (val % classifications) as u8;
        val /= classifications;
    }
}

/// Format 0: decoded vectors stride across the partition.
fn write_vectors_deinterleaved(
    bs: &mut BitReader<'_>,
    codebook: &Codebook,
    out: &mut [f32],
) -> bool {
    let dim = usize::from(codebook.dimensions());
    let steps = out.len() / dim;

    for i in 0..steps {
        let Some(vq) = codebook.read_vq(bs) else { return false };

        for (o, &v) in out[i..].iter_mut().step_by(steps).zip(vq) {
            *o += v;
        }
    }

    true
}

/// Format 1: decoded vectors lie end-to-end across the partition.
fn write_vectors_contiguous(bs: &mut BitReader<'_>, codebook: &Codebook, out: &mut [f32]) -> bool {
    let dim = usize::from(codebook.dimensions());

    for out in out.chunks_exact_mut(dim) {
        let Some(vq) = codebook.read_vq(bs) else { return false };

        for (o, &v) in out.iter_mut().zip(vq) {
            *o += v;
        }
    }

    true
}

/// Format 2: decoded vectors advance through the virtual vector, alternating channels sample by
/// sample.
fn write_vectors_interleaved(
    bs: &mut BitReader<'_>,
    codebook: &Codebook,
    ch_sel: &[usize],
    channels: &mut [DspChannel],
    offset: usize,
    len: usize,
) -> bool {
    let n_ch = ch_sel.len();

    let mut pos = offset;
    let end = offset + len;

    while pos < end {
        let Some(vq) = codebook.read_vq(bs) else { return false };

        for &v in vq {
            if pos == end {
                break;
            }

            channels[ch_sel[pos % n_ch]].spectrum[pos / n_ch] += v;
            pos += 1;
        }
    }

    true
}
