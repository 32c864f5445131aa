// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::SeekFrom;

use euphonia_core::audio::SampleSink;
use euphonia_core::cancel::CancelToken;
use euphonia_core::dsp::Imdct;
use euphonia_core::errors::{decode_error, seek_error, Error, Result, SeekErrorKind};
use euphonia_core::io::{BitReader, BufferPool, MediaSource};

use log::warn;
use smallvec::SmallVec;

use super::dsp::{BlockGeometry, DspChannel};
use super::framer::Packet;
use super::reader::OggPacketReader;
use super::setup::{
    read_comment_header, read_ident_header, read_setup_header, CommentHeader, IdentHeader, Mode,
    Setup, VORBIS_HEADER_SIGNATURE, VORBIS_PACKET_TYPE_COMMENT,
    VORBIS_PACKET_TYPE_IDENTIFICATION, VORBIS_PACKET_TYPE_SETUP,
};
use super::window::Windows;

/// Decoded samples are optionally clamped just inside the unit interval.
const CLIP_LIMIT: f32 = 0.99999994;

/// Options controlling a [`VorbisDecoder`].
#[derive(Clone, Default)]
pub struct DecoderOptions {
    /// Clamp decoded samples to slightly inside +/-1.0. Defaults to on.
    pub no_clip: bool,
    /// Cooperative cancellation signal, observed at page and packet boundaries.
    pub cancel: CancelToken,
}

/// A streaming OGG/Vorbis decoder for one logical bitstream.
///
/// The decoder reads the three Vorbis headers on construction, after which [`next_frame`]
/// repeatedly decodes one audio packet's worth of interleaved samples into a sink.
///
/// [`next_frame`]: VorbisDecoder::next_frame
pub struct VorbisDecoder<S: MediaSource> {
    reader: OggPacketReader<S>,
    ident: IdentHeader,
    comments: CommentHeader,
    setup: Setup,
    windows: Windows,
    imdct_short: Imdct,
    imdct_long: Imdct,
    channels: Vec<DspChannel>,
    /// Windowed time-domain samples of the packet being decoded, one row per channel.
    packet_buf: Vec<Vec<f32>>,
    /// The previous packet's samples, retained for overlap-add.
    prev_buf: Vec<Vec<f32>>,
    /// The unconsumed sample range within `prev_buf`.
    prev_range: Option<(usize, usize)>,
    /// False until one packet has primed the overlap state; that packet emits no samples.
    has_position: bool,
    /// Granule position of the next sample to be emitted.
    sample_position: u64,
    eos_seen: bool,
    has_clipped: bool,
    clip: bool,
    cancel: CancelToken,
}

impl<S: MediaSource> VorbisDecoder<S> {
    /// Creates a decoder over a byte source, consuming the stream's header packets.
    pub fn try_new(source: S, options: &DecoderOptions) -> Result<Self> {
        let cancel = options.cancel.clone();

        let mut reader = OggPacketReader::new(source, BufferPool::new(), cancel.clone());

        let mut ident = None;
        let mut comments = None;
        let mut setup = None;

        // The three header packets must precede all audio and arrive in order.
        while setup.is_none() {
            let packet = match reader.next_packet()? {
                Some(packet) => packet,
                None => return decode_error("vorbis: stream ends before headers complete"),
            };

            let mut bs = BitReader::new(&packet.data);

            let packet_type = bs.read(8)? as u8;

            if packet_type & 1 == 0 {
                return decode_error("vorbis: audio packet before headers");
            }

            if bs.read(48)? != VORBIS_HEADER_SIGNATURE {
                return decode_error("vorbis: invalid header signature");
            }

            match packet_type {
                VORBIS_PACKET_TYPE_IDENTIFICATION => {
                    if ident.is_some() {
                        return decode_error("vorbis: duplicate identification header");
                    }

                    ident = Some(read_ident_header(&mut bs)?);
                }
                VORBIS_PACKET_TYPE_COMMENT => {
                    if ident.is_none() || comments.is_some() {
                        return decode_error("vorbis: comment header out of order");
                    }

                    comments = Some(read_comment_header(&mut bs)?);
                }
                VORBIS_PACKET_TYPE_SETUP => {
                    let ident = match (&ident, &comments) {
                        (Some(ident), Some(_)) => ident,
                        _ => return decode_error("vorbis: setup header out of order"),
                    };

                    setup = Some(read_setup_header(&mut bs, ident)?);
                }
                _ => return decode_error("vorbis: invalid header packet type"),
            }
        }

        // The ordering checks above guarantee all three headers are present here.
        let (ident, comments, setup) = match (ident, comments, setup) {
            (Some(i), Some(c), Some(s)) => (i, c, s),
            _ => return decode_error("vorbis: incomplete headers"),
        };

        let bs0 = 1usize << ident.bs0_exp;
        let bs1 = 1usize << ident.bs1_exp;

        let n_channels = usize::from(ident.n_channels);

        Ok(VorbisDecoder {
            reader,
            windows: Windows::new(bs0, bs1),
            imdct_short: Imdct::new((bs0 >> 1) as u32),
            imdct_long: Imdct::new((bs1 >> 1) as u32),
            channels: (0..n_channels).map(|_| DspChannel::new(ident.bs1_exp)).collect(),
            packet_buf: vec![vec![0.0; bs1]; n_channels],
            prev_buf: vec![vec![0.0; bs1]; n_channels],
            prev_range: None,
            has_position: false,
            sample_position: 0,
            eos_seen: false,
            has_clipped: false,
            clip: !options.no_clip,
            cancel,
            ident,
            comments,
            setup,
        })
    }

    pub fn ident_header(&self) -> &IdentHeader {
        &self.ident
    }

    pub fn comments(&self) -> &CommentHeader {
        &self.comments
    }

    pub fn sample_rate(&self) -> u32 {
        self.ident.sample_rate
    }

    pub fn channels(&self) -> usize {
        usize::from(self.ident.n_channels)
    }

    /// The granule position of the next sample to be emitted.
    pub fn sample_position(&self) -> u64 {
        self.sample_position
    }

    /// True once any emitted sample was clamped.
    pub fn has_clipped(&self) -> bool {
        self.has_clipped
    }

    /// True once the final audio packet of the stream has been decoded, or the packet stream
    /// is exhausted. Cleared by a seek.
    pub fn end_of_stream(&self) -> bool {
        self.eos_seen
    }

    /// Returns and clears the page reader's non-contiguity event flag.
    pub fn take_page_non_contiguity(&mut self) -> bool {
        self.reader.take_non_contiguity()
    }

    /// Decodes forward until one packet emits samples into the sink.
    ///
    /// Returns the number of frames (samples per channel) written, or zero at the end of the
    /// stream. Undecodable audio packets are dropped; decoding continues with the next packet.
    pub fn next_frame(&mut self, sink: &mut dyn SampleSink) -> Result<usize> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let packet = match self.reader.next_packet()? {
                Some(packet) => packet,
                None => {
                    self.eos_seen = true;
                    return Ok(0);
                }
            };

            if packet.is_empty() {
                continue;
            }

            match self.decode_packet(&packet, sink) {
                Ok(frames) if frames > 0 => return Ok(frames),
                Ok(_) => (),
                Err(Error::DecodeError(err)) => {
                    // A bad audio packet invalidates only itself.
                    warn!("dropping undecodable packet ({})", err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Seeks to an absolute sample position.
    ///
    /// Returns the granule position at which output actually resumes: the start of the packet
    /// containing the target. Decoder lapping state is reset.
    pub fn seek_to(&mut self, to: SeekFrom) -> Result<u64> {
        let target = match to {
            SeekFrom::Start(position) => position,
            SeekFrom::Current(delta) => {
                let target = self.sample_position as i64 + delta;

                if target < 0 {
                    return seek_error(SeekErrorKind::OutOfRange);
                }

                target as u64
            }
            SeekFrom::End(delta) => {
                let total = self.reader.total_granules()? as i64;
                let target = total + delta;

                if target < 0 || target > total {
                    return seek_error(SeekErrorKind::OutOfRange);
                }

                target as u64
            }
        };

        // A zero target restarts from the first page rather than hunting granule positions.
        if target == 0 {
            self.reader.restart()?;

            // Skip the three header packets.
            for _ in 0..3 {
                if self.reader.next_packet()?.is_none() {
                    return decode_error("vorbis: stream ends before headers complete");
                }
            }

            self.reset_lapping(0);

            return Ok(0);
        }

        let modes = &self.setup.modes;
        let mode_bits = self.setup.mode_bits;
        let bs0_exp = self.ident.bs0_exp;
        let bs1_exp = self.ident.bs1_exp;

        let mut count =
            |packet: &Packet| packet_granule_count(modes, mode_bits, bs0_exp, bs1_exp, packet);

        let reached = self.reader.seek_to(target, 1, &mut count)?;

        self.reset_lapping(reached);

        Ok(reached)
    }

    /// The total number of samples per channel in the stream.
    ///
    /// Requires a seekable source, and scans to the end of the stream. Follow with a seek
    /// before decoding further.
    pub fn total_samples(&mut self) -> Result<u64> {
        self.reader.total_granules()
    }

    fn reset_lapping(&mut self, position: u64) {
        self.prev_range = None;
        self.has_position = false;
        self.has_clipped = false;
        self.eos_seen = false;
        self.sample_position = position;
    }

    /// Decodes one audio packet and writes its completed samples to the sink.
    fn decode_packet(&mut self, packet: &Packet, sink: &mut dyn SampleSink) -> Result<usize> {
        let mut bs = BitReader::new(&packet.data);

        // Section 4.3.1 - Packet type, mode, and window decode.
        if bs.read(1)? != 0 {
            return decode_error("vorbis: not an audio packet");
        }

        let mode_idx = bs.read(self.setup.mode_bits)? as usize;

        let mode = match self.setup.modes.get(mode_idx) {
            Some(mode) => mode,
            None => return decode_error("vorbis: invalid packet mode number"),
        };

        let long_block = mode.block_flag;

        let (prev_long, next_long) =
            if long_block { (bs.read_bool()?, bs.read_bool()?) } else { (false, false) };

        let geom = BlockGeometry::compute(
            self.ident.bs0_exp,
            self.ident.bs1_exp,
            long_block,
            prev_long,
            next_long,
            packet.last_in_page,
        );

        let block_exp = if long_block { self.ident.bs1_exp } else { self.ident.bs0_exp };

        let n = geom.block_size;
        let n2 = n >> 1;

        let mapping_idx = usize::from(mode.mapping);

        // Borrow the setup tables piecewise so floors and residues may be used mutably against
        // the shared codebooks.
        let setup = &mut self.setup;
        let codebooks = &setup.codebooks;
        let floors = &mut setup.floors;
        let residues = &mut setup.residues;
        let mapping = &setup.mappings[mapping_idx];

        // Section 4.3.2 - Floor curve decode.
        //
        // The same floor may serve several channels, so each channel's curve is synthesized
        // before the next channel overwrites the floor's state.
        for (ch, &mux) in mapping.multiplex.iter().enumerate() {
            let submap = &mapping.submaps[usize::from(mux)];
            let floor = &mut floors[usize::from(submap.floor)];

            let channel = &mut self.channels[ch];

            floor.read_channel(&mut bs, codebooks)?;

            channel.do_not_decode = floor.is_unused();

            if !channel.do_not_decode {
                floor.synthesis(block_exp, &mut channel.floor)?;
            }
            else {
                // An unused floor contributes a zero envelope if the channel is re-energized
                // by coupling below.
                channel.floor[..n2].fill(0.0);
            }
        }

        // Section 4.3.3 - Non-zero vector propagate.
        //
        // A coupled pair decodes residue if either of its channels does.
        for couple in &mapping.couplings {
            let mag = usize::from(couple.magnitude_ch);
            let ang = usize::from(couple.angle_ch);

            if self.channels[mag].do_not_decode != self.channels[ang].do_not_decode {
                self.channels[mag].do_not_decode = false;
                self.channels[ang].do_not_decode = false;
            }
        }

        // Section 4.3.4 - Residue decode, once per submap over its channels.
        for (submap_idx, submap) in mapping.submaps.iter().enumerate() {
            let ch_sel: SmallVec<[usize; 8]> = mapping
                .multiplex
                .iter()
                .enumerate()
                .filter(|&(_, &mux)| usize::from(mux) == submap_idx)
                .map(|(ch, _)| ch)
                .collect();

            let residue = &mut residues[usize::from(submap.residue)];

            residue.decode(&mut bs, block_exp, codebooks, &ch_sel, &mut self.channels)?;
        }

        // Section 4.3.5 - Inverse coupling.
        for couple in &mapping.couplings {
            let mag_idx = usize::from(couple.magnitude_ch);
            let ang_idx = usize::from(couple.angle_ch);

            debug_assert!(mag_idx != ang_idx);

            let (mag, ang) = if mag_idx < ang_idx {
                let (head, tail) = self.channels.split_at_mut(ang_idx);
                (&mut head[mag_idx], &mut tail[0])
            }
            else {
                let (head, tail) = self.channels.split_at_mut(mag_idx);
                (&mut tail[0], &mut head[ang_idx])
            };

            for (m, a) in mag.spectrum[..n2].iter_mut().zip(ang.spectrum[..n2].iter_mut()) {
                let (new_m, new_a) = if *m > 0.0 {
                    if *a > 0.0 {
                        (*m, *m - *a)
                    }
                    else {
                        (*m + *a, *m)
                    }
                }
                else {
                    if *a > 0.0 {
                        (*m, *m + *a)
                    }
                    else {
                        (*m - *a, *m)
                    }
                };

                *m = new_m;
                *a = new_a;
            }
        }

        // Sections 4.3.6 through 4.3.8 - Floor application, inverse MDCT, and windowing.
        let window = self.windows.get(long_block, prev_long, next_long);

        let imdct = if long_block { &mut self.imdct_long } else { &mut self.imdct_short };

        for (channel, out) in self.channels.iter_mut().zip(self.packet_buf.iter_mut()) {
            if channel.do_not_decode {
                out[..n].fill(0.0);
                continue;
            }

            for (s, &f) in channel.spectrum[..n2].iter_mut().zip(&channel.floor[..n2]) {
                *s *= f;
            }

            imdct.imdct(&channel.spectrum[..n2], &mut out[..n], 1.0);

            for (o, &w) in out[..n].iter_mut().zip(window) {
                *o *= w;
            }
        }

        // Overlap-add the previous packet's tail onto this block's leading samples.
        if let Some((tail_start, tail_end)) = self.prev_range {
            let count = (tail_end - tail_start).min(n - geom.start);

            for (cur, prev) in self.packet_buf.iter_mut().zip(self.prev_buf.iter()) {
                for (c, &p) in
                    cur[geom.start..geom.start + count].iter_mut().zip(&prev[tail_start..])
                {
                    *c += p;
                }
            }
        }

        // Rotate the buffers; the summed block becomes the previous packet.
        std::mem::swap(&mut self.packet_buf, &mut self.prev_buf);

        let start = geom.start;
        let mut valid = geom.valid;

        if !self.has_position {
            // The first packet only primes the overlap state.
            self.has_position = true;
            valid = start;
        }

        // At the end of the stream the page granule position caps the emitted sample count.
        if packet.end_of_stream && packet.last_in_page {
            if let Some(granule) = packet.granule {
                let natural = self.sample_position + (valid - start) as u64;

                if granule < natural {
                    valid = start + granule.saturating_sub(self.sample_position) as usize;
                }
            }

            self.eos_seen = true;
        }

        let frames = valid - start;
        let n_channels = self.channels.len();

        if frames > 0 {
            let samples = &mut sink.get_writable(frames * n_channels)[..frames * n_channels];

            for (ch, prev) in self.prev_buf.iter().enumerate() {
                for (frame, &sample) in prev[start..start + frames].iter().enumerate() {
                    samples[frame * n_channels + ch] = sample;
                }
            }

            if self.clip {
                for sample in samples.iter_mut() {
                    let clamped = sample.clamp(-CLIP_LIMIT, CLIP_LIMIT);

                    if clamped != *sample {
                        self.has_clipped = true;
                        *sample = clamped;
                    }
                }
            }

            sink.advance(frames * n_channels);

            self.sample_position += frames as u64;
        }

        // The region past the valid length awaits overlap with the next block.
        self.prev_range = Some((geom.valid, geom.total));

        Ok(frames)
    }
}

/// Computes the number of samples an audio packet contributes, from its header bits alone.
///
/// Used during seeking to attribute granules to packets without touching decoder state. A
/// packet that cannot be parsed contributes nothing.
fn packet_granule_count(
    modes: &[Mode],
    mode_bits: u32,
    bs0_exp: u8,
    bs1_exp: u8,
    packet: &Packet,
) -> u64 {
    let mut bs = BitReader::new(&packet.data);

    match bs.read(1) {
        Ok(0) => (),
        _ => return 0,
    }

    let mode = match bs.read(mode_bits) {
        Ok(idx) => match modes.get(idx as usize) {
            Some(mode) => mode,
            None => return 0,
        },
        Err(_) => return 0,
    };

    let (prev_long, next_long) = if mode.block_flag {
        match (bs.read_bool(), bs.read_bool()) {
            (Ok(prev), Ok(next)) => (prev, next),
            _ => return 0,
        }
    }
    else {
        (false, false)
    };

    let geom = BlockGeometry::compute(
        bs0_exp,
        bs1_exp,
        mode.block_flag,
        prev_long,
        next_long,
        packet.last_in_page,
    );

    geom.contributed() as u64
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, SeekFrom};

    use euphonia_core::audio::VecSink;

    use crate::dsp::BlockGeometry;
    use crate::framer::Packet;
    use crate::page::PageFlags;
    use crate::setup::Mode;
    use crate::testutil::{build_page, BitWriter};

    use super::{packet_granule_count, DecoderOptions, VorbisDecoder};

    fn put_signature(writer: &mut BitWriter, packet_type: u8) {
        writer.put(u64::from(packet_type), 8);

        for &byte in b"vorbis" {
            writer.put(u64::from(byte), 8);
        }
    }

    /// A mono identification header with 64-sample blocks.
    fn ident_packet() -> Vec<u8> {
        let mut writer = BitWriter::new();

        put_signature(&mut writer, 1);

        writer.put(0, 32); // version
        writer.put(1, 8); // channels
        writer.put(8000, 32); // sample rate
        writer.put(0, 32); // bitrate maximum
        writer.put(0, 32); // bitrate nominal
        writer.put(0, 32); // bitrate minimum
        writer.put(6, 4); // blocksize_0 exponent
        writer.put(6, 4); // blocksize_1 exponent
        writer.put(1, 1); // framing

        writer.finish()
    }

    fn comment_packet() -> Vec<u8> {
        let mut writer = BitWriter::new();

        put_signature(&mut writer, 3);

        writer.put(0, 32); // vendor length
        writer.put(0, 32); // comment count
        writer.put(1, 1); // framing

        writer.finish()
    }

    /// The smallest well-formed setup header: one two-entry scalar codebook, one undrawn-able
    /// floor 1, one empty residue, one trivial mapping, and one short mode.
    fn setup_packet() -> Vec<u8> {
        let mut writer = BitWriter::new();

        put_signature(&mut writer, 5);

        // One codebook.
        writer.put(0, 8);
        writer.put(0x564342, 24); // sync
        writer.put(1, 16); // dimensions
        writer.put(2, 24); // entries
        writer.put(0, 1); // not length ordered
        writer.put(0, 1); // not sparse
        writer.put(0, 5); // entry 0: length 1
        writer.put(0, 5); // entry 1: length 1
        writer.put(0, 4); // map type 0

        // One time-domain transform placeholder.
        writer.put(0, 6);
        writer.put(0, 16);

        // One floor, type 1, with no partitions.
        writer.put(0, 6);
        writer.put(1, 16); // floor type
        writer.put(0, 5); // partitions
        writer.put(0, 2); // multiplier - 1
        writer.put(6, 4); // range bits

        // One residue, type 0, with an empty coded range.
        writer.put(0, 6);
        writer.put(0, 16); // residue type
        writer.put(0, 24); // begin
        writer.put(0, 24); // end
        writer.put(0, 24); // partition size - 1
        writer.put(0, 6); // classifications - 1
        writer.put(0, 8); // classbook
        writer.put(0, 3); // class 0 cascade low bits
        writer.put(0, 1); // no cascade high bits

        // One mapping.
        writer.put(0, 6);
        writer.put(0, 16); // mapping type
        writer.put(0, 1); // one submap
        writer.put(0, 1); // no couplings
        writer.put(0, 2); // reserved
        writer.put(0, 8); // time configuration placeholder
        writer.put(0, 8); // floor
        writer.put(0, 8); // residue

        // One mode.
        writer.put(0, 6);
        writer.put(0, 1); // block flag
        writer.put(0, 16); // window type
        writer.put(0, 16); // transform type
        writer.put(0, 8); // mapping

        writer.put(1, 1); // framing

        writer.finish()
    }

    /// An audio packet for the mode above: the audio marker and an undrawn floor.
    fn audio_packet_bytes() -> Vec<u8> {
        vec![0b00]
    }

    /// A complete stream: headers, then one audio page ending at the given granule position.
    fn synthetic_vorbis_stream(end_granule: u64, n_audio_packets: usize) -> Vec<u8> {
        let ident = ident_packet();
        let comment = comment_packet();
        let setup = setup_packet();
        let audio = audio_packet_bytes();

        let audio_packets: Vec<&[u8]> = (0..n_audio_packets).map(|_| &audio[..]).collect();

        let mut raw = Vec::new();
        raw.extend(build_page(71, 0, PageFlags::BEGINS_STREAM, 0, &[&ident], true));
        raw.extend(build_page(71, 1, PageFlags::empty(), 0, &[&comment, &setup], true));
        raw.extend(build_page(71, 2, PageFlags::ENDS_STREAM, end_granule, &audio_packets, true));
        raw
    }

    #[test]
    fn verify_end_to_end_decode() {
        // Three 64-sample blocks: the first primes the overlap, the next two emit 32 samples
        // each.
        let raw = synthetic_vorbis_stream(64, 3);

        let mut decoder =
            VorbisDecoder::try_new(Cursor::new(raw), &DecoderOptions::default()).unwrap();

        assert_eq!(decoder.channels(), 1);
        assert_eq!(decoder.sample_rate(), 8000);
        assert_eq!(decoder.comments().len(), 0);
        assert!(!decoder.end_of_stream());

        let mut sink = VecSink::new();

        assert_eq!(decoder.next_frame(&mut sink).unwrap(), 32);
        assert_eq!(decoder.next_frame(&mut sink).unwrap(), 32);
        assert_eq!(decoder.next_frame(&mut sink).unwrap(), 0);

        assert!(decoder.end_of_stream());
        assert_eq!(decoder.sample_position(), 64);
        assert_eq!(sink.len(), 64);

        // The undrawn floor produces silence.
        assert!(sink.samples().iter().all(|&s| s == 0.0));
        assert!(!decoder.has_clipped());
    }

    #[test]
    fn verify_end_of_stream_granule_trimming() {
        // The natural decode length is 64 samples, but the final page's granule position says
        // the stream holds only 50.
        let raw = synthetic_vorbis_stream(50, 3);

        let mut decoder =
            VorbisDecoder::try_new(Cursor::new(raw), &DecoderOptions::default()).unwrap();

        let mut sink = VecSink::new();

        assert_eq!(decoder.next_frame(&mut sink).unwrap(), 32);
        assert_eq!(decoder.next_frame(&mut sink).unwrap(), 18);
        assert_eq!(decoder.next_frame(&mut sink).unwrap(), 0);

        assert!(decoder.end_of_stream());
        assert_eq!(decoder.sample_position(), 50);
        assert_eq!(sink.len(), 50);
    }

    #[test]
    fn verify_seek_to_start() {
        let raw = synthetic_vorbis_stream(64, 3);

        let mut decoder =
            VorbisDecoder::try_new(Cursor::new(raw), &DecoderOptions::default()).unwrap();

        let mut sink = VecSink::new();

        while decoder.next_frame(&mut sink).unwrap() > 0 {}
        assert_eq!(sink.len(), 64);
        assert!(decoder.end_of_stream());

        // Rewind and decode the stream again.
        assert_eq!(decoder.seek_to(SeekFrom::Start(0)).unwrap(), 0);
        assert_eq!(decoder.sample_position(), 0);
        assert!(!decoder.end_of_stream());

        sink.clear();

        while decoder.next_frame(&mut sink).unwrap() > 0 {}
        assert_eq!(sink.len(), 64);
    }

    #[test]
    fn verify_header_order_enforced() {
        // A stream whose comment header arrives before the identification header.
        let ident = ident_packet();
        let comment = comment_packet();

        let mut raw = Vec::new();
        raw.extend(build_page(71, 0, PageFlags::BEGINS_STREAM, 0, &[&comment], true));
        raw.extend(build_page(71, 1, PageFlags::empty(), 0, &[&ident], true));

        assert!(VorbisDecoder::try_new(Cursor::new(raw), &DecoderOptions::default()).is_err());
    }

    fn audio_packet(bytes: &[u8], last_in_page: bool) -> Packet {
        Packet {
            data: euphonia_core::io::ByteSeq::from_slice(bytes),
            granule: None,
            last_in_page,
            end_of_stream: false,
        }
    }

    #[test]
    fn verify_packet_granule_count() {
        let modes =
            [Mode { block_flag: false, mapping: 0 }, Mode { block_flag: true, mapping: 0 }];

        // Bit 0: audio marker. Bit 1: mode number. For the long mode, two window flag bits.
        // Mode 0, short block: 256 / 2 samples.
        assert_eq!(packet_granule_count(&modes, 1, 8, 11, &audio_packet(&[0b000], false)), 128);

        // Mode 1, long block with long neighbors (bits LSb-first: 0, 1, then the two window
        // flags): 2048 / 2 samples.
        assert_eq!(packet_granule_count(&modes, 1, 8, 11, &audio_packet(&[0b1110], false)), 1024);

        // Long block with a short previous block contributes less.
        let expect = BlockGeometry::compute(8, 11, true, false, true, false).contributed();
        assert_eq!(
            packet_granule_count(&modes, 1, 8, 11, &audio_packet(&[0b1010], false)) as usize,
            expect
        );

        // A header packet contributes nothing.
        assert_eq!(packet_granule_count(&modes, 1, 8, 11, &audio_packet(&[0b1], false)), 0);

        // An empty packet contributes nothing.
        assert_eq!(packet_granule_count(&modes, 1, 8, 11, &audio_packet(&[], false)), 0);
    }
}
