// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use euphonia_core::errors::{decode_error, unsupported_error, Result};
use euphonia_core::io::BitReader;

use hashbrown::HashMap;
use log::debug;

use super::codebook::Codebook;
use super::common::ilog;
use super::floor::Floor;
use super::residue::Residue;

/// The packet type of an identification header.
pub const VORBIS_PACKET_TYPE_IDENTIFICATION: u8 = 1;
/// The packet type of a comment header.
pub const VORBIS_PACKET_TYPE_COMMENT: u8 = 3;
/// The packet type of a setup header.
pub const VORBIS_PACKET_TYPE_SETUP: u8 = 5;

/// The common header signature, the string "vorbis" read as a 48-bit little-endian integer.
pub const VORBIS_HEADER_SIGNATURE: u64 = 0x7369_6272_6f76;

/// The Vorbis version supported by this decoder.
const VORBIS_VERSION: u32 = 0;

/// The minimum block size (64) expressed as a power-of-2 exponent.
const VORBIS_BLOCKSIZE_MIN: u8 = 6;
/// The maximum block size (8192) expressed as a power-of-2 exponent.
const VORBIS_BLOCKSIZE_MAX: u8 = 13;

/// The identification header.
#[derive(Debug)]
pub struct IdentHeader {
    pub n_channels: u8,
    pub sample_rate: u32,
    pub bitrate_max: u32,
    pub bitrate_nominal: u32,
    pub bitrate_min: u32,
    pub bs0_exp: u8,
    pub bs1_exp: u8,
}

/// Reads the identification header following the packet type and signature.
pub fn read_ident_header(bs: &mut BitReader<'_>) -> Result<IdentHeader> {
    // The Vorbis version must be 0.
    if bs.read(32)? as u32 != VORBIS_VERSION {
        return unsupported_error("vorbis: only vorbis 1 is supported");
    }

    // The number of channels and sample rate must be non-zero.
    let n_channels = bs.read(8)? as u8;

    if n_channels == 0 {
        return decode_error("vorbis: number of channels cannot be 0");
    }

    let sample_rate = bs.read(32)? as u32;

    if sample_rate == 0 {
        return decode_error("vorbis: sample rate cannot be 0");
    }

    let bitrate_max = bs.read(32)? as u32;
    let bitrate_nominal = bs.read(32)? as u32;
    let bitrate_min = bs.read(32)? as u32;

    let bs0_exp = bs.read(4)? as u8;
    let bs1_exp = bs.read(4)? as u8;

    if bs0_exp < VORBIS_BLOCKSIZE_MIN || bs0_exp > VORBIS_BLOCKSIZE_MAX {
        return decode_error("vorbis: blocksize_0 out-of-bounds");
    }

    if bs1_exp < VORBIS_BLOCKSIZE_MIN || bs1_exp > VORBIS_BLOCKSIZE_MAX {
        return decode_error("vorbis: blocksize_1 out-of-bounds");
    }

    if bs0_exp > bs1_exp {
        return decode_error("vorbis: blocksize_0 exceeds blocksize_1");
    }

    // Framing flag must be set.
    if !bs.read_bool()? {
        return decode_error("vorbis: ident header framing flag unset");
    }

    Ok(IdentHeader {
        n_channels,
        sample_rate,
        bitrate_max,
        bitrate_nominal,
        bitrate_min,
        bs0_exp,
        bs1_exp,
    })
}

/// The comment header: the vendor string and a case-insensitive multimap of user comments.
#[derive(Debug, Default)]
pub struct CommentHeader {
    vendor: String,
    /// Comments in bitstream order, keys lowercased.
    comments: Vec<(String, String)>,
    /// Indices into `comments` per key.
    index: HashMap<String, Vec<usize>>,
}

impl CommentHeader {
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// All comments, in bitstream order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.comments.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All values recorded for a key, in bitstream order. Key matching is ASCII
    /// case-insensitive.
    pub fn get<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        let key = key.to_ascii_lowercase();

        self.index
            .get(&key)
            .map(|indices| indices.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&i| self.comments[i].1.as_str())
    }

    /// The first value recorded for a key, if any.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).next()
    }

    fn push(&mut self, key: String, value: String) {
        self.index.entry(key.clone()).or_default().push(self.comments.len());
        self.comments.push((key, value));
    }
}

/// Reads the comment header following the packet type and signature.
pub fn read_comment_header(bs: &mut BitReader<'_>) -> Result<CommentHeader> {
    let mut header = CommentHeader { vendor: read_utf8(bs)?, ..Default::default() };

    let count = bs.read(32)? as u32;

    for _ in 0..count {
        let comment = read_utf8(bs)?;

        // Comments are stored as KEY=value. A comment without a separator is ignored.
        if let Some((key, value)) = comment.split_once('=') {
            header.push(key.to_ascii_lowercase(), value.to_string());
        }
        else {
            debug!("ignoring malformed comment");
        }
    }

    // Framing flag must be set.
    if !bs.read_bool()? {
        return decode_error("vorbis: comment header framing flag unset");
    }

    Ok(header)
}

/// Reads a length-prefixed string, tolerating invalid UTF-8.
fn read_utf8(bs: &mut BitReader<'_>) -> Result<String> {
    let len = bs.read(32)? as usize;

    if len as u64 > bs.bits_left() / 8 {
        return decode_error("vorbis: string length exceeds packet");
    }

    let mut bytes = vec![0u8; len];

    for byte in bytes.iter_mut() {
        *byte = bs.read(8)? as u8;
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One channel coupling step.
#[derive(Debug)]
pub struct ChannelCouple {
    pub magnitude_ch: u8,
    pub angle_ch: u8,
}

/// One submap: a floor and residue pair.
#[derive(Debug)]
pub struct SubMap {
    pub floor: u8,
    pub residue: u8,
}

/// A channel mapping: couplings, the per-channel submap multiplex, and the submaps.
#[derive(Debug)]
pub struct Mapping {
    pub couplings: Vec<ChannelCouple>,
    pub multiplex: Vec<u8>,
    pub submaps: Vec<SubMap>,
}

/// A mode: the block size flag and the mapping it invokes.
#[derive(Debug)]
pub struct Mode {
    pub block_flag: bool,
    pub mapping: u8,
}

/// The decoded setup header.
pub struct Setup {
    pub codebooks: Vec<Codebook>,
    pub floors: Vec<Floor>,
    pub residues: Vec<Residue>,
    pub mappings: Vec<Mapping>,
    pub modes: Vec<Mode>,
    /// Bits read from each audio packet to select a mode, ilog(modes - 1).
    pub mode_bits: u32,
}

/// Reads the setup header following the packet type and signature.
pub fn read_setup_header(bs: &mut BitReader<'_>, ident: &IdentHeader) -> Result<Setup> {
    // Read codebooks.
    let count = bs.read(8)? as u32 + 1;
    let codebooks: Vec<Codebook> =
        (0..count).map(|_| Codebook::read(bs)).collect::<Result<_>>()?;

    let max_codebook = codebooks.len() as u8;

    // Read time-domain transforms. These are placeholders in Vorbis 1 and must be 0.
    let count = bs.read(6)? + 1;

    for _ in 0..count {
        if bs.read(16)? != 0 {
            return decode_error("vorbis: invalid time domain transform");
        }
    }

    // Read floors.
    let count = bs.read(6)? as u32 + 1;
    let floors: Vec<Floor> = (0..count)
        .map(|_| Floor::read_setup(bs, ident.bs0_exp, ident.bs1_exp, max_codebook))
        .collect::<Result<_>>()?;

    // Read residues.
    let count = bs.read(6)? as u32 + 1;
    let residues: Vec<Residue> = (0..count)
        .map(|_| {
            let residue_type = bs.read(16)? as u16;

            if residue_type > 2 {
                return unsupported_error("vorbis: invalid residue type");
            }

            Residue::read_setup(bs, residue_type, &codebooks)
        })
        .collect::<Result<_>>()?;

    // Read channel mappings.
    let count = bs.read(6)? as u32 + 1;
    let mappings: Vec<Mapping> = (0..count)
        .map(|_| {
            read_mapping(bs, ident.n_channels, floors.len() as u8, residues.len() as u8)
        })
        .collect::<Result<_>>()?;

    // Read modes.
    let count = bs.read(6)? as u32 + 1;
    let modes: Vec<Mode> =
        (0..count).map(|_| read_mode(bs, mappings.len() as u8)).collect::<Result<_>>()?;

    // Framing flag must be set.
    if !bs.read_bool()? {
        return decode_error("vorbis: setup header framing flag unset");
    }

    if bs.bits_left() >= 8 {
        debug!("leftover bytes after setup header");
    }

    let mode_bits = ilog(modes.len() as u32 - 1);

    Ok(Setup { codebooks, floors, residues, mappings, modes, mode_bits })
}

fn read_mapping(
    bs: &mut BitReader<'_>,
    n_channels: u8,
    max_floor: u8,
    max_residue: u8,
) -> Result<Mapping> {
    // Only mapping type 0 is defined in Vorbis 1.
    if bs.read(16)? != 0 {
        return decode_error("vorbis: invalid mapping type");
    }

    let num_submaps = if bs.read_bool()? { bs.read(4)? as u8 + 1 } else { 1 };

    let mut couplings = Vec::new();

    if bs.read_bool()? {
        // Number of channel couplings, up-to 256.
        let coupling_steps = bs.read(8)? as u16 + 1;

        couplings.reserve_exact(usize::from(coupling_steps));

        let max_ch = n_channels - 1;
        let coupling_bits = ilog(u32::from(max_ch));

        for _ in 0..coupling_steps {
            let magnitude_ch = bs.read(coupling_bits)? as u8;
            let angle_ch = bs.read(coupling_bits)? as u8;

            // The coupled channels must be distinct and in range.
            if magnitude_ch == angle_ch || magnitude_ch > max_ch || angle_ch > max_ch {
                return decode_error("vorbis: invalid channel coupling");
            }

            couplings.push(ChannelCouple { magnitude_ch, angle_ch });
        }
    }

    // Two reserved bits, must be zero.
    if bs.read(2)? != 0 {
        return decode_error("vorbis: reserved mapping bits non-zero");
    }

    let mut multiplex = Vec::with_capacity(usize::from(n_channels));

    // With more than one submap each channel selects its submap explicitly.
    if num_submaps > 1 {
        for _ in 0..n_channels {
            let mux = bs.read(4)? as u8;

            if mux >= num_submaps {
                return decode_error("vorbis: invalid channel multiplex");
            }

            multiplex.push(mux);
        }
    }
    else {
        multiplex.resize(usize::from(n_channels), 0);
    }

    let mut submaps = Vec::with_capacity(usize::from(num_submaps));

    for _ in 0..num_submaps {
        // Unused time configuration placeholder.
        let _ = bs.read(8)?;

        let floor = bs.read(8)? as u8;

        if floor >= max_floor {
            return decode_error("vorbis: invalid floor for mapping");
        }

        let residue = bs.read(8)? as u8;

        if residue >= max_residue {
            return decode_error("vorbis: invalid residue for mapping");
        }

        submaps.push(SubMap { floor, residue });
    }

    Ok(Mapping { couplings, multiplex, submaps })
}

fn read_mode(bs: &mut BitReader<'_>, max_mapping: u8) -> Result<Mode> {
    let block_flag = bs.read_bool()?;
    let window_type = bs.read(16)? as u16;
    let transform_type = bs.read(16)? as u16;
    let mapping = bs.read(8)? as u8;

    // Only window type 0 is allowed in Vorbis 1 (section 4.2.4).
    if window_type != 0 {
        return decode_error("vorbis: invalid window type for mode");
    }

    // Only transform type 0 is allowed in Vorbis 1 (section 4.2.4).
    if transform_type != 0 {
        return decode_error("vorbis: invalid transform type for mode");
    }

    if mapping >= max_mapping {
        return decode_error("vorbis: invalid mode mapping");
    }

    Ok(Mode { block_flag, mapping })
}
