// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A streaming OGG/Vorbis I decoder.
//!
//! The container and codec layers are bundled: [`OggPageReader`] extracts and validates OGG
//! pages, [`PacketFramer`] reassembles codec packets spanning pages, [`OggPacketReader`] drives
//! both for a single logical bitstream and implements granule-position seeking, and
//! [`VorbisDecoder`] decodes the packet stream into interleaved floating-point PCM.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Euphonia crates. Please see the workspace manifest
// for their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]
// Disable to better express the specification.
#![allow(clippy::collapsible_else_if)]

mod codebook;
mod common;
mod decoder;
mod dsp;
mod floor;
mod framer;
mod page;
mod reader;
mod residue;
mod setup;
mod window;

#[cfg(test)]
mod testutil;

pub use decoder::{DecoderOptions, VorbisDecoder};
pub use framer::{Packet, PacketFramer};
pub use page::{OggPageReader, Page, PageFlags, PageInfo, OGG_PAGE_MAX_SIZE};
pub use reader::OggPacketReader;
pub use setup::{CommentHeader, IdentHeader};
