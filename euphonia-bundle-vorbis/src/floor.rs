// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;
use std::f64;

use euphonia_core::errors::{decode_error, unsupported_error, Result};
use euphonia_core::io::BitReader;

use hashbrown::HashSet;

use super::codebook::Codebook;
use super::common::{ilog, try_or_end};

/// As defined in section 10.1 of the Vorbis I specification.
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
const FLOOR1_INVERSE_DB_TABLE: [f32; 256] = [
    1.0649863e-07, 1.1341951e-07, 1.2079015e-07, 1.2863978e-07,
    1.3699951e-07, 1.4590251e-07, 1.5538408e-07, 1.6548181e-07,
    1.7623575e-07, 1.8768855e-07, 1.9988561e-07, 2.1287530e-07,
    2.2670913e-07, 2.4144197e-07, 2.5713223e-07, 2.7384213e-07,
    2.9163793e-07, 3.1059021e-07, 3.3077411e-07, 3.5226968e-07,
    3.7516214e-07, 3.9954229e-07, 4.2550680e-07, 4.5315863e-07,
    4.8260743e-07, 5.1396998e-07, 5.4737065e-07, 5.8294187e-07,
    6.2082472e-07, 6.6116941e-07, 7.0413592e-07, 7.4989464e-07,
    7.9862701e-07, 8.5052630e-07, 9.0579828e-07, 9.6466216e-07,
    1.0273513e-06, 1.0941144e-06, 1.1652161e-06, 1.2409384e-06,
    1.3215816e-06, 1.4074654e-06, 1.4989305e-06, 1.5963394e-06,
    1.7000785e-06, 1.8105592e-06, 1.9282195e-06, 2.0535261e-06,
    2.1869758e-06, 2.3290978e-06, 2.4804557e-06, 2.6416497e-06,
    2.8133190e-06, 2.9961443e-06, 3.1908506e-06, 3.3982101e-06,
    3.6190449e-06, 3.8542308e-06, 4.1047004e-06, 4.3714470e-06,
    4.6555282e-06, 4.9580707e-06, 5.2802740e-06, 5.6234160e-06,
    5.9888572e-06, 6.3780469e-06, 6.7925283e-06, 7.2339451e-06,
    7.7040476e-06, 8.2047000e-06, 8.7378876e-06, 9.3057248e-06,
    9.9104632e-06, 1.0554501e-05, 1.1240392e-05, 1.1970856e-05,
    1.2748789e-05, 1.3577278e-05, 1.4459606e-05, 1.5399272e-05,
    1.6400004e-05, 1.7465768e-05, 1.8600792e-05, 1.9809576e-05,
    2.1096914e-05, 2.2467911e-05, 2.3928002e-05, 2.5482978e-05,
    2.7139006e-05, 2.8902651e-05, 3.0780908e-05, 3.2781225e-05,
    3.4911534e-05, 3.7180282e-05, 3.9596466e-05, 4.2169667e-05,
    4.4910090e-05, 4.7828601e-05, 5.0936773e-05, 5.4246931e-05,
    5.7772202e-05, 6.1526565e-05, 6.5524908e-05, 6.9783085e-05,
    7.4317983e-05, 7.9147585e-05, 8.4291040e-05, 8.9768747e-05,
    9.5602426e-05, 0.00010181521, 0.00010843174, 0.00011547824,
    0.00012298267, 0.00013097477, 0.00013948625, 0.00014855085,
    0.00015820453, 0.00016848555, 0.00017943469, 0.00019109536,
    0.00020351382, 0.00021673929, 0.00023082423, 0.00024582449,
    0.00026179955, 0.00027881276, 0.00029693158, 0.00031622787,
    0.00033677814, 0.00035866388, 0.00038197188, 0.00040679456,
    0.00043323036, 0.00046138411, 0.00049136745, 0.00052329927,
    0.00055730621, 0.00059352311, 0.00063209358, 0.00067317058,
    0.00071691700, 0.00076350630, 0.00081312324, 0.00086596457,
    0.00092223983, 0.00098217216, 0.0010459992,  0.0011139742,
    0.0011863665,  0.0012634633,  0.0013455702,  0.0014330129,
    0.0015261382,  0.0016253153,  0.0017309374,  0.0018434235,
    0.0019632195,  0.0020908006,  0.0022266726,  0.0023713743,
    0.0025254795,  0.0026895994,  0.0028643847,  0.0030505286,
    0.0032487691,  0.0034598925,  0.0036847358,  0.0039241906,
    0.0041792066,  0.0044507950,  0.0047400328,  0.0050480668,
    0.0053761186,  0.0057254891,  0.0060975636,  0.0064938176,
    0.0069158225,  0.0073652516,  0.0078438871,  0.0083536271,
    0.0088964928,  0.009474637,   0.010090352,   0.010746080,
    0.011444421,   0.012188144,   0.012980198,   0.013823725,
    0.014722068,   0.015678791,   0.016697687,   0.017782797,
    0.018938423,   0.020169149,   0.021479854,   0.022875735,
    0.024362330,   0.025945531,   0.027631618,   0.029427276,
    0.031339626,   0.033376252,   0.035545228,   0.037855157,
    0.040315199,   0.042935108,   0.045725273,   0.048696758,
    0.051861348,   0.055231591,   0.058820850,   0.062643361,
    0.066714279,   0.071049749,   0.075666962,   0.080584227,
    0.085821044,   0.091398179,   0.097337747,   0.10366330,
    0.11039993,    0.11757434,    0.12521498,    0.13335215,
    0.14201813,    0.15124727,    0.16107617,    0.17154380,
    0.18269168,    0.19456402,    0.20720788,    0.22067342,
    0.23501402,    0.25028656,    0.26655159,    0.28387361,
    0.30232132,    0.32196786,    0.34289114,    0.36517414,
    0.38890521,    0.41417847,    0.44109412,    0.46975890,
    0.50028648,    0.53279791,    0.56742212,    0.60429640,
    0.64356699,    0.68538959,    0.72993007,    0.77736504,
    0.82788260,    0.88168307,    0.9389798,     1.0,
];

/// A floor definition from the setup header, plus the per-packet channel state most recently
/// read through it.
///
/// The same floor may be referenced by several channels of one packet. Because a later channel's
/// read overwrites the state, the envelope curve is synthesized into the channel's floor buffer
/// immediately after reading.
pub enum Floor {
    F0(Floor0),
    F1(Floor1),
}

impl Floor {
    pub fn read_setup(
        bs: &mut BitReader<'_>,
        bs0_exp: u8,
        bs1_exp: u8,
        max_codebook: u8,
    ) -> Result<Floor> {
        match bs.read(16)? {
            0 => Ok(Floor::F0(Floor0::read_setup(bs, bs0_exp, bs1_exp, max_codebook)?)),
            1 => Ok(Floor::F1(Floor1::read_setup(bs, max_codebook)?)),
            _ => unsupported_error("vorbis: invalid floor type"),
        }
    }

    /// Reads one channel's floor data from an audio packet.
    pub fn read_channel(
        &mut self,
        bs: &mut BitReader<'_>,
        codebooks: &[Codebook],
    ) -> Result<()> {
        match self {
            Floor::F0(floor) => floor.read_channel(bs, codebooks),
            Floor::F1(floor) => floor.read_channel(bs, codebooks),
        }
    }

    /// True if the most recently read channel carries no floor, and thus no audio.
    pub fn is_unused(&self) -> bool {
        match self {
            Floor::F0(floor) => floor.unused,
            Floor::F1(floor) => floor.unused,
        }
    }

    /// Synthesizes the floor curve of the most recently read channel into `curve`.
    pub fn synthesis(&mut self, block_exp: u8, curve: &mut [f32]) -> Result<()> {
        match self {
            Floor::F0(floor) => floor.synthesis(block_exp, curve),
            Floor::F1(floor) => floor.synthesis(block_exp, curve),
        }
    }
}

/// Floor type 0: a line spectral pair filter evaluated over a Bark-scale warping of the
/// spectrum.
pub struct Floor0 {
    order: u8,
    bark_map_size: u16,
    amp_bits: u8,
    amp_ofs: u8,
    /// Codebook numbers the packet may select between.
    books: Vec<u8>,
    /// Bits used to select a book, ilog(books).
    book_bits: u32,
    /// Per block size, the Bark-scale map from spectral position to filter evaluation point.
    bark_maps: [Vec<i32>; 2],
    /// Per block size, 2cos(pi * bark_map[i] / bark_map_size).
    wdel_maps: [Vec<f32>; 2],
    bs0_exp: u8,

    // Channel state.
    amp: u64,
    coeffs: Vec<f32>,
    unused: bool,
}

impl Floor0 {
    fn read_setup(
        bs: &mut BitReader<'_>,
        bs0_exp: u8,
        bs1_exp: u8,
        max_codebook: u8,
    ) -> Result<Floor0> {
        let order = bs.read(8)? as u8;
        let rate = bs.read(16)? as u16;
        let bark_map_size = bs.read(16)? as u16;
        let amp_bits = bs.read(6)? as u8;
        let amp_ofs = bs.read(8)? as u8;
        let num_books = bs.read(4)? as u8 + 1;

        if order == 0 || rate == 0 || bark_map_size == 0 {
            return decode_error("vorbis: floor0, invalid parameters");
        }

        let mut books = Vec::with_capacity(usize::from(num_books));

        for _ in 0..num_books {
            let book = bs.read(8)? as u8;

            if book >= max_codebook {
                return decode_error("vorbis: floor0, invalid codebook number");
            }

            books.push(book);
        }

        let book_bits = ilog(u32::from(num_books));

        let map_short = bark_map(1 << (bs0_exp - 1), rate, bark_map_size);
        let map_long = bark_map(1 << (bs1_exp - 1), rate, bark_map_size);

        let wdel_short = wdel_map(&map_short, bark_map_size);
        let wdel_long = wdel_map(&map_long, bark_map_size);

        Ok(Floor0 {
            order,
            bark_map_size,
            amp_bits,
            amp_ofs,
            books,
            book_bits,
            bark_maps: [map_short, map_long],
            wdel_maps: [wdel_short, wdel_long],
            bs0_exp,
            amp: 0,
            coeffs: vec![0.0; usize::from(order)],
            unused: true,
        })
    }

    fn read_channel(&mut self, bs: &mut BitReader<'_>, codebooks: &[Codebook]) -> Result<()> {
        // Assume the floor is unused until it is decoded successfully.
        self.unused = true;

        self.amp = try_or_end!(bs.read(u32::from(self.amp_bits)));

        if self.amp != 0 {
            let book_idx = try_or_end!(bs.read(self.book_bits)) as usize;

            if book_idx >= self.books.len() {
                return decode_error("vorbis: floor0, invalid book selector");
            }

            let codebook = &codebooks[usize::from(self.books[book_idx])];

            if !codebook.has_lookup() {
                return decode_error("vorbis: floor0, scalar book selected");
            }

            // Read the coefficient vector as a cumulative chain of VQ vectors.
            let order = usize::from(self.order);
            let mut i = 0;
            let mut last = 0.0;

            while i < order {
                let Some(vq) = codebook.read_vq(bs) else { return Ok(()) };

                // The VQ vector may be longer than the remaining number of coefficients.
                let take = min(order - i, vq.len());

                for (c, &v) in self.coeffs[i..i + take].iter_mut().zip(vq) {
                    *c = last + v;
                }

                i += take;
                last = self.coeffs[i - 1];
            }

            // The filter evaluation consumes two times the cosine of each coefficient.
            for coeff in self.coeffs[..order].iter_mut() {
                *coeff = 2.0 * coeff.cos();
            }
        }

        self.unused = self.amp == 0;

        Ok(())
    }

    fn synthesis(&mut self, block_exp: u8, curve: &mut [f32]) -> Result<()> {
        debug_assert!(!self.unused);

        let n = (1usize << block_exp) >> 1;

        let select = usize::from(block_exp != self.bs0_exp);
        let map = &self.bark_maps[select];
        let wdel = &self.wdel_maps[select];

        let order = usize::from(self.order);

        let mut i = 0;

        while i < n {
            let point = map[i];
            let two_cos_omega = wdel[i];
            let cos_omega = 0.5 * two_cos_omega;

            // Evaluate the filter response at omega: p from the odd-indexed coefficients, q
            // from the even-indexed ones.
            let mut p = 1.0f32;
            let mut q = 1.0f32;

            let mut pairs = self.coeffs[..order].chunks_exact(2);

            for pair in &mut pairs {
                q *= pair[0] - two_cos_omega;
                p *= pair[1] - two_cos_omega;
            }

            if let [last] = pairs.remainder() {
                q *= last - two_cos_omega;

                p = p * p * (1.0 - cos_omega * cos_omega);
                q = q * q * 0.25;
            }
            else {
                p = p * p * ((1.0 - cos_omega) / 2.0);
                q = q * q * ((1.0 + cos_omega) / 2.0);
            }

            if p + q == 0.0 {
                return decode_error("vorbis: floor0, invalid coefficients");
            }

            let value = linear_floor0_value(p, q, self.amp, self.amp_bits, self.amp_ofs);

            // The value holds for every spectral position warped to the same point.
            while i < n && map[i] == point {
                curve[i] = value;
                i += 1;
            }
        }

        Ok(())
    }
}

/// Vorbis I specification, section 6.2.3.
#[inline(always)]
fn bark(x: f64) -> f64 {
    (13.1 * (0.00074 * x).atan()) + (2.24 * (0.0000000185 * x * x).atan()) + (0.0001 * x)
}

fn bark_map(n: u32, rate: u16, bark_map_size: u16) -> Vec<i32> {
    let max_point = i32::from(bark_map_size) - 1;
    let rate = f64::from(rate);

    let scale = f64::from(bark_map_size) / bark(0.5 * rate);
    let rate_by_2n = rate / (2.0 * f64::from(n));

    (0..n)
        .map(|i| {
            let point = (bark(rate_by_2n * f64::from(i)) * scale).floor() as i32;
            point.min(max_point)
        })
        .collect()
}

fn wdel_map(map: &[i32], bark_map_size: u16) -> Vec<f32> {
    let omega_step = f64::consts::PI / f64::from(bark_map_size);

    map.iter().map(|&point| (2.0 * (omega_step * f64::from(point)).cos()) as f32).collect()
}

/// Calculate the linear floor value as per Vorbis I specification, section 6.2.3.
#[inline(always)]
fn linear_floor0_value(p: f32, q: f32, amp: u64, amp_bits: u8, amp_ofs: u8) -> f32 {
    // Amplitude can be up-to 63 bits and the offset 8 bits, so the product may exceed what an
    // f64 represents exactly. Such values do not occur in real streams; wrap to avoid a panic.
    let a = amp.wrapping_mul(u64::from(amp_ofs)) as f32;
    let b = (p + q).sqrt() * ((1u64 << amp_bits) - 1) as f32;

    (0.11512925 * ((a / b) - f32::from(amp_ofs))).exp()
}

/// Floor type 1: a piecewise-linear curve through decoded posts, rendered in the dB domain.
pub struct Floor1 {
    /// Class index for each partition.
    partition_classes: Vec<u8>,
    class_dimensions: [u8; 16],
    class_subclass_bits: [u8; 16],
    class_masterbooks: [u8; 16],
    /// Bitmask of sub-classes with an assigned codebook.
    class_subbook_used: [u8; 16],
    subclass_books: [[u8; 8]; 16],
    /// Floor multiplier, range limited to 1..=4.
    multiplier: u8,
    /// Post X coordinates, in bitstream order.
    x_list: Vec<u32>,
    /// For each post, the positions of its low and high neighbors among the preceding posts.
    low_neighbors: Vec<usize>,
    high_neighbors: Vec<usize>,
    /// Post indices in ascending X order.
    sort_idx: Vec<u8>,

    // Channel state.
    posts: Vec<u32>,
    final_y: Vec<i32>,
    step2: Vec<bool>,
    unused: bool,
}

impl Floor1 {
    fn read_setup(bs: &mut BitReader<'_>, max_codebook: u8) -> Result<Floor1> {
        let partitions = bs.read(5)? as usize;

        let mut partition_classes = Vec::with_capacity(partitions);
        let mut max_class = 0u8;

        for _ in 0..partitions {
            let class = bs.read(4)? as u8;
            max_class = max_class.max(class);
            partition_classes.push(class);
        }

        let mut class_dimensions = [0u8; 16];
        let mut class_subclass_bits = [0u8; 16];
        let mut class_masterbooks = [0u8; 16];
        let mut class_subbook_used = [0u8; 16];
        let mut subclass_books = [[0u8; 8]; 16];

        if partitions > 0 {
            for class in 0..=usize::from(max_class) {
                class_dimensions[class] = bs.read(3)? as u8 + 1;
                class_subclass_bits[class] = bs.read(2)? as u8;

                if class_subclass_bits[class] != 0 {
                    let masterbook = bs.read(8)? as u8;

                    if masterbook >= max_codebook {
                        return decode_error("vorbis: floor1, invalid class codebook");
                    }

                    class_masterbooks[class] = masterbook;
                }

                let num_subclasses = 1usize << class_subclass_bits[class];

                for sub in 0..num_subclasses {
                    let book = bs.read(8)? as u8;

                    // A value of zero means the sub-class has no codebook; otherwise the
                    // codebook number is the value minus one.
                    if book > 0 {
                        if book - 1 >= max_codebook {
                            return decode_error("vorbis: floor1, invalid subclass codebook");
                        }

                        subclass_books[class][sub] = book - 1;
                        class_subbook_used[class] |= 1 << sub;
                    }
                }
            }
        }

        let multiplier = bs.read(2)? as u8 + 1;
        let range_bits = bs.read(4)?;

        let mut x_list = vec![0u32, 1u32 << range_bits];
        let mut x_unique: HashSet<u32> = x_list.iter().copied().collect();

        for &class in &partition_classes {
            let dims = usize::from(class_dimensions[usize::from(class)]);

            // No more than 65 posts are allowed.
            if x_list.len() + dims > 65 {
                return decode_error("vorbis: floor1, x_list too long");
            }

            for _ in 0..dims {
                let x = bs.read(range_bits as u32)? as u32;

                // All posts must have unique X coordinates.
                if !x_unique.insert(x) {
                    return decode_error("vorbis: floor1, x_list not unique");
                }

                x_list.push(x);
            }
        }

        // Precompute the neighbor positions and the ascending-X iteration order.
        let mut low_neighbors = Vec::with_capacity(x_list.len());
        let mut high_neighbors = Vec::with_capacity(x_list.len());

        for i in 0..x_list.len() {
            let (low, high) = find_neighbors(&x_list, i);
            low_neighbors.push(low);
            high_neighbors.push(high);
        }

        let mut sort_idx: Vec<u8> = (0..x_list.len() as u8).collect();
        sort_idx.sort_by_key(|&i| x_list[usize::from(i)]);

        let count = x_list.len();

        Ok(Floor1 {
            partition_classes,
            class_dimensions,
            class_subclass_bits,
            class_masterbooks,
            class_subbook_used,
            subclass_books,
            multiplier,
            x_list,
            low_neighbors,
            high_neighbors,
            sort_idx,
            posts: vec![0; count],
            final_y: vec![0; count],
            step2: vec![false; count],
            unused: true,
        })
    }

    fn read_channel(&mut self, bs: &mut BitReader<'_>, codebooks: &[Codebook]) -> Result<()> {
        // Assume the floor is unused until it is decoded successfully.
        self.unused = true;

        // The channel produces silence unless the floor is marked as drawn.
        if !try_or_end!(bs.read_bool()) {
            return Ok(());
        }

        let range = post_range(self.multiplier);
        let y_bits = ilog(range - 1);

        self.posts[0] = try_or_end!(bs.read(y_bits)) as u32;
        self.posts[1] = try_or_end!(bs.read(y_bits)) as u32;

        let mut offset = 2;

        for &class in &self.partition_classes {
            let class = usize::from(class);

            let dims = usize::from(self.class_dimensions[class]);
            let bits = self.class_subclass_bits[class];
            let sub_mask = (1u32 << bits) - 1;

            let mut cval = 0u32;

            if bits > 0 {
                let masterbook = &codebooks[usize::from(self.class_masterbooks[class])];

                let Some(value) = masterbook.read_scalar(bs) else { return Ok(()) };
                cval = value;
            }

            for post in self.posts[offset..offset + dims].iter_mut() {
                let sub = (cval & sub_mask) as usize;
                cval >>= bits;

                *post = if self.class_subbook_used[class] & (1 << sub) != 0 {
                    let book = &codebooks[usize::from(self.subclass_books[class][sub])];

                    let Some(value) = book.read_scalar(bs) else { return Ok(()) };
                    value
                }
                else {
                    0
                };
            }

            offset += dims;
        }

        self.unused = false;

        Ok(())
    }

    /// Unwraps the decoded posts into final Y values against their predicted positions.
    fn unwrap_posts(&mut self) {
        let range = post_range(self.multiplier) as i32;

        self.step2[0] = true;
        self.step2[1] = true;

        self.final_y[0] = self.posts[0] as i32;
        self.final_y[1] = self.posts[1] as i32;

        for i in 2..self.x_list.len() {
            let low = self.low_neighbors[i];
            let high = self.high_neighbors[i];

            let predicted = render_point(
                self.x_list[low],
                self.final_y[low],
                self.x_list[high],
                self.final_y[high],
                self.x_list[i],
            );

            let val = self.posts[i] as i32;

            let high_room = range - predicted;
            let low_room = predicted;

            if val != 0 {
                let room = 2 * min(high_room, low_room);

                self.step2[low] = true;
                self.step2[high] = true;
                self.step2[i] = true;

                self.final_y[i] = if val >= room {
                    // The value escapes the symmetric window around the prediction and lands
                    // in whichever quadrant has the head-room.
                    if high_room > low_room {
                        val - low_room + predicted
                    }
                    else {
                        predicted - val + high_room - 1
                    }
                }
                else if val & 1 == 1 {
                    predicted - ((val + 1) / 2)
                }
                else {
                    predicted + (val / 2)
                };
            }
            else {
                // A zero value pins the post to its prediction and marks it inactive.
                self.step2[i] = false;
                self.final_y[i] = predicted;
            }
        }
    }

    fn synthesis(&mut self, block_exp: u8, curve: &mut [f32]) -> Result<()> {
        debug_assert!(!self.unused);

        self.unwrap_posts();

        let n = ((1usize << block_exp) >> 1) as u32;
        let multiplier = i32::from(self.multiplier);

        let first = usize::from(self.sort_idx[0]);

        let mut lx = 0u32;
        let mut ly = self.final_y[first] * multiplier;
        let mut hx = 0u32;
        let mut hy = 0i32;

        // Draw a line segment between each pair of active posts, in ascending X order.
        for &i in self.sort_idx[1..].iter() {
            let i = usize::from(i);

            if !self.step2[i] {
                continue;
            }

            hy = self.final_y[i] * multiplier;
            hx = self.x_list[i];

            render_line(lx, ly, hx, hy, n as usize, curve);

            lx = hx;
            ly = hy;
        }

        // Extend the last segment's value to the end of the half-block.
        if hx < n {
            render_line(hx, hy, n, hy, n as usize, curve);
        }

        Ok(())
    }
}

/// The post value range for each floor multiplier, Vorbis I specification section 7.2.3.
#[inline(always)]
fn post_range(multiplier: u8) -> u32 {
    match multiplier {
        1 => 256,
        2 => 128,
        3 => 86,
        4 => 64,
        _ => unreachable!(),
    }
}

/// Finds the low and high neighbors of post `x` as defined in sections 9.2.4 and 9.2.5 of the
/// Vorbis I specification.
///
/// The low neighbor is the position of the greatest value less than element `x` among the
/// preceding elements; the high neighbor is the position of the least value greater than it.
fn find_neighbors(vec: &[u32], x: usize) -> (usize, usize) {
    let bound = vec[x];

    let mut low = u32::MIN;
    let mut high = u32::MAX;

    let mut result = (0, 0);

    for (i, &value) in vec[..x].iter().enumerate() {
        if value >= low && value < bound {
            low = value;
            result.0 = i;
        }
        if value <= high && value > bound {
            high = value;
            result.1 = i;
        }
    }

    result
}

/// As defined in section 9.2.6 of the Vorbis I specification.
#[inline(always)]
fn render_point(x0: u32, y0: i32, x1: u32, y1: i32, x: u32) -> i32 {
    let dy = y1 - y0;
    let adx = x1 - x0;
    let err = dy.unsigned_abs() * (x - x0);
    let off = (err / adx) as i32;

    if dy < 0 {
        y0 - off
    }
    else {
        y0 + off
    }
}

/// Draws one line segment of the floor curve with the integer DDA defined in section 9.2.7 of
/// the Vorbis I specification, mapping each Y through the inverse dB table.
fn render_line(x0: u32, y0: i32, x1: u32, y1: i32, n: usize, v: &mut [f32]) {
    let dy = y1 - y0;
    let adx = (x1 - x0) as i32;

    let base = dy / adx;
    let sy = if dy < 0 { base - 1 } else { base + 1 };
    let ady = dy.abs() - base.abs() * adx;

    let mut y = y0;
    let mut err = 0;

    if (x0 as usize) < n {
        v[x0 as usize] = FLOOR1_INVERSE_DB_TABLE[y.clamp(0, 255) as usize];
    }

    let x_begin = x0 as usize + 1;
    let x_end = min(n, x1 as usize);

    if x_begin >= x_end {
        return;
    }

    for v in v[x_begin..x_end].iter_mut() {
        err += ady;

        if err >= adx {
            err -= adx;
            y += sy;
        }
        else {
            y += base;
        }

        *v = FLOOR1_INVERSE_DB_TABLE[y.clamp(0, 255) as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::{bark_map, find_neighbors, post_range, render_line, render_point};

    #[test]
    fn verify_render_point() {
        // Interpolation along a rising segment.
        assert_eq!(render_point(0, 0, 10, 10, 5), 5);
        assert_eq!(render_point(0, 10, 10, 0, 5), 5);
        assert_eq!(render_point(2, 50, 10, 70, 4), 55);
        // Truncation is toward the starting point.
        assert_eq!(render_point(0, 0, 3, 10, 1), 3);
        assert_eq!(render_point(0, 10, 3, 0, 1), 7);
    }

    #[test]
    fn verify_find_neighbors() {
        // The canonical floor1 X list starts with the range endpoints.
        let x_list = [0u32, 128, 64, 32, 96];

        assert_eq!(find_neighbors(&x_list, 2), (0, 1));
        assert_eq!(find_neighbors(&x_list, 3), (0, 2));
        assert_eq!(find_neighbors(&x_list, 4), (2, 1));
    }

    #[test]
    fn verify_post_range() {
        assert_eq!(post_range(1), 256);
        assert_eq!(post_range(2), 128);
        assert_eq!(post_range(3), 86);
        assert_eq!(post_range(4), 64);
    }

    #[test]
    fn verify_render_line_flat() {
        let mut v = [0f32; 16];
        render_line(0, 255, 16, 255, 16, &mut v);

        // The top of the inverse dB table is unity.
        for &value in &v {
            assert_eq!(value, 1.0);
        }
    }

    #[test]
    fn verify_render_line_monotonic() {
        let mut v = [0f32; 64];
        render_line(0, 0, 64, 255, 64, &mut v);

        for pair in v.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn verify_bark_map_monotonic() {
        let map = bark_map(1024, 44100, 1024);

        assert_eq!(map.len(), 1024);
        assert!(map[0] >= 0);

        for pair in map.windows(2) {
            assert!(pair[1] >= pair[0]);
        }

        assert!(*map.last().unwrap() <= 1023);
    }
}
