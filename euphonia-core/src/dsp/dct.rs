// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `dct` module implements the Discrete Cosine Transform (DCT).

use std::f64;

/// Discrete Cosine Transform (DCT).
///
/// Implements the unnormalized DCT-II using the recursive split algorithm described in \[1\]. The
/// recursion is computed in double-precision so that the half-secant scaling near the split
/// boundary does not erode the working precision for large transforms.
///
/// \[1\] B.G. Lee, "A new algorithm to compute the discrete cosine transform", IEEE Transactions
///       on Acoustics, Speech, and Signal Processing, vol. 32, no. 6, pp. 1243-1245, 1984.
pub struct Dct {
    n: usize,
    /// Half-secant tables, one per recursion level, largest transform first.
    tables: Vec<Vec<f64>>,
    buf: Vec<f64>,
    temp: Vec<f64>,
}

impl Dct {
    /// Instantiate a N-point DCT.
    ///
    /// The value of `n` must be a power-of-2, and less-than or equal to 8192.
    pub fn new(n: u32) -> Dct {
        // The algorithm implemented requires a power-of-two N.
        assert!(n.is_power_of_two(), "n must be a power-of-two");
        // This limitation is somewhat arbitrary, but a limit must be set somewhere.
        assert!(n <= 8192, "maximum of 8192-point dct");

        let n = n as usize;

        let mut tables = Vec::new();
        let mut size = n;

        while size >= 2 {
            let freq = f64::consts::PI / size as f64;

            let table = (0..size / 2).map(|i| 0.5 / ((i as f64 + 0.5) * freq).cos()).collect();

            tables.push(table);
            size >>= 1;
        }

        Dct { n, tables, buf: vec![0.0; n], temp: vec![0.0; n] }
    }

    /// Performs a N-point Discrete Cosine Transform in-place.
    ///
    /// The number of input samples, N, must equal the value `Dct` was instantiated with. Failing
    /// to meet this requirement will throw an assertion.
    pub fn dct_ii_inplace(&mut self, x: &mut [f32]) {
        assert_eq!(x.len(), self.n);

        for (b, &s) in self.buf.iter_mut().zip(x.iter()) {
            *b = f64::from(s);
        }

        dct_ii_step(&mut self.buf, &mut self.temp, &self.tables, 0);

        for (s, &b) in x.iter_mut().zip(self.buf.iter()) {
            *s = b as f32;
        }
    }
}

fn dct_ii_step(x: &mut [f64], t: &mut [f64], tables: &[Vec<f64>], level: usize) {
    let n = x.len();

    if n < 2 {
        return;
    }

    let n_half = n >> 1;
    let table = &tables[level];

    // Butterfly the input into sum and scaled-difference halves.
    {
        let (tl, tr) = t.split_at_mut(n_half);

        for i in 0..n_half {
            let a = x[i];
            let b = x[n - 1 - i];
            tl[i] = a + b;
            tr[i] = (a - b) * table[i];
        }
    }

    x.copy_from_slice(t);

    {
        let (xl, xr) = x.split_at_mut(n_half);
        let (tl, tr) = t.split_at_mut(n_half);

        dct_ii_step(xl, tl, tables, level + 1);
        dct_ii_step(xr, tr, tables, level + 1);
    }

    // Interleave: the sum half produces the even outputs, adjacent pairs of the difference half
    // produce the odd outputs.
    t.copy_from_slice(x);

    let (tl, tr) = t.split_at(n_half);

    for i in 0..n_half - 1 {
        x[2 * i] = tl[i];
        x[2 * i + 1] = tr[i] + tr[i + 1];
    }

    x[n - 2] = tl[n_half - 1];
    x[n - 1] = tr[n_half - 1];
}

#[cfg(test)]
mod tests {
    use std::f64;

    use super::Dct;

    fn dct_analytical(x: &[f32], y: &mut [f32]) {
        let n = x.len();

        let w = f64::consts::PI / n as f64;

        for (i, y) in y.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (j, &x) in x.iter().enumerate() {
                sum += f64::from(x) * (w * (i as f64) * ((j as f64) + 0.5)).cos();
            }
            *y = sum as f32;
        }
    }

    #[test]
    fn verify_dct_ii() {
        #[rustfmt::skip]
        const TEST_VECTOR: [f32; 32] = [
            0.1710, 0.1705, 0.3476, 0.1866, 0.4784, 0.6525, 0.2690, 0.9996,
            0.1864, 0.7277, 0.1163, 0.6620, 0.0911, 0.3225, 0.1126, 0.5344,
            0.7839, 0.9741, 0.8757, 0.5763, 0.5926, 0.2756, 0.1757, 0.6531,
            0.7101, 0.7376, 0.1924, 0.0351, 0.8044, 0.2409, 0.9347, 0.9417,
        ];

        let mut actual = TEST_VECTOR;
        let mut expected = [0f32; 32];

        let mut dct = Dct::new(32);
        dct.dct_ii_inplace(&mut actual);

        dct_analytical(&TEST_VECTOR, &mut expected);

        for (&a, &e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 0.00001);
        }
    }

    #[test]
    fn verify_dct_ii_other_sizes() {
        // Powers of two other than the primary test size must also transform correctly.
        for &n in &[2usize, 8, 64, 512] {
            let src: Vec<f32> = (0..n).map(|i| ((31 * i + 7) % 17) as f32 / 17.0 - 0.5).collect();

            let mut actual = src.clone();
            let mut expected = vec![0f32; n];

            let mut dct = Dct::new(n as u32);
            dct.dct_ii_inplace(&mut actual);

            dct_analytical(&src, &mut expected);

            for (&a, &e) in actual.iter().zip(expected.iter()) {
                assert!((a - e).abs() < 1e-4);
            }
        }
    }
}
