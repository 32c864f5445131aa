// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `mdct` module implements the Modified Discrete Cosine Transform (MDCT).
//!
//! The (I)MDCT algorithms in this module are not general purpose and are specialized for use in
//! typical audio compression applications. Therefore, some constraints may apply.

use std::f64;

use super::dct::Dct;

/// Inverse Modified Discrete Cosine Transform (IMDCT).
///
/// Implements the IMDCT in-terms of a DCT-IV, which is in turn lifted from a DCT-II, as described
/// in \[1\] and \[2\].
///
/// \[1\] Mu-Huo Cheng and Yu-Hsin Hsu, "Fast IMDCT and MDCT algorithms - a matrix approach,"
///       in IEEE Transactions on Signal Processing, vol. 51, no. 1, pp. 221-229, Jan. 2003,
///       doi: 10.1109/TSP.2002.806566.
///
/// \[2\] Tan Li, R. Zhang, R. Yang, Heyun Huang and Fuhuei Lin, "A unified computing kernel for
///       MDCT/IMDCT in modern audio coding standards," 2007 International Symposium on
///       Communications and Information Technologies, Sydney, NSW, 2007, pp. 546-550,
///       doi: 10.1109/ISCIT.2007.4392079.
pub struct Imdct {
    dct: Dct,
    n: usize,
    /// Pre-twiddle factors, 2cos(pi * (2i + 1) / 4n).
    twiddle: Vec<f32>,
}

impl Imdct {
    /// Instantiate a N-point IMDCT.
    ///
    /// The value of `n` is the number of input spectral coefficients, must be a power-of-2, and
    /// less-than or equal to 8192. The transform produces `2n` output samples.
    pub fn new(n: u32) -> Imdct {
        // The algorithm implemented requires a power-of-two N.
        assert!(n.is_power_of_two(), "n must be a power of two");
        // This limitation is somewhat arbitrary, but a limit must be set somewhere.
        assert!(n <= 8192, "maximum of 8192-point imdct");

        let c = f64::consts::PI / f64::from(4 * n);

        let twiddle =
            (0..n).map(|i| (2.0 * (c * f64::from(2 * i + 1)).cos()) as f32).collect();

        Imdct { dct: Dct::new(n), n: n as usize, twiddle }
    }

    /// Performs the Inverse Modified Discrete Cosine Transform.
    ///
    /// The number of input samples in `src`, N, must equal the value `Imdct` was instantiated
    /// with. The length of the output slice, `dst`, must equal 2N. Failing to meet these
    /// requirements will throw an assertion.
    ///
    /// This function performs no windowing, but each sample will be multiplied by `scale`.
    pub fn imdct(&mut self, src: &[f32], dst: &mut [f32], scale: f32) {
        let n = self.n;
        let n4 = n >> 1;

        assert_eq!(src.len(), n);
        assert_eq!(dst.len(), 2 * n);

        // Pre-twiddle the spectrum into the second-half of the output buffer, then transform it
        // with the DCT-II in-place.
        for ((d, &s), &w) in dst[n..].iter_mut().zip(src).zip(&self.twiddle) {
            *d = s * w;
        }

        self.dct.dct_ii_inplace(&mut dst[n..]);

        // Split the output buffer into 4 evenly sized quarters: [ q0, q1, q2, q3 ]. Quarters 2 &
        // 3 hold the DCT-II transformed samples.
        let (q0, rest) = dst.split_at_mut(n4);
        let (q1, rest) = rest.split_at_mut(n4);
        let (q2, q3) = rest.split_at_mut(n4);

        // Lift the DCT-II to the DCT-IV with the first-order recurrence. Afterwards, q1 holds the
        // negated lower half of the DCT-IV, and q2 its upper half.
        q1[0] = -0.5 * q2[0];

        for i in 1..n4 {
            q1[i] = -(q2[i] + q1[i - 1]);
        }

        q2[0] = q3[0] + q1[n4 - 1];

        for i in 1..n4 {
            q2[i] = q3[i] - q2[i - 1];
        }

        // Expand the DCT-IV into the full IMDCT output using its symmetries, applying the scale
        // factor on the way out.
        //
        // q0 takes a scaled copy of the upper DCT-IV half.
        for (d, &s) in q0.iter_mut().zip(q2.iter()) {
            *d = scale * s;
        }

        // q3 takes a scaled copy of the negated lower half, and q2 the same, reversed.
        for i in 0..n4 {
            let s = scale * q1[i];
            q3[i] = s;
            q2[n4 - 1 - i] = s;
        }

        // q1 takes the inverted reverse of q0, which preserved the original q2.
        for i in 0..n4 {
            q1[i] = -q0[n4 - 1 - i];
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64;

    use super::Imdct;

    fn imdct_analytical(x: &[f32], y: &mut [f32], scale: f64) {
        assert!(y.len() == 2 * x.len());

        // Generates 2N outputs from N inputs.
        let n_in = x.len();
        let n_out = x.len() << 1;

        let pi_2n = f64::consts::PI / (2 * n_out) as f64;

        for (i, y) in y.iter_mut().enumerate() {
            let mut accum = 0.0;

            for (j, &x) in x.iter().enumerate() {
                accum += f64::from(x) * (pi_2n * ((2 * i + 1 + n_in) * (2 * j + 1)) as f64).cos();
            }

            *y = (scale * accum) as f32;
        }
    }

    #[test]
    fn verify_imdct() {
        const TEST_VECTOR: [f32; 32] = [
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
            17.0, 18.0, 19.0, 20.0, 21.0, 22.0, 23.0, 24.0,
            25.0, 26.0, 27.0, 28.0, 29.0, 30.0, 31.0, 32.0,
        ];

        let mut actual = [0f32; 64];
        let mut expected = [0f32; 64];

        let scale = (2.0f64 / 64.0).sqrt();

        imdct_analytical(&TEST_VECTOR, &mut expected, scale);

        let mut mdct = Imdct::new(32);
        mdct.imdct(&TEST_VECTOR, &mut actual, scale as f32);

        for (&a, &e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 0.00001);
        }
    }

    #[test]
    fn verify_imdct_unit_scale() {
        // The decoder invokes the transform with a unity scale factor.
        let src: Vec<f32> = (0..128).map(|i| ((i as f32) * 0.37).sin()).collect();

        let mut actual = vec![0f32; 256];
        let mut expected = vec![0f32; 256];

        imdct_analytical(&src, &mut expected, 1.0);

        let mut mdct = Imdct::new(128);
        mdct.imdct(&src, &mut actual, 1.0);

        for (&a, &e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-4);
        }
    }
}
