//! In-place radix-2 decimation-in-time FFT.
//!
//! Buffers must have a power-of-two length. Twiddle factors are advanced by a
//! per-stage rotation instead of evaluating `sin`/`cos` for every butterfly,
//! which drifts slightly with block length but stays well inside single
//! precision tolerance for frame sizes of a few thousand samples.

use rustfft::num_complex::Complex;

use super::Real;

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

/// Transform `buf` in place. The inverse is normalised by `1/n`.
#[allow(dead_code)]
pub fn transform<T: Real>(buf: &mut [Complex<T>], direction: Direction) {
    match direction {
        Direction::Forward => forward(buf),
        Direction::Inverse => inverse(buf),
    }
}

/// Reorder `buf` so element `i` lands at the bit-reversed index of `i`.
pub fn bit_reverse_permute<E>(buf: &mut [E]) {
    let n = buf.len();
    let mut j = 0usize;
    for i in 0..n {
        if i < j {
            buf.swap(i, j);
        }
        // increment j as a bit-reversed counter
        let mut mask = n >> 1;
        while mask != 0 && j & mask != 0 {
            j ^= mask;
            mask >>= 1;
        }
        j |= mask;
    }
}

pub fn forward<T: Real>(buf: &mut [Complex<T>]) {
    let n = buf.len();
    debug_assert!(n == 0 || n.is_power_of_two(), "FFT length {} is not a power of two", n);

    bit_reverse_permute(buf);

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let angle = -T::lit(2.0) * T::PI() / T::lit(len as f64);
        let step = Complex::new(angle.cos(), angle.sin());

        for block in buf.chunks_exact_mut(len) {
            let (evens, odds) = block.split_at_mut(half);
            let mut w = Complex::new(T::one(), T::zero());
            for (u, v) in evens.iter_mut().zip(odds.iter_mut()) {
                let t = w * *v;
                let a = *u;
                *u = a + t;
                *v = a - t;
                w = w * step;
            }
        }
        len <<= 1;
    }
}

/// Inverse via conjugation around the forward transform.
#[allow(dead_code)]
pub fn inverse<T: Real>(buf: &mut [Complex<T>]) {
    let n = buf.len();
    if n == 0 {
        return;
    }
    for c in buf.iter_mut() {
        *c = c.conj();
    }
    forward(buf);
    let scale = T::lit(n as f64);
    for c in buf.iter_mut() {
        *c = Complex::new(c.re / scale, -c.im / scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;

    fn test_signal(n: usize) -> Vec<Complex<f64>> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                Complex::new(
                    (0.37 * t).sin() + 0.5 * (1.3 * t).cos(),
                    0.25 * (0.11 * t * t).sin(),
                )
            })
            .collect()
    }

    #[test]
    fn bit_reversal_of_eight() {
        let mut idx: Vec<usize> = (0..8).collect();
        bit_reverse_permute(&mut idx);
        assert_eq!(idx, vec![0, 4, 2, 6, 1, 5, 3, 7]);
    }

    #[test]
    fn bit_reversal_is_an_involution() {
        let mut idx: Vec<usize> = (0..64).collect();
        bit_reverse_permute(&mut idx);
        bit_reverse_permute(&mut idx);
        assert_eq!(idx, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn all_ones_concentrates_in_dc() {
        let mut buf = vec![Complex::new(1.0f32, 0.0); 8];
        forward(&mut buf);
        assert!((buf[0].re - 8.0).abs() < 1e-5);
        assert!(buf[0].im.abs() < 1e-5);
        for c in &buf[1..] {
            assert!(c.norm() < 1e-5, "non-DC bin {:?}", c);
        }
    }

    #[test]
    fn single_cosine_lands_in_its_bin() {
        let n = 64;
        let k = 5;
        let mut buf: Vec<Complex<f64>> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * (k * i) as f64 / n as f64;
                Complex::new(phase.cos(), 0.0)
            })
            .collect();
        forward(&mut buf);
        assert!((buf[k].norm() - n as f64 / 2.0).abs() < 1e-9);
        assert!((buf[n - k].norm() - n as f64 / 2.0).abs() < 1e-9);
        assert!(buf[k + 1].norm() < 1e-9);
    }

    #[test]
    fn round_trip_restores_input_f32() {
        for &n in &[1usize, 2, 4, 16, 256, 2048] {
            let original: Vec<Complex<f32>> = test_signal(n)
                .iter()
                .map(|c| Complex::new(c.re as f32, c.im as f32))
                .collect();
            let mut buf = original.clone();
            transform(&mut buf, Direction::Forward);
            transform(&mut buf, Direction::Inverse);
            for (a, b) in buf.iter().zip(original.iter()) {
                assert!((a - b).norm() <= 1e-5 * (1.0 + b.norm()), "n={} {:?} vs {:?}", n, a, b);
            }
        }
    }

    #[test]
    fn round_trip_restores_input_f64() {
        let original = test_signal(1024);
        let mut buf = original.clone();
        forward(&mut buf);
        inverse(&mut buf);
        for (a, b) in buf.iter().zip(original.iter()) {
            assert!((a - b).norm() < 1e-10);
        }
    }

    #[test]
    fn matches_rustfft_reference() {
        for &n in &[8usize, 128, 1024, 4096] {
            let input = test_signal(n);
            let mut ours = input.clone();
            forward(&mut ours);

            let mut reference = input;
            FftPlanner::<f64>::new().plan_fft_forward(n).process(&mut reference);

            let scale = (n as f64).sqrt();
            for (a, b) in ours.iter().zip(reference.iter()) {
                assert!((a - b).norm() < 1e-9 * scale * n as f64, "n={}", n);
            }
        }
    }

    #[test]
    fn empty_buffer_is_noop() {
        let mut buf: Vec<Complex<f32>> = Vec::new();
        forward(&mut buf);
        inverse(&mut buf);
        assert!(buf.is_empty());
    }
}
