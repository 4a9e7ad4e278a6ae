//! Percentile-anchored normalization.
//!
//! Samples are divided by the value at the top 1% of the sorted signal, so
//! a few specular highlights cannot squash the rest of the image.

use tracing::debug;

/// Fraction of the brightest samples left above 1.0.
pub const ANCHOR_PERCENTILE: f64 = 0.01;

/// Rescales `samples` in place and returns the anchor used.
///
/// Exact zeros stay zero. When the anchor is not a finite positive value
/// (e.g. at least 99% of the samples are zero) the samples are left
/// untouched and `None` is returned.
pub fn normalize(samples: &mut [f32]) -> Option<f32> {
    let anchor = anchor(samples)?;
    if !(anchor.is_finite() && anchor > 0.0) {
        debug!(anchor, "Skipping normalization, anchor not positive");
        return None;
    }

    for v in samples.iter_mut() {
        if *v != 0.0 {
            *v /= anchor;
        }
    }
    Some(anchor)
}

/// Value at index `floor(0.01 * len)` of the descending sort.
///
/// NaN samples sort after every number, so they only reach the anchor when
/// more than 99% of the buffer is NaN.
pub fn anchor(samples: &[f32]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable_by(|a, b| match (a.is_nan(), b.is_nan()) {
        (false, false) => b.total_cmp(a),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });
    let index = (ANCHOR_PERCENTILE * sorted.len() as f64).floor() as usize;
    Some(sorted[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_buffer_becomes_one() {
        let mut px = vec![3.5f32; 500];
        assert_eq!(normalize(&mut px), Some(3.5));
        assert!(px.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn anchor_skips_top_percent() {
        // 200 samples: the two brightest sit above the anchor.
        let mut px: Vec<f32> = (1..=200).map(|i| i as f32).collect();
        let anchor = normalize(&mut px).unwrap();
        assert_relative_eq!(anchor, 198.0);
        assert_relative_eq!(px[199], 200.0 / 198.0);
        assert_relative_eq!(px[0], 1.0 / 198.0);
    }

    #[test]
    fn zeros_stay_zero() {
        let mut px = vec![0.0, 2.0, 0.0, 4.0];
        normalize(&mut px);
        assert_eq!(px, vec![0.0, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn single_sample() {
        let mut px = vec![7.0];
        normalize(&mut px);
        assert_eq!(px, vec![1.0]);

        let mut px = vec![0.0];
        assert_eq!(normalize(&mut px), None);
        assert_eq!(px, vec![0.0]);
    }

    #[test]
    fn empty_and_black_are_noops() {
        let mut px: Vec<f32> = Vec::new();
        assert_eq!(normalize(&mut px), None);

        let mut px = vec![0.0; 300];
        px[0] = 5.0;
        assert_eq!(normalize(&mut px), None);
        assert_eq!(px[0], 5.0);
    }

    #[test]
    fn nan_does_not_panic() {
        let mut px = vec![1.0, f32::NAN, 2.0, 4.0];
        assert_eq!(normalize(&mut px), Some(4.0));
        assert_relative_eq!(px[0], 0.25);
        assert!(px[1].is_nan());
        assert_relative_eq!(px[3], 1.0);
    }

    #[test]
    fn nan_never_becomes_anchor() {
        // Positive NaN outranks +inf under total_cmp; 2% of them must not
        // take the top-1% slot.
        let mut px: Vec<f32> = (1..=1000).map(|i| i as f32).collect();
        for i in (0..1000).step_by(50) {
            px[i] = f32::NAN;
        }
        // Index 10 of the descending finite run 1000, 999, ...
        assert_eq!(normalize(&mut px), Some(990.0));
        assert_relative_eq!(px[999], 1000.0 / 990.0);
        assert!(px[50].is_nan());

        let mut px = vec![f32::NAN; 10];
        assert_eq!(normalize(&mut px), None);
    }
}
