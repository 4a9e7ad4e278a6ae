//! Dynamic range analysis.

use std::fmt;

/// Ratio between the brightest sample and the smallest nonzero sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicRangeInfo {
    /// `max / min_nonzero`.
    pub ratio: f32,
    /// `log2(ratio)`.
    pub stops: f32,
}

/// Coarse rating of a dynamic range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicRangeQuality {
    /// Ratio above 1e5 and more than 15 stops.
    VeryHigh,
    /// Ratio above 1e4 and more than 10 stops.
    High,
    /// Everything else.
    Standard,
}

const HIGH_RATIO: f32 = 1e5;
const HIGH_STOPS: f32 = 15.0;

impl DynamicRangeInfo {
    /// Rates the range.
    pub fn quality(&self) -> DynamicRangeQuality {
        if self.ratio > HIGH_RATIO && self.stops > HIGH_STOPS {
            DynamicRangeQuality::VeryHigh
        } else if self.ratio > HIGH_RATIO / 10.0 && self.stops > HIGH_STOPS - 5.0 {
            DynamicRangeQuality::High
        } else {
            DynamicRangeQuality::Standard
        }
    }

    /// Ratio with a K/M suffix and two decimals, e.g. `12.35K`.
    pub fn format_ratio(&self) -> String {
        let ratio = self.ratio as f64;
        if ratio >= 1e6 {
            format!("{:.2}M", ratio / 1e6)
        } else if ratio >= 1e3 {
            format!("{:.2}K", ratio / 1e3)
        } else {
            format!("{:.2}", ratio)
        }
    }
}

impl fmt::Display for DynamicRangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1} stops)", self.format_ratio(), self.stops)
    }
}

impl fmt::Display for DynamicRangeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DynamicRangeQuality::VeryHigh => "Very High",
            DynamicRangeQuality::High => "High",
            DynamicRangeQuality::Standard => "Standard",
        })
    }
}

/// Measures the dynamic range of `samples` in one pass.
///
/// Only strictly positive samples count, so zeros, negatives and NaN are
/// ignored. Without any positive sample the result is `ratio = 0, stops = 0`.
pub fn analyze(samples: &[f32]) -> DynamicRangeInfo {
    let mut max_value = f32::MIN_POSITIVE;
    let mut min_nonzero = f32::MAX;
    let mut any_positive = false;

    for &v in samples {
        if v > 0.0 {
            any_positive = true;
            if v > max_value {
                max_value = v;
            }
            if v < min_nonzero {
                min_nonzero = v;
            }
        }
    }

    if !any_positive {
        return DynamicRangeInfo { ratio: 0.0, stops: 0.0 };
    }

    let ratio = max_value / min_nonzero;
    DynamicRangeInfo { ratio, stops: ratio.log2() }
}
