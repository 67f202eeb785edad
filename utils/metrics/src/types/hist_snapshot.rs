use serde::Serialize;

use crate::types::{BinBound, Exponential};

/// Live count of one bin at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinCount {
    pub index: i32,
    pub count: u64,
}

/// A bin resolved to its value bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub count: u64,
    pub lower: f64,
    pub upper: f64,
}

/// Point-in-time copy of a histogram's bins, ascending by index.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    binner: Exponential,
    counts: Vec<BinCount>,
}

impl HistogramSnapshot {
    pub fn new(binner: Exponential, counts: Vec<BinCount>) -> Self {
        Self { binner, counts }
    }

    pub fn binner(&self) -> Exponential {
        self.binner
    }

    pub fn counts(&self) -> &[BinCount] {
        &self.counts
    }

    pub fn bins(&self) -> Vec<Bin> {
        self.counts
            .iter()
            .map(|b| {
                let (lower, upper) = self.binner.bound(b.index);
                Bin {
                    count: b.count,
                    lower,
                    upper,
                }
            })
            .collect()
    }

    /// Estimated values at each fraction in `fractions`, plus the total count.
    ///
    /// See [`percentiles`] for the estimation rules.
    pub fn percentiles(&self, fractions: &[f64]) -> (Vec<f64>, u64) {
        percentiles(&self.binner, &self.counts, fractions)
    }
}

/// Estimates percentiles from ascending `(index, count)` pairs.
///
/// Fractions outside `[0, 1]` produce `NaN` in their slot without affecting
/// the others. An empty or all-zero input yields zeros and a count of `0`.
/// Ranks landing in the lowest or highest bin of the scale report the scale's
/// value range, since overflow bins have no finite width to interpolate over.
/// Everywhere else the value is interpolated linearly inside the bin, treating
/// the bin's samples as evenly spread over its value range.
///
/// The target rank is `ceil(total * p)` but never below `1`, so `p = 0`
/// estimates the smallest sample inside its own bin instead of extrapolating
/// below the bin's lower bound.
pub fn percentiles<B: BinBound + ?Sized>(
    binner: &B,
    counts: &[BinCount],
    fractions: &[f64],
) -> (Vec<f64>, u64) {
    let mut result = vec![0.0; fractions.len()];
    if fractions.is_empty() || counts.is_empty() {
        return (result, 0);
    }

    let cumulative: Vec<u64> = counts
        .iter()
        .scan(0u64, |acc, b| {
            *acc += b.count;
            Some(*acc)
        })
        .collect();

    let total = cumulative.last().copied().unwrap_or(0);
    if total == 0 {
        return (result, 0);
    }

    let (min_bin, max_bin) = binner.bin_range();
    let (min_value, max_value) = binner.value_range();

    for (slot, &p) in result.iter_mut().zip(fractions) {
        if !(0.0..=1.0).contains(&p) {
            *slot = f64::NAN;
            continue;
        }

        // rank 0 does not exist; p = 0 asks for the smallest sample
        let p_count = ((total as f64) * p).ceil().max(1.0);
        let rank = p_count as u64;
        let idx = cumulative.partition_point(|&c| c < rank);
        let bin = counts[idx].index;

        if bin == min_bin {
            *slot = min_value;
            continue;
        }
        if bin == max_bin {
            *slot = max_value;
            continue;
        }

        //   (p_count - l_count + 0.5)     result - l_value
        //   ------------------------- = -------------------
        //     (u_count - l_count + 1)    u_value - l_value
        let l_count = if idx > 0 {
            cumulative[idx - 1] as f64 + 1.0
        } else {
            1.0
        };
        let u_count = cumulative[idx] as f64;
        let (l_value, u_value) = binner.bound(bin);

        *slot = l_value + (p_count - l_count + 0.5) * (u_value - l_value) / (u_count - l_count + 1.0);
    }

    (result, total)
}
