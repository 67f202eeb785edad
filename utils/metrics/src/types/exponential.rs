use std::sync::OnceLock;

/// Mapping between values and signed bin indices.
pub trait BinBound: Send + Sync {
    /// Smallest and largest representable value.
    fn value_range(&self) -> (f64, f64);

    /// Smallest and largest bin index.
    fn bin_range(&self) -> (i32, i32);

    /// Bin index the value falls into.
    fn bin(&self, value: f64) -> i32;

    /// Lower and upper value bound of `bin`.
    ///
    /// # Panics
    ///
    /// Panics if `bin` lies outside [`BinBound::bin_range`].
    fn bound(&self, bin: i32) -> (f64, f64);
}

/// Values beyond this magnitude land in the overflow bins.
pub const MAX_VALUE: f64 = 1e10;
pub const MIN_VALUE: f64 = -MAX_VALUE;
/// Magnitudes at or below this collapse into bins `1` / `-1`.
pub const MIN_FLOAT_VALUE: f64 = 1e-6;
/// Decades per bin: bin width grows tenfold every ten bins.
pub const STEP: f64 = 0.1;

struct Scale {
    min_log: f64,
    max_bin: i32,
    /// `cutoffs[i]` is the upper bound of bin `i`; negative bins mirror it.
    cutoffs: Vec<f64>,
}

fn scale() -> &'static Scale {
    static SCALE: OnceLock<Scale> = OnceLock::new();

    SCALE.get_or_init(|| {
        let min_log = (MIN_FLOAT_VALUE.log10() / STEP).round();
        let max_log = (MAX_VALUE.log10() / STEP).round();
        let max_bin = (max_log - min_log + 1.0) as i32 + 1;

        let mut cutoffs = Vec::with_capacity(max_bin as usize + 1);
        cutoffs.push(0.0);
        for i in 0..max_bin - 1 {
            cutoffs.push(10f64.powf((f64::from(i) + min_log) * STEP));
        }
        cutoffs.push(f64::MAX);

        Scale {
            min_log,
            max_bin,
            cutoffs,
        }
    })
}

/// Logarithmic binner symmetric around zero.
///
/// Bin `0` holds exactly zero. Bin `1` holds `(0, 1e-6]`, and each following
/// bin is `10^0.1` times wider than the previous one up to `1e10`. Everything
/// above `1e10` falls into the overflow bin [`Exponential::max_bin`]. Negative
/// values use the negated index of their magnitude.
///
/// ```text
///   -1:  [-1e-6, 0)
///    0:  [0, 0]
///    1:  (0, 1e-6]
///    2:  (1e-6, r * 1e-6]
///   61:  (1 / r, 1]
///  162:  (1e10, f64::MAX]
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exponential;

impl Exponential {
    pub fn new() -> Self {
        Self
    }

    /// Index of the overflow bin.
    pub fn max_bin() -> i32 {
        scale().max_bin
    }

    fn magnitude_bin(v: f64) -> i32 {
        let scale = scale();

        if v == 0.0 {
            return 0;
        }

        let bin = if v <= MIN_FLOAT_VALUE {
            1
        } else if v > MAX_VALUE {
            scale.max_bin
        } else {
            ((v.log10() / STEP - scale.min_log).ceil() as i32 + 1).clamp(1, scale.max_bin - 1)
        };

        // log10 rounding can put a value one bin off right next to a cutoff
        let cutoffs = &scale.cutoffs;
        if bin < scale.max_bin && v > cutoffs[bin as usize] {
            bin + 1
        } else if v <= cutoffs[bin as usize - 1] {
            bin - 1
        } else {
            bin
        }
    }

    /// Like [`BinBound::bound`] but returns `None` for an out-of-range index.
    pub fn checked_bound(&self, bin: i32) -> Option<(f64, f64)> {
        let scale = scale();
        if bin.unsigned_abs() > scale.max_bin.unsigned_abs() {
            return None;
        }

        let cutoffs = &scale.cutoffs;
        let bound = match bin {
            0 => (0.0, 0.0),
            b if b > 0 => (cutoffs[b as usize - 1], cutoffs[b as usize]),
            b => {
                let b = b.unsigned_abs() as usize;
                (-cutoffs[b], -cutoffs[b - 1])
            }
        };

        Some(bound)
    }
}

impl BinBound for Exponential {
    fn value_range(&self) -> (f64, f64) {
        (MIN_VALUE, MAX_VALUE)
    }

    fn bin_range(&self) -> (i32, i32) {
        let max_bin = scale().max_bin;

        (-max_bin, max_bin)
    }

    fn bin(&self, value: f64) -> i32 {
        if value >= 0.0 {
            Self::magnitude_bin(value)
        } else {
            -Self::magnitude_bin(-value)
        }
    }

    fn bound(&self, bin: i32) -> (f64, f64) {
        match self.checked_bound(bin) {
            Some(bound) => bound,
            None => panic!("bin index is out of range: {bin}"),
        }
    }
}
