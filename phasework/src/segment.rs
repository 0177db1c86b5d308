//! Deterministic partitioning of ordered input into contiguous segments.
//!
//! This is the only data-partitioning primitive: every phase handler splits
//! its input through [`segment`], whatever the element type.

use std::fmt;
use std::num::NonZeroUsize;

use phasework_shared::{PhaseworkError, PhaseworkResult};

/// Default number of segments a phase is split into.
pub const DEFAULT_SEGMENTS: usize = 8;

/// A validated, strictly positive segment count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentCount(NonZeroUsize);

impl SegmentCount {
    pub fn new(n: usize) -> PhaseworkResult<Self> {
        NonZeroUsize::new(n).map(Self).ok_or_else(|| {
            PhaseworkError::Config(format!("segment count must be at least 1, got {}", n))
        })
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for SegmentCount {
    fn default() -> Self {
        Self(NonZeroUsize::new(DEFAULT_SEGMENTS).expect("default segment count is non-zero"))
    }
}

impl TryFrom<i64> for SegmentCount {
    type Error = PhaseworkError;

    fn try_from(n: i64) -> PhaseworkResult<Self> {
        let n = usize::try_from(n).map_err(|_| {
            PhaseworkError::Config(format!("segment count must be at least 1, got {}", n))
        })?;
        Self::new(n)
    }
}

impl fmt::Display for SegmentCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split `items` into at most `n` contiguous, near-equal segments.
///
/// - Empty input yields no segments.
/// - `min(n, len)` segments are produced, none of them empty.
/// - Sizes differ by at most one; the first `len % n` segments carry the extra
///   element.
/// - Concatenating the segments in order reproduces `items`.
///
/// `n == 0` is a configuration error.
pub fn segment<T: Clone>(items: &[T], n: usize) -> PhaseworkResult<Vec<Vec<T>>> {
    let n = SegmentCount::new(n)?.get();
    let len = items.len();
    if len == 0 {
        return Ok(Vec::new());
    }

    let buckets = n.min(len);
    let base = len / buckets;
    let remainder = len % buckets;

    let mut segments = Vec::with_capacity(buckets);
    let mut start = 0;
    for index in 0..buckets {
        let size = base + usize::from(index < remainder);
        segments.push(items[start..start + size].to_vec());
        start += size;
    }

    debug_assert_eq!(start, len);
    Ok(segments)
}
