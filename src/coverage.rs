use crate::interval::{Interval, Strand};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageProfile {
    depth: Vec<u32>,
}

impl CoverageProfile {
    pub fn zeroed(max_len: usize) -> Self {
        Self {
            depth: vec![0; max_len],
        }
    }

    /// Exact coverage of `intervals` over `[0, max_len)`, built from a
    /// difference array and a single prefix sum.
    ///
    /// Every interval must satisfy `start < end <= max_len`; record loading
    /// rejects anything else before it reaches here.
    pub fn from_intervals<'a, I>(intervals: I, max_len: usize) -> Self
    where
        I: IntoIterator<Item = &'a Interval>,
    {
        let mut delta = vec![0_i64; max_len + 1];
        for interval in intervals {
            debug_assert!(interval.start < interval.end && interval.end <= max_len);
            delta[interval.start] += 1;
            delta[interval.end] -= 1;
        }

        let mut depth = Vec::with_capacity(max_len);
        let mut running = 0_i64;
        for change in &delta[..max_len] {
            running += change;
            depth.push(running as u32);
        }
        Self { depth }
    }

    /// Seeds a profile from persisted per-position bytes. Missing trailing
    /// positions are zero; bytes past `max_len` are ignored.
    pub fn from_prior_bytes(bytes: &[u8], max_len: usize) -> Self {
        let mut depth = vec![0_u32; max_len];
        for (slot, byte) in depth.iter_mut().zip(bytes) {
            *slot = u32::from(*byte);
        }
        Self { depth }
    }

    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn get(&self, position: usize) -> u32 {
        self.depth[position]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.depth
    }

    pub fn span(&self, positions: Range<usize>) -> &[u32] {
        &self.depth[positions]
    }

    pub fn increment(&mut self, positions: Range<usize>) {
        for value in &mut self.depth[positions] {
            *value += 1;
        }
    }

    /// Per-position values capped at `cap` and at `u8::MAX`, the persisted
    /// byte layout.
    pub fn to_capped_bytes(&self, cap: u32) -> Vec<u8> {
        let cap = cap.min(u32::from(u8::MAX));
        self.depth
            .iter()
            .map(|value| (*value).min(cap) as u8)
            .collect()
    }
}

/// Coverage split by alignment strand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrandedCoverage {
    profiles: [CoverageProfile; 2],
}

impl StrandedCoverage {
    pub fn zeroed(max_len: usize) -> Self {
        Self {
            profiles: [
                CoverageProfile::zeroed(max_len),
                CoverageProfile::zeroed(max_len),
            ],
        }
    }

    pub fn from_intervals<'a, I>(intervals: I, max_len: usize) -> Self
    where
        I: IntoIterator<Item = &'a Interval>,
    {
        let (plus, minus): (Vec<&Interval>, Vec<&Interval>) = intervals
            .into_iter()
            .partition(|interval| interval.strand == Strand::Plus);
        Self {
            profiles: [
                CoverageProfile::from_intervals(plus, max_len),
                CoverageProfile::from_intervals(minus, max_len),
            ],
        }
    }

    pub fn strand(&self, strand: Strand) -> &CoverageProfile {
        &self.profiles[strand.index()]
    }

    pub fn increment(&mut self, strand: Strand, positions: Range<usize>) {
        self.profiles[strand.index()].increment(positions);
    }
}
