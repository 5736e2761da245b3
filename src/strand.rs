use crate::coverage::{CoverageProfile, StrandedCoverage};
use crate::interval::Strand;
use std::ops::Range;

/// Desired `(plus, minus)` coverage at one position given what each strand
/// has available. The sum never exceeds `threshold` and neither strand is
/// asked for more than it has.
pub fn desired_pair(plus: u32, minus: u32, threshold: u32) -> (u32, u32) {
    let half = threshold / 2;
    match (plus <= half, minus <= half) {
        (true, true) => (plus, minus),
        (true, false) => (plus, minus.min(threshold - plus)),
        (false, true) => (plus.min(threshold - minus), minus),
        (false, false) => (half, half),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrandDemand {
    desired: [Vec<u32>; 2],
}

impl StrandDemand {
    /// Builds the demand profile from baseline per-strand coverage. With a
    /// prior profile the budget at each position shrinks by the coverage
    /// already accumulated there.
    pub fn schedule(
        available: &StrandedCoverage,
        threshold: u32,
        prior: Option<&CoverageProfile>,
    ) -> Self {
        let plus = available.strand(Strand::Plus).as_slice();
        let minus = available.strand(Strand::Minus).as_slice();
        let mut desired_plus = Vec::with_capacity(plus.len());
        let mut desired_minus = Vec::with_capacity(minus.len());

        for (position, (&p, &m)) in plus.iter().zip(minus).enumerate() {
            let budget = match prior {
                Some(prior) => threshold.saturating_sub(prior.get(position)),
                None => threshold,
            };
            let (want_plus, want_minus) = desired_pair(p, m, budget);
            desired_plus.push(want_plus);
            desired_minus.push(want_minus);
        }

        Self {
            desired: [desired_plus, desired_minus],
        }
    }

    pub fn desired(&self, strand: Strand, position: usize) -> u32 {
        self.desired[strand.index()][position]
    }

    pub fn span(&self, strand: Strand, positions: Range<usize>) -> &[u32] {
        &self.desired[strand.index()][positions]
    }

    pub fn len(&self) -> usize {
        self.desired[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.desired[0].is_empty()
    }
}
