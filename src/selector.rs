//! Greedy single-pass coverage selector.
//!
//! Units are offered one at a time in selection order. A unit is kept when
//! some position it covers is still below its target, and keeping it adds
//! one to the running coverage across every span of every member. Earlier
//! decisions are never revisited.

use crate::coverage::{CoverageProfile, StrandedCoverage};
use crate::interval::{Interval, SelectionUnit};
use crate::strand::StrandDemand;

/// How positional deficits across a unit are turned into a keep decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepRule {
    /// Keep when any covered position is below target.
    #[default]
    AnyDeficient,
    /// Keep when the smallest `coverage - target` across the unit is negative.
    /// Matches the earliest releases; agrees with `AnyDeficient` on every
    /// non-empty span.
    MinDeficient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorConfig {
    pub threshold: u32,
    pub keep_rule: KeepRule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Indexed by `Interval::unit_id`.
    pub keep: Vec<bool>,
    pub running: CoverageProfile,
    pub running_strand: Option<StrandedCoverage>,
    pub kept_units: usize,
}

#[derive(Debug)]
pub struct GreedySelector<'a> {
    config: SelectorConfig,
    demand: Option<&'a StrandDemand>,
    running: CoverageProfile,
    running_strand: Option<StrandedCoverage>,
    keep: Vec<bool>,
    kept_units: usize,
}

impl<'a> GreedySelector<'a> {
    /// `id_space` is the number of distinct unit ids; `prior` seeds the
    /// running coverage; `demand` switches on the strand policy.
    pub fn new(
        config: SelectorConfig,
        max_len: usize,
        id_space: usize,
        prior: Option<CoverageProfile>,
        demand: Option<&'a StrandDemand>,
    ) -> Self {
        Self {
            config,
            demand,
            running: prior.unwrap_or_else(|| CoverageProfile::zeroed(max_len)),
            running_strand: demand.map(|_| StrandedCoverage::zeroed(max_len)),
            keep: vec![false; id_space],
            kept_units: 0,
        }
    }

    /// Whether `unit` would be kept against the current running coverage.
    pub fn wants(&self, unit: &SelectionUnit) -> bool {
        match self.config.keep_rule {
            KeepRule::AnyDeficient => unit
                .members
                .iter()
                .any(|member| self.margins(member).any(|margin| margin < 0)),
            KeepRule::MinDeficient => unit
                .members
                .iter()
                .flat_map(|member| self.margins(member))
                .min()
                .is_some_and(|margin| margin < 0),
        }
    }

    /// Decides on `unit` and, when kept, applies it to every member at once.
    pub fn offer(&mut self, unit: &SelectionUnit) -> bool {
        if !self.wants(unit) {
            return false;
        }

        for member in &unit.members {
            self.keep[member.unit_id] = true;
            self.running.increment(member.positions());
            if let Some(stranded) = self.running_strand.as_mut() {
                stranded.increment(member.strand, member.positions());
            }
        }
        self.kept_units += 1;
        true
    }

    pub fn finish(self) -> Selection {
        Selection {
            keep: self.keep,
            running: self.running,
            running_strand: self.running_strand,
            kept_units: self.kept_units,
        }
    }

    /// `coverage - target` at each position of `member`'s span.
    fn margins<'s>(&'s self, member: &Interval) -> impl Iterator<Item = i64> + 's {
        let positions = member.positions();
        let (current, targets) = match (self.demand, self.running_strand.as_ref()) {
            (Some(demand), Some(stranded)) => (
                stranded.strand(member.strand).span(positions.clone()),
                Some(demand.span(member.strand, positions)),
            ),
            _ => (self.running.span(positions), None),
        };
        let threshold = self.config.threshold;

        current.iter().enumerate().map(move |(offset, &value)| {
            let target = targets.map_or(threshold, |targets| targets[offset]);
            i64::from(value) - i64::from(target)
        })
    }
}

/// Runs the selector over `units` in `order`.
pub fn select(
    units: &[SelectionUnit],
    order: &[usize],
    config: SelectorConfig,
    max_len: usize,
    id_space: usize,
    prior: Option<CoverageProfile>,
    demand: Option<&StrandDemand>,
) -> Selection {
    let mut selector = GreedySelector::new(config, max_len, id_space, prior, demand);
    for &index in order {
        selector.offer(&units[index]);
    }
    selector.finish()
}
