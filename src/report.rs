//! Before/after statistics and advisory coverage findings.
//!
//! Nothing here fails a run: shortfalls are expected from a greedy pass and
//! are surfaced as warnings only.

use crate::coverage::{CoverageProfile, StrandedCoverage};
use crate::errors::Result;
use crate::interval::{SelectionUnit, Strand};
use crate::strand::StrandDemand;
use crate::writer::with_text_output_writer;
use std::fmt;
use std::io::Write as _;
use std::ops::Range;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_EDGE_MARGIN: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct StrandViews<'a> {
    pub baseline: &'a StrandedCoverage,
    pub running: &'a StrandedCoverage,
    pub demand: &'a StrandDemand,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub baseline: &'a CoverageProfile,
    pub running: &'a CoverageProfile,
    pub strand: Option<StrandViews<'a>>,
    pub keep: &'a [bool],
    pub units: &'a [SelectionUnit],
    pub threshold: u32,
    pub edge_margin: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizationSummary {
    pub total_units: usize,
    pub kept_units: usize,
    pub total_reads: usize,
    pub kept_reads: usize,
    pub total_bases: u64,
    pub kept_bases: u64,
    pub mean_quality: Option<f64>,
    pub kept_mean_quality: Option<f64>,
    /// Smallest nonzero baseline coverage outside the edge margins.
    pub baseline_min_coverage: Option<u32>,
    /// Running coverage minimum over the same positions.
    pub running_min_coverage: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    BelowThreshold {
        position: usize,
        baseline: u32,
        running: u32,
    },
    UnevenNearEnd {
        position: usize,
        baseline: u32,
        running: u32,
    },
    StrandShortfall {
        position: usize,
        strand: Strand,
        desired: u32,
        running: u32,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowThreshold {
                position,
                baseline,
                running,
            } => write!(
                f,
                "coverage dropped below threshold at position {position}; old coverage={baseline}, new coverage={running}"
            ),
            Self::UnevenNearEnd {
                position,
                baseline,
                running,
            } => write!(
                f,
                "uneven coverage near ends at position {position}; old coverage={baseline}, new coverage={running}"
            ),
            Self::StrandShortfall {
                position,
                strand,
                desired,
                running,
            } => write!(
                f,
                "{strand:?} strand short of its target at position {position}; desired={desired}, kept={running}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diagnostics {
    pub summary: NormalizationSummary,
    pub findings: Vec<Finding>,
}

impl Diagnostics {
    pub fn log(&self) {
        let summary = &self.summary;
        info!(
            units = summary.total_units,
            kept_units = summary.kept_units,
            reads = summary.total_reads,
            kept_reads = summary.kept_reads,
            "downsampled read count"
        );
        info!(
            overall = ?summary.mean_quality,
            downsampled = ?summary.kept_mean_quality,
            "average alignment accuracy"
        );
        info!(
            total = summary.total_bases,
            downsampled = summary.kept_bases,
            "bases covered"
        );
        info!(
            old = ?summary.baseline_min_coverage,
            downsampled = ?summary.running_min_coverage,
            "minimum coverage away from the ends"
        );
        for finding in &self.findings {
            warn!("{finding}");
        }
        if !self.findings.is_empty() {
            warn!(findings = self.findings.len(), "coverage diagnostics reported findings");
        }
    }
}

pub fn diagnose(inputs: &ReportInputs<'_>) -> Diagnostics {
    Diagnostics {
        summary: summarize(inputs),
        findings: collect_findings(inputs),
    }
}

fn summarize(inputs: &ReportInputs<'_>) -> NormalizationSummary {
    let mut summary = NormalizationSummary {
        total_units: inputs.units.len(),
        ..NormalizationSummary::default()
    };
    let mut quality_sum = 0.0;
    let mut kept_quality_sum = 0.0;

    for unit in inputs.units {
        let mut unit_kept = false;
        for member in &unit.members {
            let bases = member.span_len() as u64;
            summary.total_reads += 1;
            summary.total_bases += bases;
            quality_sum += member.quality;
            if inputs.keep.get(member.unit_id).copied().unwrap_or(false) {
                unit_kept = true;
                summary.kept_reads += 1;
                summary.kept_bases += bases;
                kept_quality_sum += member.quality;
            }
        }
        if unit_kept {
            summary.kept_units += 1;
        }
    }

    summary.mean_quality = mean(quality_sum, summary.total_reads);
    summary.kept_mean_quality = mean(kept_quality_sum, summary.kept_reads);

    for position in interior(inputs.baseline.len(), inputs.edge_margin) {
        let baseline = inputs.baseline.get(position);
        if baseline == 0 {
            continue;
        }
        let running = inputs.running.get(position);
        summary.baseline_min_coverage = Some(
            summary
                .baseline_min_coverage
                .map_or(baseline, |current| current.min(baseline)),
        );
        summary.running_min_coverage = Some(
            summary
                .running_min_coverage
                .map_or(running, |current| current.min(running)),
        );
    }

    summary
}

fn collect_findings(inputs: &ReportInputs<'_>) -> Vec<Finding> {
    let len = inputs.baseline.len();
    let mut findings = Vec::new();

    for position in interior(len, inputs.edge_margin) {
        let baseline = inputs.baseline.get(position);
        let running = inputs.running.get(position);
        if baseline >= inputs.threshold && running < inputs.threshold {
            findings.push(Finding::BelowThreshold {
                position,
                baseline,
                running,
            });
        }
    }

    for position in edges(len, inputs.edge_margin) {
        let baseline = inputs.baseline.get(position);
        let running = inputs.running.get(position);
        if baseline != running {
            findings.push(Finding::UnevenNearEnd {
                position,
                baseline,
                running,
            });
        }
    }

    if let Some(views) = inputs.strand {
        for strand in [Strand::Plus, Strand::Minus] {
            let kept = views.running.strand(strand);
            for position in 0..views.demand.len() {
                let desired = views.demand.desired(strand, position);
                let running = kept.get(position);
                if running < desired {
                    findings.push(Finding::StrandShortfall {
                        position,
                        strand,
                        desired,
                        running,
                    });
                }
            }
            info!(
                strand = ?strand,
                available_bases = total_depth(views.baseline.strand(strand)),
                kept_bases = total_depth(kept),
                "strand coverage"
            );
        }
    }

    findings
}

fn total_depth(profile: &CoverageProfile) -> u64 {
    profile.as_slice().iter().map(|depth| u64::from(*depth)).sum()
}

fn mean(sum: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}

fn interior(len: usize, margin: usize) -> Range<usize> {
    margin.min(len)..len.saturating_sub(margin).max(margin.min(len))
}

fn edges(len: usize, margin: usize) -> impl Iterator<Item = usize> {
    let head_end = margin.min(len);
    let tail_start = len.saturating_sub(margin).max(head_end);
    (0..head_end).chain(tail_start..len)
}

/// Writes the plain-text stat logs into `dir`: per-position old/new
/// coverage where any reads landed, and query lengths of all and kept reads.
pub fn write_stat_logs(
    dir: &Path,
    baseline: &CoverageProfile,
    running: &CoverageProfile,
    units: &[SelectionUnit],
    keep: &[bool],
) -> Result<()> {
    let coverage_path = dir.join("coverage.txt").to_string_lossy().into_owned();
    with_text_output_writer(&coverage_path, |out| {
        for (old, new) in baseline.as_slice().iter().zip(running.as_slice()) {
            if *old > 0 {
                writeln!(out, "{old} {new}")?;
            }
        }
        Ok(())
    })?;

    let all_path = dir.join("lengths_all.txt").to_string_lossy().into_owned();
    with_text_output_writer(&all_path, |out| {
        for member in units.iter().flat_map(|unit| unit.members.iter()) {
            writeln!(out, "{}", member.length)?;
        }
        Ok(())
    })?;

    let sample_path = dir.join("lengths_sample.txt").to_string_lossy().into_owned();
    with_text_output_writer(&sample_path, |out| {
        for member in units.iter().flat_map(|unit| unit.members.iter()) {
            if keep.get(member.unit_id).copied().unwrap_or(false) {
                writeln!(out, "{}", member.length)?;
            }
        }
        Ok(())
    })?;

    info!(dir = %dir.display(), "wrote coverage and read length logs");
    Ok(())
}
