use crate::cli::NormalizeArgs;
use crate::coverage::{CoverageProfile, StrandedCoverage};
use crate::covfile::{read_prior_profile, write_profile};
use crate::errors::{AppError, Result};
use crate::ordering::{OrderPolicy, selection_order};
use crate::records::{InputFormat, LoadOptions, RecordSet, load_records, open_input};
use crate::report::{Diagnostics, ReportInputs, StrandViews, diagnose, write_stat_logs};
use crate::selector::{KeepRule, Selection, SelectorConfig, select};
use crate::strand::StrandDemand;
use crate::writer::{is_same_file, with_text_output_writer, write_filtered_records};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub threshold: u32,
    pub max_len: usize,
    pub order: OrderPolicy,
    pub strand_balance: bool,
    pub keep_rule: KeepRule,
    pub edge_margin: usize,
}

impl EngineConfig {
    pub fn from_args(args: &NormalizeArgs) -> Self {
        Self {
            threshold: args.threshold,
            max_len: args.max_len,
            order: args.order_policy(),
            strand_balance: args.strand_balance,
            keep_rule: args.keep_rule,
            edge_margin: args.edge_margin,
        }
    }

    fn selector(&self) -> SelectorConfig {
        SelectorConfig {
            threshold: self.threshold,
            keep_rule: self.keep_rule,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelinePlan {
    pub input: String,
    pub output: String,
    pub format: InputFormat,
    pub load: LoadOptions,
    pub engine: EngineConfig,
    pub covfile: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Result of one selection pass over a record set.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub baseline: CoverageProfile,
    pub baseline_strand: Option<StrandedCoverage>,
    pub demand: Option<StrandDemand>,
    /// Keep flags cover every data line, passthrough lines included.
    pub selection: Selection,
}

impl Normalization {
    pub fn diagnostics(&self, records: &RecordSet, config: &EngineConfig) -> Diagnostics {
        let strand = match (
            self.baseline_strand.as_ref(),
            self.selection.running_strand.as_ref(),
            self.demand.as_ref(),
        ) {
            (Some(baseline), Some(running), Some(demand)) => Some(StrandViews {
                baseline,
                running,
                demand,
            }),
            _ => None,
        };

        diagnose(&ReportInputs {
            baseline: &self.baseline,
            running: &self.selection.running,
            strand,
            keep: &self.selection.keep,
            units: &records.units,
            threshold: config.threshold,
            edge_margin: config.edge_margin,
        })
    }
}

pub fn build_plan(args: &NormalizeArgs) -> Result<PipelinePlan> {
    let output = args.output_path();
    if is_same_file(&args.input, &output) {
        return Err(AppError::InvalidValue {
            flag: "--output".to_string(),
            value: output,
            reason: "output must differ from the input file".to_string(),
        });
    }

    let format = args.input_format();
    Ok(PipelinePlan {
        input: args.input.clone(),
        output,
        format,
        load: LoadOptions {
            format,
            max_len: args.max_len,
            paired: args.paired,
        },
        engine: EngineConfig::from_args(args),
        covfile: args.covfile.clone(),
        log_dir: args.logging.then(|| PathBuf::from(&args.log_dir)),
    })
}

/// Builds the baseline, schedules strand demand when enabled, orders the
/// units and runs the greedy selector.
pub fn normalize(
    records: &RecordSet,
    config: &EngineConfig,
    prior: Option<CoverageProfile>,
) -> Normalization {
    let baseline = CoverageProfile::from_intervals(records.intervals(), config.max_len);
    let baseline_strand = config
        .strand_balance
        .then(|| StrandedCoverage::from_intervals(records.intervals(), config.max_len));
    let demand = baseline_strand
        .as_ref()
        .map(|available| StrandDemand::schedule(available, config.threshold, prior.as_ref()));

    let order = selection_order(&records.units, config.order);
    debug!(units = order.len(), order = ?config.order, "ordered selection units");

    let mut selection = select(
        &records.units,
        &order,
        config.selector(),
        config.max_len,
        records.data_lines,
        prior,
        demand.as_ref(),
    );
    for &unit_id in &records.passthrough {
        selection.keep[unit_id] = true;
    }

    Normalization {
        baseline,
        baseline_strand,
        demand,
        selection,
    }
}

pub fn run(args: &NormalizeArgs) -> Result<()> {
    let started = Instant::now();
    info!(
        input = %args.input,
        threshold = args.threshold,
        max_len = args.max_len,
        paired = args.paired,
        strand_balance = args.strand_balance,
        qual_sort = args.qual_sort,
        "starting normalization run"
    );
    let plan = build_plan(args)?;
    let mut progress = PipelineProgress::new(args.progress, &plan.output);

    progress.on_stage("loading records");
    let records = load_records(open_input(&plan.input)?, &plan.load)?;
    info!(
        data_lines = records.data_lines,
        reads = records.read_count(),
        units = records.units.len(),
        passthrough = records.passthrough.len(),
        excluded = records.excluded,
        "loaded records"
    );

    let prior = match &plan.covfile {
        Some(covfile) => read_prior_profile(covfile, plan.engine.max_len)?,
        None => None,
    };

    progress.on_stage("selecting reads");
    let outcome = normalize(&records, &plan.engine, prior);
    outcome.diagnostics(&records, &plan.engine).log();

    progress.on_stage("writing output");
    let mut written = 0usize;
    with_text_output_writer(&plan.output, |out| {
        written = write_filtered_records(
            open_input(&plan.input)?,
            plan.format,
            &outcome.selection.keep,
            out,
        )?;
        Ok(())
    })?;

    if let Some(covfile) = &plan.covfile {
        write_profile(covfile, &outcome.selection.running, plan.engine.threshold)?;
    }
    if let Some(dir) = &plan.log_dir {
        fs::create_dir_all(dir)?;
        write_stat_logs(
            dir,
            &outcome.baseline,
            &outcome.selection.running,
            &records.units,
            &outcome.selection.keep,
        )?;
    }

    progress.finish(written, records.data_lines);
    info!(
        output = %plan.output,
        written,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "completed normalization run"
    );
    Ok(())
}

#[derive(Debug)]
struct PipelineProgress {
    progress_bar: Option<ProgressBar>,
    finished: bool,
}

impl PipelineProgress {
    fn new(enabled: bool, output: &str) -> Self {
        let progress_bar = if enabled {
            let bar = ProgressBar::new_spinner();
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(4));
            let style = ProgressStyle::with_template("{spinner:.green} {elapsed_precise} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(200));
            bar.set_message(format!("starting output={}", display_name(output)));
            Some(bar)
        } else {
            None
        };

        Self {
            progress_bar,
            finished: false,
        }
    }

    fn on_stage(&mut self, stage: &str) {
        if let Some(bar) = &self.progress_bar {
            bar.set_message(stage.to_string());
        }
    }

    fn finish(&mut self, written: usize, data_lines: usize) {
        if let Some(bar) = &self.progress_bar {
            bar.finish_with_message(format!("done kept={written} of {data_lines} records"));
        }
        self.finished = true;
    }
}

impl Drop for PipelineProgress {
    fn drop(&mut self) {
        if !self.finished
            && let Some(bar) = &self.progress_bar
        {
            bar.finish_and_clear();
        }
    }
}

fn display_name(output: &str) -> String {
    if output == "-" {
        return "stdout".to_string();
    }
    Path::new(output)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.to_string())
}
