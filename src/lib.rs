pub mod cigar;
pub mod cli;
pub mod covfile;
pub mod coverage;
pub mod errors;
pub mod interval;
pub mod ordering;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod selector;
pub mod strand;
pub mod writer;

use cli::NormalizeArgs;
use errors::Result;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

/// Installs the global subscriber. Logs go to stderr so `-o -` output stays clean.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

pub fn run_from_args(args: NormalizeArgs) -> Result<()> {
    pipeline::run(&args)
}

#[cfg(test)]
mod tests {
    use crate::cli::parse_args;
    use std::fs;

    #[test]
    fn wiring_parses_and_runs_pipeline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("reads.sam");
        fs::write(
            &input,
            "@HD\tVN:1.6\nr1\t0\tref\t0\t60\t10M\t*\t0\t0\t*\t*\nr2\t0\tref\t0\t60\t10M\t*\t0\t0\t*\t*\n",
        )
        .expect("write input");
        let input = input.to_string_lossy().into_owned();
        let log_dir = dir.path().to_string_lossy().into_owned();

        let args = parse_args([
            "covnorm",
            "-i",
            &input,
            "-c",
            "1",
            "-L",
            "100",
            "--qual-sort",
            "--log-dir",
            &log_dir,
        ])
        .expect("expected valid args");
        assert!(crate::run_from_args(args).is_ok());

        let output = fs::read_to_string(dir.path().join("reads.covfiltered.sam"))
            .expect("filtered output");
        assert_eq!(output, "@HD\tVN:1.6\nr1\t0\tref\t0\t60\t10M\t*\t0\t0\t*\t*\n");
        assert!(dir.path().join("coverage.txt").exists());
        assert!(dir.path().join("lengths_sample.txt").exists());
    }
}
