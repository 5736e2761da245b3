use crate::errors::{AppError, Result};
use crate::ordering::OrderPolicy;
use crate::records::InputFormat;
use crate::report::DEFAULT_EDGE_MARGIN;
use crate::selector::KeepRule;
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "covnorm",
    version,
    about = "Downsample aligned reads toward uniform per-base coverage"
)]
struct CliArgs {
    /// SAM file (or mapping CSV with --input-csv) with the alignments of all reads
    #[arg(short = 'i', long = "input")]
    input: Option<String>,
    /// File to write downsampled reads to; `-` for stdout
    #[arg(short = 'o', long = "output")]
    output: Option<String>,
    /// Coverage to keep at each base when the available coverage allows it
    #[arg(short = 'c', long = "coverage-threshold", default_value = "50")]
    coverage_threshold: String,
    /// Upper bound on the genome length
    #[arg(short = 'L', long = "genome-max-len", default_value = "31000")]
    genome_max_len: String,
    /// Per-position coverage carried over from other samples; rewritten on exit
    #[arg(long = "covfile")]
    covfile: Option<String>,
    /// Prioritize reads with higher alignment accuracy
    #[arg(long = "qual-sort", action = ArgAction::SetTrue)]
    qual_sort: bool,
    /// Seed for the random read order
    #[arg(long = "seed")]
    seed: Option<String>,
    /// Expect a comma-separated mapping table instead of SAM
    #[arg(long = "input-csv", action = ArgAction::SetTrue)]
    input_csv: bool,
    /// Balance kept coverage between the two strands
    #[arg(long = "strand-balance", action = ArgAction::SetTrue)]
    strand_balance: bool,
    /// Keep or drop all records of a read name together
    #[arg(long = "paired", action = ArgAction::SetTrue)]
    paired: bool,
    /// Keep rule: `any` (some covered base is short) or `min` (weakest base is short)
    #[arg(long = "keep-rule", default_value = "any")]
    keep_rule: String,
    /// Bases at each end excluded from minimum-coverage and drop checks
    #[arg(long = "edge-margin", default_value = "50")]
    edge_margin: String,
    /// Directory for coverage and read length logs
    #[arg(long = "log-dir", default_value = ".")]
    log_dir: String,
    /// Do not write coverage and read length logs
    #[arg(long = "no-logging", action = ArgAction::SetTrue)]
    no_logging: bool,
    /// Show a progress spinner on stderr
    #[arg(long = "progress", action = ArgAction::SetTrue)]
    progress: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeArgs {
    pub input: String,
    pub output: Option<String>,
    pub threshold: u32,
    pub max_len: usize,
    pub covfile: Option<String>,
    pub qual_sort: bool,
    pub seed: Option<u64>,
    pub input_csv: bool,
    pub strand_balance: bool,
    pub paired: bool,
    pub keep_rule: KeepRule,
    pub edge_margin: usize,
    pub log_dir: String,
    pub logging: bool,
    pub progress: bool,
}

impl Default for NormalizeArgs {
    fn default() -> Self {
        Self {
            input: String::new(),
            output: None,
            threshold: 50,
            max_len: 31_000,
            covfile: None,
            qual_sort: false,
            seed: None,
            input_csv: false,
            strand_balance: false,
            paired: false,
            keep_rule: KeepRule::AnyDeficient,
            edge_margin: DEFAULT_EDGE_MARGIN,
            log_dir: ".".to_string(),
            logging: true,
            progress: false,
        }
    }
}

impl NormalizeArgs {
    pub fn input_format(&self) -> InputFormat {
        if self.input_csv {
            InputFormat::Csv
        } else {
            InputFormat::Sam
        }
    }

    pub fn order_policy(&self) -> OrderPolicy {
        if self.qual_sort {
            OrderPolicy::QualityDescending
        } else {
            OrderPolicy::Random { seed: self.seed }
        }
    }

    /// Explicit output, or `<input stem>.covfiltered.<sam|csv>` next to the input.
    pub fn output_path(&self) -> String {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let suffix = self.input_format().extension();
        let input = self.input.strip_suffix(".gz").unwrap_or(&self.input);
        let stem = input.strip_suffix(suffix).unwrap_or(input);
        format!("{stem}.covfiltered{suffix}")
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(AppError::MissingRequired {
                field: "--input".to_string(),
            });
        }
        if self.threshold == 0 {
            return Err(AppError::InvalidValue {
                flag: "--coverage-threshold".to_string(),
                value: self.threshold.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_len == 0 {
            return Err(AppError::InvalidValue {
                flag: "--genome-max-len".to_string(),
                value: self.max_len.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.strand_balance && self.input_csv {
            return Err(AppError::InvalidValue {
                flag: "--strand-balance".to_string(),
                value: "true".to_string(),
                reason: "CSV input carries no strand; strand balancing needs SAM input".to_string(),
            });
        }
        if self.covfile.is_some() && self.threshold > u32::from(u8::MAX) {
            return Err(AppError::InvalidValue {
                flag: "--coverage-threshold".to_string(),
                value: self.threshold.to_string(),
                reason: "coverage files store one byte per base; use a threshold of at most 255"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Parses the process arguments. Help and version requests print and exit.
pub fn parse_from_env() -> Result<NormalizeArgs> {
    let tokens = normalize_legacy_tokens(with_program_name(std::env::args()));
    match CliArgs::try_parse_from(tokens) {
        Ok(cli) => into_args(cli),
        Err(error) if !error.use_stderr() => error.exit(),
        Err(error) => Err(map_clap_error(error)),
    }
}

pub fn parse_args<I, S>(args: I) -> Result<NormalizeArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tokens = normalize_legacy_tokens(with_program_name(args));
    let cli = CliArgs::try_parse_from(tokens).map_err(map_clap_error)?;
    into_args(cli)
}

fn with_program_name<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tokens: Vec<String> = args.into_iter().map(Into::into).collect();
    if tokens.is_empty() {
        tokens.push("covnorm".to_string());
    }
    tokens
}

fn into_args(cli: CliArgs) -> Result<NormalizeArgs> {
    let parsed = NormalizeArgs {
        input: cli.input.unwrap_or_default(),
        output: cli.output,
        threshold: parse_u32("--coverage-threshold", &cli.coverage_threshold)?,
        max_len: parse_usize("--genome-max-len", &cli.genome_max_len)?,
        covfile: cli.covfile.filter(|path| !path.is_empty()),
        qual_sort: cli.qual_sort,
        seed: cli
            .seed
            .as_deref()
            .map(|value| parse_u64("--seed", value))
            .transpose()?,
        input_csv: cli.input_csv,
        strand_balance: cli.strand_balance,
        paired: cli.paired,
        keep_rule: parse_keep_rule(&cli.keep_rule)?,
        edge_margin: parse_usize("--edge-margin", &cli.edge_margin)?,
        log_dir: cli.log_dir,
        logging: !cli.no_logging,
        progress: cli.progress,
    };

    parsed.validate()?;
    Ok(parsed)
}

/// Rewrites the legacy `key=value` and underscore flag spellings into long
/// options.
fn normalize_legacy_tokens(tokens: Vec<String>) -> Vec<String> {
    const KEYS: [(&str, &str); 5] = [
        ("input", "--input"),
        ("output", "--output"),
        ("covfile", "--covfile"),
        ("coverage_threshold", "--coverage-threshold"),
        ("genome_max_len", "--genome-max-len"),
    ];

    tokens
        .into_iter()
        .enumerate()
        .map(|(index, token)| {
            if index == 0 {
                return token;
            }
            match token.as_str() {
                "--qual_sort" => return "--qual-sort".to_string(),
                "--input_csv" => return "--input-csv".to_string(),
                "--no_logging" => return "--no-logging".to_string(),
                _ => {}
            }
            if !token.starts_with('-')
                && let Some((key, value)) = token.split_once('=')
                && let Some((_, flag)) = KEYS
                    .iter()
                    .find(|(legacy, _)| legacy.eq_ignore_ascii_case(key))
            {
                return format!("{flag}={value}");
            }
            token
        })
        .collect()
}

fn map_clap_error(error: clap::Error) -> AppError {
    let kind = error.kind();
    let rendered = error.to_string();
    match kind {
        ErrorKind::UnknownArgument => AppError::UnsupportedArgument {
            arg: first_quoted_token(&rendered).unwrap_or(rendered),
        },
        ErrorKind::TooFewValues | ErrorKind::WrongNumberOfValues => AppError::MissingValue {
            flag: first_quoted_token(&rendered).unwrap_or_else(|| "argument".to_string()),
        },
        _ => AppError::ParseError {
            message: clap_error_message(&rendered),
        },
    }
}

fn first_quoted_token(message: &str) -> Option<String> {
    let start = message.find('\'')?;
    let end = message[start + 1..].find('\'')?;
    Some(message[start + 1..start + 1 + end].to_string())
}

fn clap_error_message(message: &str) -> String {
    message
        .lines()
        .find_map(|line| line.strip_prefix("error: "))
        .or_else(|| message.lines().next())
        .unwrap_or("failed to parse arguments")
        .to_string()
}

fn parse_keep_rule(value: &str) -> Result<KeepRule> {
    match value {
        "any" => Ok(KeepRule::AnyDeficient),
        "min" => Ok(KeepRule::MinDeficient),
        other => Err(AppError::InvalidValue {
            flag: "--keep-rule".to_string(),
            value: other.to_string(),
            reason: "supported keep rules are \"any\" (default) and \"min\"".to_string(),
        }),
    }
}

fn parse_u32(flag: &str, value: &str) -> Result<u32> {
    value.parse::<u32>().map_err(|_| AppError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: "must be a non-negative integer".to_string(),
    })
}

fn parse_usize(flag: &str, value: &str) -> Result<usize> {
    value.parse::<usize>().map_err(|_| AppError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: "must be a non-negative integer".to_string(),
    })
}

fn parse_u64(flag: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| AppError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: "must be a non-negative integer".to_string(),
    })
}
