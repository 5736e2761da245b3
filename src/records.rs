use crate::cigar::parse_cigar_spans;
use crate::errors::{AppError, Result};
use crate::interval::{
    FLAG_SECONDARY, FLAG_SUPPLEMENTARY, FLAG_UNMAPPED, Interval, SelectionUnit, Strand,
};
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

const CSV_READ_NAME: usize = 0;
const CSV_READ_LEN: usize = 1;
const CSV_START: usize = 6;
const CSV_END: usize = 7;
const CSV_MATCHES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    #[default]
    Sam,
    /// Comma-separated mapping table with a header row and precomputed
    /// start, end and match columns.
    Csv,
}

impl InputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Sam => ".sam",
            Self::Csv => ".csv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub format: InputFormat,
    pub max_len: usize,
    pub paired: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    pub units: Vec<SelectionUnit>,
    /// Number of data lines, i.e. the unit id space.
    pub data_lines: usize,
    /// Unit ids of data lines written regardless of selection.
    pub passthrough: Vec<usize>,
    /// Data lines dropped before selection.
    pub excluded: usize,
}

impl RecordSet {
    pub fn intervals(&self) -> impl Iterator<Item = &Interval> {
        self.units.iter().flat_map(|unit| unit.members.iter())
    }

    pub fn read_count(&self) -> usize {
        self.units.iter().map(|unit| unit.members.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LineKind {
    Candidate { key: String, interval: Interval },
    Passthrough,
    Excluded,
}

/// Opens `path` for line reading, decompressing `.gz` input.
pub fn open_input(path: &str) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.ends_with(".gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Header and blank lines never carry a unit id.
pub fn is_header_line(format: InputFormat, line_index: usize, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    match format {
        InputFormat::Sam => line.starts_with('@'),
        InputFormat::Csv => line_index == 0,
    }
}

/// Every non-header line takes the next unit id, candidate or not, so the
/// writer can replay the input by line order alone.
pub fn load_records<R: BufRead>(reader: R, options: &LoadOptions) -> Result<RecordSet> {
    let mut set = RecordSet::default();
    let mut pair_index: HashMap<String, usize> = HashMap::new();

    for (line_index, line) in reader.lines().enumerate() {
        let line = line?;
        if is_header_line(options.format, line_index, &line) {
            continue;
        }

        let unit_id = set.data_lines;
        set.data_lines += 1;
        let line_number = line_index + 1;
        let kind = match options.format {
            InputFormat::Sam => classify_sam_line(&line, line_number, unit_id, options)?,
            InputFormat::Csv => classify_csv_line(&line, line_number, unit_id, options)?,
        };

        match kind {
            LineKind::Passthrough => set.passthrough.push(unit_id),
            LineKind::Excluded => set.excluded += 1,
            LineKind::Candidate { key, interval } => {
                if !options.paired {
                    set.units.push(SelectionUnit::single(interval));
                    continue;
                }
                match pair_index.get(&key) {
                    Some(&index) => set.units[index].push(interval),
                    None => {
                        pair_index.insert(key, set.units.len());
                        set.units.push(SelectionUnit::single(interval));
                    }
                }
            }
        }
    }

    Ok(set)
}

fn classify_sam_line(
    line: &str,
    line_number: usize,
    unit_id: usize,
    options: &LoadOptions,
) -> Result<LineKind> {
    let fields = line.split('\t').collect::<Vec<_>>();
    if fields.len() < 6 {
        return Err(AppError::malformed(
            line_number,
            format!("expected at least 6 tab-separated columns, found {}", fields.len()),
        ));
    }

    let flag = parse_field::<u16>(fields[1], "FLAG", line_number)?;
    let cigar = fields[5];
    let unmapped = flag & FLAG_UNMAPPED != 0 || cigar == "*";
    if options.paired {
        if unmapped || flag & (FLAG_SECONDARY | FLAG_SUPPLEMENTARY) != 0 {
            return Ok(LineKind::Excluded);
        }
    } else if unmapped {
        return Ok(LineKind::Passthrough);
    }

    let start = parse_field::<usize>(fields[3], "POS", line_number)?;
    let spans = parse_cigar_spans(cigar, line_number)?;
    let quality = spans.quality(line_number)?;
    let end = start.checked_add(spans.reference_len).ok_or_else(|| {
        AppError::malformed(
            line_number,
            format!("alignment end overflows: POS {start}, CIGAR {cigar}"),
        )
    })?;
    let interval = Interval {
        unit_id,
        start,
        end,
        strand: Strand::from_flag(flag),
        length: spans.query_len,
        quality,
    };
    check_span(&interval, line_number, options.max_len)?;

    Ok(LineKind::Candidate {
        key: fields[0].to_string(),
        interval,
    })
}

fn classify_csv_line(
    line: &str,
    line_number: usize,
    unit_id: usize,
    options: &LoadOptions,
) -> Result<LineKind> {
    let fields = line.split(',').collect::<Vec<_>>();
    if fields.len() <= CSV_MATCHES {
        return Err(AppError::malformed(
            line_number,
            format!(
                "expected at least {} comma-separated columns, found {}",
                CSV_MATCHES + 1,
                fields.len()
            ),
        ));
    }

    let length = parse_field::<usize>(fields[CSV_READ_LEN], "read_len", line_number)?;
    let start = parse_field::<usize>(fields[CSV_START], "start_coords", line_number)?;
    let end = parse_field::<usize>(fields[CSV_END], "end_coords", line_number)?;
    let matches = parse_field::<usize>(fields[CSV_MATCHES], "num_matches", line_number)?;
    if length == 0 {
        return Err(AppError::ZeroQueryLength { line: line_number });
    }
    if matches > length {
        return Err(AppError::malformed(
            line_number,
            format!("num_matches {matches} exceeds read_len {length}"),
        ));
    }

    let interval = Interval {
        unit_id,
        start,
        end,
        strand: Strand::Plus,
        length,
        quality: matches as f64 / length as f64,
    };
    check_span(&interval, line_number, options.max_len)?;

    Ok(LineKind::Candidate {
        key: fields[CSV_READ_NAME].to_string(),
        interval,
    })
}

fn check_span(interval: &Interval, line_number: usize, max_len: usize) -> Result<()> {
    if interval.end <= interval.start {
        return Err(AppError::malformed(
            line_number,
            format!(
                "alignment covers no reference bases ([{}, {}))",
                interval.start, interval.end
            ),
        ));
    }
    if interval.end > max_len {
        return Err(AppError::IntervalOutOfRange {
            line: line_number,
            start: interval.start,
            end: interval.end,
            max_len,
        });
    }
    Ok(())
}

fn parse_field<T: std::str::FromStr>(raw: &str, column: &str, line_number: usize) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        AppError::malformed(line_number, format!("invalid {column} value: {raw:?}"))
    })
}
