use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CigarSpans {
    pub reference_len: usize,
    pub query_len: usize,
    pub matches: usize,
}

impl CigarSpans {
    /// Fraction of query bases aligned as matches. Fails on an empty query,
    /// which only a malformed record can produce.
    pub fn quality(&self, line: usize) -> Result<f64> {
        if self.query_len == 0 {
            return Err(AppError::ZeroQueryLength { line });
        }
        Ok(self.matches as f64 / self.query_len as f64)
    }
}

fn consumes_reference(op: u8) -> bool {
    matches!(op, b'M' | b'D' | b'N' | b'=' | b'X')
}

fn consumes_query(op: u8) -> bool {
    matches!(op, b'M' | b'I' | b'S' | b'=' | b'X')
}

fn counts_as_match(op: u8) -> bool {
    matches!(op, b'M' | b'=')
}

fn is_known_op(op: u8) -> bool {
    matches!(op, b'M' | b'I' | b'D' | b'N' | b'S' | b'H' | b'P' | b'=' | b'X')
}

/// Sums reference, query and match lengths over every `<count><op>` token.
pub fn parse_cigar_spans(cigar: &str, line: usize) -> Result<CigarSpans> {
    let mut spans = CigarSpans::default();
    let mut run: usize = 0;
    let mut has_digits = false;

    for &byte in cigar.as_bytes() {
        if byte.is_ascii_digit() {
            run = run
                .checked_mul(10)
                .and_then(|value| value.checked_add(usize::from(byte - b'0')))
                .ok_or_else(|| AppError::malformed(line, format!("CIGAR run overflows: {cigar}")))?;
            has_digits = true;
            continue;
        }

        if !is_known_op(byte) {
            return Err(AppError::malformed(
                line,
                format!("unknown CIGAR operator '{}' in {cigar}", byte as char),
            ));
        }
        if !has_digits {
            return Err(AppError::malformed(
                line,
                format!("CIGAR operator '{}' without a count in {cigar}", byte as char),
            ));
        }

        if consumes_reference(byte) {
            spans.reference_len = accumulate(spans.reference_len, run, cigar, line)?;
        }
        if consumes_query(byte) {
            spans.query_len = accumulate(spans.query_len, run, cigar, line)?;
        }
        if counts_as_match(byte) {
            spans.matches = accumulate(spans.matches, run, cigar, line)?;
        }
        run = 0;
        has_digits = false;
    }

    if has_digits {
        return Err(AppError::malformed(
            line,
            format!("CIGAR ends with a dangling count: {cigar}"),
        ));
    }
    Ok(spans)
}

fn accumulate(total: usize, run: usize, cigar: &str, line: usize) -> Result<usize> {
    total
        .checked_add(run)
        .ok_or_else(|| AppError::malformed(line, format!("CIGAR length overflows: {cigar}")))
}
