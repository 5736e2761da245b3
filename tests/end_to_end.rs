use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const HEADER: &str = "@HD\tVN:1.6\tSO:unsorted\n@SQ\tSN:ref\tLN:100\n";

fn run_binary(dir: &Path, args: &[&str]) -> std::process::Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_covnorm"));
    command
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "warn");
    command
        .output()
        .expect("expected covnorm binary to execute")
}

fn sam_line(name: &str, flag: u16, pos: usize, cigar: &str) -> String {
    format!("{name}\t{flag}\tref\t{pos}\t60\t{cigar}\t*\t0\t0\t*\t*\n")
}

fn write_input(dir: &TempDir, name: &str, body: &str) {
    fs::write(dir.path().join(name), body).expect("expected input write");
}

fn read_output(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).expect("expected output content")
}

fn data_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.starts_with('@'))
        .filter_map(|line| line.split('\t').next())
        .map(str::to_string)
        .collect()
}

fn assert_success(output: &std::process::Output) {
    assert!(
        output.status.success(),
        "expected success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn stacked_reads_keep_best_two_and_headers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let body = format!(
        "{HEADER}{}{}{}",
        sam_line("a", 0, 0, "10M"),
        sam_line("b", 0, 0, "8M2I"),
        sam_line("c", 0, 0, "9M1I"),
    );
    write_input(&dir, "reads.sam", &body);

    let output = run_binary(
        dir.path(),
        &["-i", "reads.sam", "-c", "2", "-L", "100", "--qual-sort", "--no-logging"],
    );
    assert_success(&output);

    let filtered = read_output(&dir, "reads.covfiltered.sam");
    assert!(filtered.starts_with(HEADER));
    assert_eq!(data_names(&filtered), vec!["a", "c"]);
    assert!(!dir.path().join("coverage.txt").exists());
}

#[test]
fn saturated_covfile_blocks_read_and_stays_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_input(&dir, "reads.sam", &format!("{HEADER}{}", sam_line("r", 0, 5, "10M")));
    let mut prior = vec![0_u8; 100];
    prior[5..15].fill(50);
    fs::write(dir.path().join("cov.bin"), &prior).expect("expected covfile write");

    let output = run_binary(
        dir.path(),
        &[
            "-i",
            "reads.sam",
            "-o",
            "kept.sam",
            "-L",
            "100",
            "--covfile",
            "cov.bin",
            "--no-logging",
        ],
    );
    assert_success(&output);

    assert!(data_names(&read_output(&dir, "kept.sam")).is_empty());
    assert_eq!(fs::read(dir.path().join("cov.bin")).expect("covfile"), prior);
}

#[test]
fn covfile_is_created_and_accumulates_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_input(
        &dir,
        "first.sam",
        &format!("{}{}", sam_line("r1", 0, 0, "10M"), sam_line("r2", 0, 0, "10M")),
    );
    write_input(&dir, "second.sam", &sam_line("r3", 0, 0, "10M"));

    let first = run_binary(
        dir.path(),
        &["-i", "first.sam", "-c", "1", "-L", "20", "--covfile", "cov.bin", "--no-logging"],
    );
    assert_success(&first);
    let profile = fs::read(dir.path().join("cov.bin")).expect("covfile");
    assert_eq!(profile.len(), 20);
    assert!(profile[..10].iter().all(|depth| *depth == 1));
    assert!(profile[10..].iter().all(|depth| *depth == 0));
    assert_eq!(data_names(&read_output(&dir, "first.covfiltered.sam")).len(), 1);

    let second = run_binary(
        dir.path(),
        &["-i", "second.sam", "-c", "1", "-L", "20", "--covfile", "cov.bin", "--no-logging"],
    );
    assert_success(&second);
    assert!(data_names(&read_output(&dir, "second.covfiltered.sam")).is_empty());
}

#[test]
fn paired_mode_keeps_mates_together() {
    let dir = tempfile::tempdir().expect("tempdir");
    let body = format!(
        "{HEADER}{}{}{}{}{}{}",
        sam_line("p1", 99, 0, "10M"),
        sam_line("p2", 99, 0, "10M"),
        sam_line("p1", 147, 40, "10M"),
        sam_line("p2", 147, 60, "10M"),
        sam_line("p2", 2147, 80, "5M"),
        sam_line("u", 4, 0, "*"),
    );
    write_input(&dir, "pairs.sam", &body);

    let output = run_binary(
        dir.path(),
        &["-i", "pairs.sam", "-c", "1", "-L", "100", "--paired", "--qual-sort", "--no-logging"],
    );
    assert_success(&output);

    let filtered = read_output(&dir, "pairs.covfiltered.sam");
    assert_eq!(data_names(&filtered), vec!["p1", "p2", "p1", "p2"]);
}

#[test]
fn strand_balance_draws_from_both_strands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut body = String::from(HEADER);
    for index in 0..3 {
        body.push_str(&sam_line(&format!("plus{index}"), 0, 0, "20M"));
    }
    for index in 0..20 {
        body.push_str(&sam_line(&format!("minus{index}"), 16, 0, "20M"));
    }
    write_input(&dir, "strands.sam", &body);

    let output = run_binary(
        dir.path(),
        &[
            "-i",
            "strands.sam",
            "-c",
            "10",
            "-L",
            "100",
            "--strand-balance",
            "--qual-sort",
            "--no-logging",
        ],
    );
    assert_success(&output);

    let names = data_names(&read_output(&dir, "strands.covfiltered.sam"));
    let plus = names.iter().filter(|name| name.starts_with("plus")).count();
    let minus = names.iter().filter(|name| name.starts_with("minus")).count();
    assert_eq!((plus, minus), (3, 7));
}

#[test]
fn csv_input_uses_match_fraction_and_keeps_header_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = "read_name,read_len,a,b,c,d,start_coords,end_coords,num_matches\n\
low,100,x,x,x,x,0,50,60\n\
high,100,x,x,x,x,0,50,95\n\
tail,100,x,x,x,x,40,90,70\n";
    write_input(&dir, "reads.csv", csv);

    let output = run_binary(
        dir.path(),
        &["-i", "reads.csv", "--input-csv", "-c", "1", "-L", "100", "--qual-sort", "--no-logging"],
    );
    assert_success(&output);

    assert_eq!(
        read_output(&dir, "reads.covfiltered.csv"),
        "read_name,read_len,a,b,c,d,start_coords,end_coords,num_matches\n\
high,100,x,x,x,x,0,50,95\n\
tail,100,x,x,x,x,40,90,70\n"
    );
}

#[test]
fn seeded_random_order_is_reproducible() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut body = String::new();
    for index in 0..40 {
        body.push_str(&sam_line(&format!("r{index}"), 0, index, "30M"));
    }
    write_input(&dir, "reads.sam", &body);

    let args = |out: &'static str| {
        vec!["-i", "reads.sam", "-o", out, "-c", "3", "-L", "100", "--seed", "17", "--no-logging"]
    };
    assert_success(&run_binary(dir.path(), &args("one.sam")));
    assert_success(&run_binary(dir.path(), &args("two.sam")));

    assert_eq!(read_output(&dir, "one.sam"), read_output(&dir, "two.sam"));
}

#[test]
fn legacy_key_value_arguments_are_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_input(
        &dir,
        "legacy.sam",
        &format!("{}{}", sam_line("r1", 0, 0, "10M"), sam_line("r2", 0, 0, "10M")),
    );

    let output = run_binary(
        dir.path(),
        &[
            "input=legacy.sam",
            "output=legacy.out.sam",
            "coverage_threshold=1",
            "genome_max_len=50",
            "--qual_sort",
            "--no_logging",
        ],
    );
    assert_success(&output);
    assert_eq!(data_names(&read_output(&dir, "legacy.out.sam")), vec!["r1"]);
}

#[test]
fn gzip_output_and_stat_logs() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_input(
        &dir,
        "reads.sam",
        &format!("{HEADER}{}{}", sam_line("r1", 0, 0, "10M"), sam_line("r2", 0, 5, "10M")),
    );
    fs::create_dir(dir.path().join("logs")).expect("log dir");

    let output = run_binary(
        dir.path(),
        &["-i", "reads.sam", "-o", "out.sam.gz", "-c", "5", "-L", "100", "--log-dir", "logs"],
    );
    assert_success(&output);

    let mut text = String::new();
    GzDecoder::new(fs::File::open(dir.path().join("out.sam.gz")).expect("gz output"))
        .read_to_string(&mut text)
        .expect("decompress output");
    assert_eq!(data_names(&text), vec!["r1", "r2"]);

    let lengths = read_output(&dir, "logs/lengths_all.txt");
    assert_eq!(lengths, "10\n10\n");
    let coverage = read_output(&dir, "logs/coverage.txt");
    assert_eq!(coverage.lines().count(), 15);
    assert!(coverage.lines().all(|line| {
        let mut fields = line.split(' ');
        fields.next() == fields.next()
    }));
}

#[test]
fn malformed_record_fails_without_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_input(
        &dir,
        "bad.sam",
        &format!("{}r2\t0\tref\tnot-a-number\t60\t10M\t*\t0\t0\t*\t*\n", sam_line("r1", 0, 0, "10M")),
    );

    let output = run_binary(dir.path(), &["-i", "bad.sam", "--no-logging"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"), "unexpected stderr: {stderr}");
    assert!(!dir.path().join("bad.covfiltered.sam").exists());
}

#[test]
fn interval_past_genome_bound_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_input(&dir, "long.sam", &sam_line("r1", 0, 95, "10M"));

    let output = run_binary(dir.path(), &["-i", "long.sam", "-L", "100", "--no-logging"]);
    assert!(!output.status.success());
}

#[test]
fn strand_balance_with_csv_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_binary(
        dir.path(),
        &["-i", "reads.csv", "--input-csv", "--strand-balance", "--no-logging"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("covnorm:"));
}

#[test]
fn output_aliasing_input_is_rejected_and_input_survives() {
    let dir = tempfile::tempdir().expect("tempdir");
    let body = format!("{HEADER}{}{}", sam_line("r1", 0, 0, "10M"), sam_line("r2", 0, 0, "10M"));
    write_input(&dir, "reads.sam", &body);

    let output = run_binary(
        dir.path(),
        &["-i", "reads.sam", "-o", "./reads.sam", "-c", "1", "-L", "100", "--no-logging"],
    );
    assert!(!output.status.success());
    assert_eq!(read_output(&dir, "reads.sam"), body);
}
