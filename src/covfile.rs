use crate::coverage::CoverageProfile;
use crate::errors::Result;
use crate::writer::write_bytes_atomically;
use std::fs;
use std::io::ErrorKind;
use tracing::{info, warn};

/// Loads the prior profile at `path`. A missing or empty file means no
/// prior coverage.
pub fn read_prior_profile(path: &str, max_len: usize) -> Result<Option<CoverageProfile>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            info!(covfile = %path, "no prior coverage profile; starting from zero");
            return Ok(None);
        }
        Err(error) => return Err(error.into()),
    };

    if bytes.is_empty() {
        info!(covfile = %path, "prior coverage profile is empty; starting from zero");
        return Ok(None);
    }
    if bytes.len() > max_len {
        warn!(
            covfile = %path,
            bytes = bytes.len(),
            max_len,
            "prior coverage profile is longer than the genome bound; ignoring the tail"
        );
    }

    info!(covfile = %path, bytes = bytes.len(), "loaded prior coverage profile");
    Ok(Some(CoverageProfile::from_prior_bytes(&bytes, max_len)))
}

/// Writes `running` capped at `threshold`, one byte per position.
pub fn write_profile(path: &str, running: &CoverageProfile, threshold: u32) -> Result<()> {
    write_bytes_atomically(path, &running.to_capped_bytes(threshold))?;
    info!(covfile = %path, positions = running.len(), "wrote coverage profile");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read_prior_profile, write_profile};
    use crate::coverage::CoverageProfile;
    use std::fs;

    #[test]
    fn missing_and_empty_files_mean_no_prior() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.bin");
        assert!(
            read_prior_profile(&missing.to_string_lossy(), 10)
                .expect("missing is not an error")
                .is_none()
        );

        let empty = dir.path().join("empty.bin");
        fs::write(&empty, b"").expect("create empty");
        assert!(
            read_prior_profile(&empty.to_string_lossy(), 10)
                .expect("empty is not an error")
                .is_none()
        );
    }

    #[test]
    fn written_profile_is_capped_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cov.bin").to_string_lossy().into_owned();

        let mut running = CoverageProfile::zeroed(6);
        for _ in 0..7 {
            running.increment(1..3);
        }
        running.increment(4..5);
        write_profile(&path, &running, 5).expect("write profile");

        assert_eq!(fs::read(&path).expect("raw bytes"), vec![0, 5, 5, 0, 1, 0]);
        let reloaded = read_prior_profile(&path, 8)
            .expect("read profile")
            .expect("profile present");
        assert_eq!(reloaded.as_slice(), &[0, 5, 5, 0, 1, 0, 0, 0]);
    }
}
