// =============================================================================
// Run Context — stable identity for one supervisor run
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub config_path: PathBuf,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
}

/// SHA-256 hex digest of the config file's bytes. Used both to detect a
/// config change across restarts and as the short suffix of a generated
/// `run_id`.
pub fn compute_config_hash(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("failed to read config at {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn create_run_context(
    config_path: impl AsRef<Path>,
    run_id_prefix: &str,
    run_id: Option<String>,
) -> Result<RunContext> {
    let config_path = config_path.as_ref().to_path_buf();
    let config_hash = compute_config_hash(&config_path)?;
    let started_at = Utc::now();
    let run_id = run_id.unwrap_or_else(|| {
        let stamp = started_at.format("%Y%m%dT%H%M%SZ");
        format!("{run_id_prefix}-{stamp}-{}", &config_hash[..8])
    });
    Ok(RunContext {
        run_id,
        config_path,
        config_hash,
        started_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn compute_config_hash_is_stable_for_identical_content() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "account_size = 100000").unwrap();
        let a = compute_config_hash(file.path()).unwrap();
        let b = compute_config_hash(file.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn create_run_context_generates_id_with_hash_suffix_when_absent() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "account_size = 100000").unwrap();
        let ctx = create_run_context(file.path(), "ftmo", None).unwrap();
        assert!(ctx.run_id.starts_with("ftmo-"));
        assert!(ctx.run_id.ends_with(&ctx.config_hash[..8]));
    }

    #[test]
    fn create_run_context_honours_an_explicit_run_id() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "account_size = 100000").unwrap();
        let ctx = create_run_context(file.path(), "ftmo", Some("custom-id".into())).unwrap();
        assert_eq!(ctx.run_id, "custom-id");
    }
}
