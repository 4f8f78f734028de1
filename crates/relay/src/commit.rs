//! Commitment capability: getting a payload onto bitcoin via the external
//! transaction-construction script, bounded by a timeout.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::*;

/// Script expected under the configured script directory. Takes the payload
/// hex as its single argument and prints the resulting txid on stdout.
pub const COMMIT_SCRIPT: &str = "op_return_transaction.sh";

/// Env var the script reads to locate the bitcoin CLI binary.
pub const BTC_CLI_ENVVAR: &str = "BTC_CLI_PATH";

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("launching commit script: {0}")]
    Io(#[from] std::io::Error),

    #[error("commit script did not finish within {0}ms")]
    Timeout(u64),

    #[error("commit script failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("commit script produced no transaction reference")]
    EmptyReference,
}

/// Capability to commit one payload and hand back its on-chain reference.
#[async_trait]
pub trait Committer: Send + Sync {
    async fn commit(&self, payload_hex: &str) -> Result<String, CommitError>;
}

/// Committer that shells out to [`COMMIT_SCRIPT`].
pub struct ScriptCommitter {
    script_dir: PathBuf,
    cli_path: String,
    timeout: Duration,
}

impl ScriptCommitter {
    pub fn new(script_dir: PathBuf, cli_path: String, timeout: Duration) -> Self {
        Self {
            script_dir,
            cli_path,
            timeout,
        }
    }
}

#[async_trait]
impl Committer for ScriptCommitter {
    async fn commit(&self, payload_hex: &str) -> Result<String, CommitError> {
        let script = self.script_dir.join(COMMIT_SCRIPT);
        debug!(script = %script.display(), "invoking commit script");

        let run = tokio::process::Command::new(&script)
            .arg(payload_hex)
            .env(BTC_CLI_ENVVAR, &self.cli_path)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| CommitError::Timeout(self.timeout.as_millis() as u64))??;

        if !output.status.success() {
            return Err(CommitError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let reference = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if reference.is_empty() {
            return Err(CommitError::EmptyReference);
        }

        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(COMMIT_SCRIPT);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_becomes_the_reference() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "#!/bin/sh\necho txid123\n");

        let committer = ScriptCommitter::new(
            dir.path().to_path_buf(),
            "bitcoin-cli".to_owned(),
            Duration::from_secs(5),
        );
        let reference = committer.commit("deadbeef").await.unwrap();
        assert_eq!(reference, "txid123");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_sees_payload_and_cli_path() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "#!/bin/sh\necho \"$1:$BTC_CLI_PATH\"\n");

        let committer = ScriptCommitter::new(
            dir.path().to_path_buf(),
            "/usr/local/bin/bitcoin-cli".to_owned(),
            Duration::from_secs(5),
        );
        let reference = committer.commit("cafe").await.unwrap();
        assert_eq!(reference, "cafe:/usr/local/bin/bitcoin-cli");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_a_failure_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "#!/bin/sh\necho boom >&2\nexit 3\n");

        let committer = ScriptCommitter::new(
            dir.path().to_path_buf(),
            "bitcoin-cli".to_owned(),
            Duration::from_secs(5),
        );
        let err = committer.commit("cafe").await.unwrap_err();
        match err {
            CommitError::Failed { stderr, .. } => assert!(stderr.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_stdout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "#!/bin/sh\nexit 0\n");

        let committer = ScriptCommitter::new(
            dir.path().to_path_buf(),
            "bitcoin-cli".to_owned(),
            Duration::from_secs(5),
        );
        let err = committer.commit("cafe").await.unwrap_err();
        assert!(matches!(err, CommitError::EmptyReference));
    }

    #[tokio::test]
    async fn missing_script_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let committer = ScriptCommitter::new(
            dir.path().to_path_buf(),
            "bitcoin-cli".to_owned(),
            Duration::from_secs(5),
        );
        let err = committer.commit("cafe").await.unwrap_err();
        assert!(matches!(err, CommitError::Io(_)));
    }
}
