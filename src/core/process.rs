use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Run a CLI with arguments and a timeout, returning trimmed stdout.
pub async fn run_command(cmd: &str, args: &[String], timeout: Duration) -> Result<String> {
    debug!(command = cmd, args = ?args, "Running external command");
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(cmd)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .with_context(|| format!("Command `{}` timed out after {}s", cmd, timeout.as_secs()))?
    .with_context(|| format!("Failed to execute `{}`", cmd))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "`{}` exited with {}: {}",
            cmd,
            output.status,
            stderr.trim()
        );
    }

    let stdout = String::from_utf8(output.stdout)
        .with_context(|| format!("Non-UTF8 output from `{}`", cmd))?;
    Ok(stdout.trim().to_string())
}

/// Check if a binary exists in PATH. Returns the full path if found.
pub fn which(binary: &str) -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(binary))
            .find(|p| p.is_file())
    })
}

/// Like [`which`], but fails with an install hint.
pub fn require_binary(binary: &str, hint: &str) -> Result<PathBuf> {
    which(binary).with_context(|| format!("`{}` not found in PATH ({})", binary, hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn which_finds_existing_binary() {
        assert!(which("sh").is_some());
    }

    #[test]
    fn require_binary_reports_hint() {
        let err = require_binary("costwatch_missing_binary_xyz", "install it").unwrap_err();
        assert!(err.to_string().contains("install it"));
    }

    #[tokio::test]
    async fn run_command_trims_stdout() {
        let result = run_command("echo", &args(&["  hello  "]), Duration::from_secs(5)).await;
        assert_eq!(result.unwrap(), "hello");
    }

    #[tokio::test]
    async fn run_command_failure_includes_stderr() {
        let result = run_command(
            "sh",
            &args(&["-c", "echo bad credentials >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .await;
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("bad credentials"));
    }

    #[tokio::test]
    async fn run_command_times_out() {
        let result = run_command("sleep", &args(&["5"]), Duration::from_millis(100)).await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }
}
