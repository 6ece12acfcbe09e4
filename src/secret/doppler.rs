//! [`SecretStore`] adapter that shells out to the Doppler CLI.

// std
use std::{path::PathBuf, process::Stdio};
// crates.io
use tokio::{io::AsyncWriteExt, process::Command};
// self
use crate::{
	_prelude::*,
	secret::{SecretFuture, SecretScope, SecretStore, SecretStoreError},
};

/// Talks to Doppler through its CLI (`doppler secrets get|set`).
///
/// Values passed to `set` travel over stdin so they never show up in process listings.
#[derive(Clone, Debug)]
pub struct DopplerCli {
	program: PathBuf,
	timeout: Duration,
}
impl DopplerCli {
	/// Per-call timeout applied when none is configured.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

	/// Uses the `doppler` binary found on `PATH`.
	pub fn new() -> Self {
		Self { program: PathBuf::from("doppler"), timeout: Self::DEFAULT_TIMEOUT }
	}

	/// Overrides the CLI binary.
	pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
		self.program = program.into();

		self
	}

	/// Overrides the per-call timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	async fn run(&self, args: Vec<String>, stdin: Option<&str>) -> Result<String, SecretStoreError> {
		let mut command = Command::new(&self.program);

		command
			.args(&args)
			.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let mut child = command.spawn().map_err(|e| SecretStoreError::Spawn {
			message: format!("{}: {e}", self.program.display()),
		})?;
		let output = tokio::time::timeout(self.timeout, async {
			if let (Some(value), Some(mut pipe)) = (stdin, child.stdin.take()) {
				pipe.write_all(value.as_bytes()).await?;
				pipe.shutdown().await?;
			}

			child.wait_with_output().await
		})
		.await
		.map_err(|_| SecretStoreError::Timeout { seconds: self.timeout.as_secs() })?
		.map_err(|e| SecretStoreError::Spawn {
			message: format!("{}: {e}", self.program.display()),
		})?;

		if !output.status.success() {
			return Err(SecretStoreError::Command {
				code: output.status.code(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
			});
		}

		String::from_utf8(output.stdout).map_err(|e| SecretStoreError::Backend {
			message: format!("Secret store returned non-UTF-8 output: {e}"),
		})
	}

	fn scope_args(scope: &SecretScope) -> [String; 4] {
		["--project".into(), scope.project.clone(), "--config".into(), scope.config.clone()]
	}
}
impl Default for DopplerCli {
	fn default() -> Self {
		Self::new()
	}
}
impl SecretStore for DopplerCli {
	fn get<'a>(
		&'a self,
		keys: &'a [&'a str],
		scope: &'a SecretScope,
	) -> SecretFuture<'a, Vec<String>> {
		Box::pin(async move {
			let mut args = vec!["secrets".to_owned(), "get".to_owned()];

			args.extend(keys.iter().map(|key| (*key).to_owned()));
			args.extend(Self::scope_args(scope));
			args.push("--plain".into());

			let stdout = self.run(args, None).await?;

			Ok(split_values(&stdout))
		})
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		scope: &'a SecretScope,
	) -> SecretFuture<'a, ()> {
		Box::pin(async move {
			let mut args = vec!["secrets".to_owned(), "set".to_owned(), key.to_owned()];

			args.extend(Self::scope_args(scope));
			args.push("--silent".into());

			self.run(args, Some(value)).await.map(|_| ())
		})
	}
}

/// Splits `--plain` output into one value per line.
fn split_values(stdout: &str) -> Vec<String> {
	stdout.trim().lines().map(|line| line.trim_end_matches('\r').to_owned()).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn plain_output_splits_per_line() {
		assert_eq!(split_values("a\nb\n1700000000\n"), vec!["a", "b", "1700000000"]);
		assert_eq!(split_values("a\r\nb\r\n"), vec!["a", "b"]);
		assert!(split_values("\n").is_empty());
	}

	#[test]
	fn scope_args_follow_cli_flags() {
		let args = DopplerCli::scope_args(&SecretScope::new("jobber", "dev"));

		assert_eq!(args, ["--project", "jobber", "--config", "dev"].map(String::from));
	}

	#[tokio::test]
	async fn missing_binary_reports_spawn_failure() {
		let cli = DopplerCli::new().with_program("/nonexistent/doppler-test-binary");
		let err = cli
			.get(&["JOBBER_CLIENT_ID"], &SecretScope::default())
			.await
			.expect_err("A missing binary should fail to spawn.");

		assert!(matches!(err, SecretStoreError::Spawn { .. }));
	}
}
