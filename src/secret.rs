//! Secret store contracts and the built-in adapters used to persist tokens and credentials.

pub mod doppler;
pub mod memory;

pub use doppler::DopplerCli;
pub use memory::MemorySecretStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`SecretStore`] operations.
pub type SecretFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, SecretStoreError>> + 'a + Send>>;

/// Key-value secret storage scoped to a project/config pair.
///
/// The token manager assumes it is the only writer for a scope; implementations do not need
/// to provide compare-and-swap semantics.
pub trait SecretStore
where
	Self: Send + Sync,
{
	/// Reads `keys` from `scope`, returning one value per key in request order.
	///
	/// Implementations may return fewer values than requested when some keys are absent;
	/// callers validate the count.
	fn get<'a>(
		&'a self,
		keys: &'a [&'a str],
		scope: &'a SecretScope,
	) -> SecretFuture<'a, Vec<String>>;

	/// Writes a single `key`/`value` pair into `scope`.
	fn set<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		scope: &'a SecretScope,
	) -> SecretFuture<'a, ()>;
}

/// Project/config pair that namespaces secrets.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretScope {
	/// Project name.
	pub project: String,
	/// Config (environment) name inside the project.
	pub config: String,
}
impl SecretScope {
	/// Default project holding Jobber secrets.
	pub const DEFAULT_PROJECT: &'static str = "jobber";
	/// Default config holding Jobber secrets.
	pub const DEFAULT_CONFIG: &'static str = "prd";

	/// Creates a scope for the provided project/config pair.
	pub fn new(project: impl Into<String>, config: impl Into<String>) -> Self {
		Self { project: project.into(), config: config.into() }
	}
}
impl Default for SecretScope {
	fn default() -> Self {
		Self::new(Self::DEFAULT_PROJECT, Self::DEFAULT_CONFIG)
	}
}
impl Display for SecretScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.project, self.config)
	}
}

/// Error type produced by [`SecretStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SecretStoreError {
	/// The backing command could not be started.
	#[error("Secret store command could not be started: {message}.")]
	Spawn {
		/// Human-readable error payload.
		message: String,
	},
	/// The backing command did not finish in time.
	#[error("Secret store command timed out after {seconds} seconds.")]
	Timeout {
		/// Timeout that elapsed.
		seconds: u64,
	},
	/// The backing command exited unsuccessfully.
	#[error("Secret store command exited with {}: {stderr}.", .code.map_or_else(|| "a signal".to_owned(), |c| format!("code {c}")))]
	Command {
		/// Exit code, if the process was not killed by a signal.
		code: Option<i32>,
		/// Captured standard error.
		stderr: String,
	},
	/// Backend-level failure not tied to a process.
	#[error("Secret store backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scope_defaults_and_display() {
		let scope = SecretScope::default();

		assert_eq!(scope.project, "jobber");
		assert_eq!(scope.config, "prd");
		assert_eq!(scope.to_string(), "jobber/prd");
	}

	#[test]
	fn command_error_mentions_exit_code() {
		let err = SecretStoreError::Command { code: Some(1), stderr: "not found".into() };

		assert_eq!(err.to_string(), "Secret store command exited with code 1: not found.");

		let err = SecretStoreError::Command { code: None, stderr: "killed".into() };

		assert_eq!(err.to_string(), "Secret store command exited with a signal: killed.");
	}
}
