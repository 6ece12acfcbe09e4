//! Explicit client configuration: endpoints, timeouts, refresh policy, and secret names.

// std
use std::env;
// self
use crate::{_prelude::*, secret::SecretScope};

/// Names of the secrets the client reads and writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeys {
	/// Current access token.
	pub access_token: String,
	/// Current refresh token.
	pub refresh_token: String,
	/// Absolute access-token expiry (UNIX seconds).
	pub expires_at: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: String,
}
impl Default for SecretKeys {
	fn default() -> Self {
		Self {
			access_token: "JOBBER_ACCESS_TOKEN".into(),
			refresh_token: "JOBBER_REFRESH_TOKEN".into(),
			expires_at: "JOBBER_TOKEN_EXPIRES_AT".into(),
			client_id: "JOBBER_CLIENT_ID".into(),
			client_secret: "JOBBER_CLIENT_SECRET".into(),
		}
	}
}

/// Validated configuration shared by the token manager, executor, and facade client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// OAuth token endpoint used for refresh grants.
	pub token_endpoint: Url,
	/// GraphQL endpoint.
	pub graphql_endpoint: Url,
	/// Value sent in the [`API_VERSION_HEADER`](ClientConfig::API_VERSION_HEADER) header.
	pub api_version: String,
	/// Timeout applied to every GraphQL and token request.
	pub request_timeout: Duration,
	/// Whether the token manager keeps a background refresh timer armed.
	pub proactive_refresh: bool,
	/// Remaining token lifetime (seconds) below which a refresh is due.
	pub refresh_buffer_seconds: i64,
	/// Fraction of the rate-limit ceiling below which requests report a rate-limit failure.
	pub rate_limit_threshold: f64,
	/// Secret store scope holding tokens and credentials.
	pub scope: SecretScope,
	/// Secret names inside [`scope`](ClientConfig::scope).
	pub keys: SecretKeys,
}
impl ClientConfig {
	/// Production token endpoint.
	pub const DEFAULT_TOKEN_ENDPOINT: &'static str = "https://api.getjobber.com/api/oauth/token";
	/// Production GraphQL endpoint.
	pub const DEFAULT_GRAPHQL_ENDPOINT: &'static str = "https://api.getjobber.com/api/graphql";
	/// GraphQL schema version pinned by the client.
	pub const DEFAULT_API_VERSION: &'static str = "2023-11-15";
	/// Header carrying the schema version.
	pub const API_VERSION_HEADER: &'static str = "X-JOBBER-GRAPHQL-VERSION";
	/// Default network timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
	/// Default refresh buffer (five minutes).
	pub const DEFAULT_REFRESH_BUFFER_SECONDS: i64 = 300;
	/// Default rate-limit threshold (20% of capacity).
	pub const DEFAULT_RATE_LIMIT_THRESHOLD: f64 = 0.20;

	/// Returns a builder seeded with production defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Builds the production configuration.
	pub fn jobber() -> Result<Self> {
		Self::builder().build()
	}

	/// Builds the production configuration with environment overrides applied.
	///
	/// Recognised variables: `JOBBER_GRAPHQL_URL`, `JOBBER_TOKEN_URL`, `JOBBER_API_VERSION`,
	/// `JOBBER_SECRETS_PROJECT`, `JOBBER_SECRETS_CONFIG`.
	pub fn from_env() -> Result<Self> {
		Self::builder().with_env_overrides(|name| env::var(name).ok()).build()
	}
}

/// Builder for [`ClientConfig`]; validation happens in [`build`](ClientConfigBuilder::build).
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	token_endpoint: String,
	graphql_endpoint: String,
	api_version: String,
	request_timeout: Duration,
	proactive_refresh: bool,
	refresh_buffer_seconds: i64,
	rate_limit_threshold: f64,
	scope: SecretScope,
	keys: SecretKeys,
}
impl ClientConfigBuilder {
	/// Overrides the token endpoint.
	pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
		self.token_endpoint = url.into();

		self
	}

	/// Overrides the GraphQL endpoint.
	pub fn graphql_endpoint(mut self, url: impl Into<String>) -> Self {
		self.graphql_endpoint = url.into();

		self
	}

	/// Overrides the schema version header value.
	pub fn api_version(mut self, version: impl Into<String>) -> Self {
		self.api_version = version.into();

		self
	}

	/// Overrides the network timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Enables or disables the background refresh timer.
	pub fn proactive_refresh(mut self, enabled: bool) -> Self {
		self.proactive_refresh = enabled;

		self
	}

	/// Overrides the refresh buffer in seconds; negative values clamp to zero.
	pub fn refresh_buffer_seconds(mut self, seconds: i64) -> Self {
		self.refresh_buffer_seconds = seconds.max(0);

		self
	}

	/// Overrides the rate-limit threshold fraction.
	pub fn rate_limit_threshold(mut self, fraction: f64) -> Self {
		self.rate_limit_threshold = fraction;

		self
	}

	/// Overrides the secret store scope.
	pub fn scope(mut self, scope: SecretScope) -> Self {
		self.scope = scope;

		self
	}

	/// Overrides the secret names.
	pub fn keys(mut self, keys: SecretKeys) -> Self {
		self.keys = keys;

		self
	}

	/// Applies overrides from `lookup`, which maps variable names to values.
	pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
		if let Some(url) = lookup("JOBBER_GRAPHQL_URL") {
			self.graphql_endpoint = url;
		}
		if let Some(url) = lookup("JOBBER_TOKEN_URL") {
			self.token_endpoint = url;
		}
		if let Some(version) = lookup("JOBBER_API_VERSION") {
			self.api_version = version;
		}
		if let Some(project) = lookup("JOBBER_SECRETS_PROJECT") {
			self.scope.project = project;
		}
		if let Some(config) = lookup("JOBBER_SECRETS_CONFIG") {
			self.scope.config = config;
		}

		self
	}

	/// Validates the settings and produces a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig> {
		let token_endpoint = parse_endpoint("token", &self.token_endpoint)?;
		let graphql_endpoint = parse_endpoint("GraphQL", &self.graphql_endpoint)?;

		if !(self.rate_limit_threshold > 0. && self.rate_limit_threshold <= 1.) {
			return Err(Error::configuration(format!(
				"Rate-limit threshold must be within (0, 1], got {}.",
				self.rate_limit_threshold
			)));
		}
		if self.request_timeout.is_zero() {
			return Err(Error::configuration("Request timeout must be non-zero."));
		}
		if self.api_version.trim().is_empty() {
			return Err(Error::configuration("API version must not be empty."));
		}

		Ok(ClientConfig {
			token_endpoint,
			graphql_endpoint,
			api_version: self.api_version,
			request_timeout: self.request_timeout,
			proactive_refresh: self.proactive_refresh,
			refresh_buffer_seconds: self.refresh_buffer_seconds,
			rate_limit_threshold: self.rate_limit_threshold,
			scope: self.scope,
			keys: self.keys,
		})
	}
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self {
			token_endpoint: ClientConfig::DEFAULT_TOKEN_ENDPOINT.into(),
			graphql_endpoint: ClientConfig::DEFAULT_GRAPHQL_ENDPOINT.into(),
			api_version: ClientConfig::DEFAULT_API_VERSION.into(),
			request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
			proactive_refresh: true,
			refresh_buffer_seconds: ClientConfig::DEFAULT_REFRESH_BUFFER_SECONDS,
			rate_limit_threshold: ClientConfig::DEFAULT_RATE_LIMIT_THRESHOLD,
			scope: SecretScope::default(),
			keys: SecretKeys::default(),
		}
	}
}

fn parse_endpoint(label: &str, raw: &str) -> Result<Url> {
	let url = Url::parse(raw).map_err(|e| {
		Error::configuration(format!("The {label} endpoint is not a valid URL ({raw}): {e}."))
	})?;

	if !matches!(url.scheme(), "http" | "https") {
		return Err(Error::configuration(format!(
			"The {label} endpoint must use HTTP(S): {raw}."
		)));
	}

	Ok(url)
}
