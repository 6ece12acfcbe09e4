//! Client-wide failure taxonomy with structured context for caller-side recovery.

// crates.io
use serde_json::Map;
// self
use crate::{_prelude::*, graphql::ThrottleStatus};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Fieldless discriminant of [`Error`], convenient for exhaustive matching and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
	/// Required secrets are absent or malformed.
	Configuration,
	/// Token invalid, expired, or refresh failed.
	Authentication,
	/// Transport-level failure.
	Network,
	/// Query or schema-level failure reported by the API.
	GraphQl,
	/// Rate-limit budget fell below the configured threshold.
	RateLimit,
}
impl ErrorKind {
	/// Returns a stable label suitable for log or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Configuration => "configuration",
			ErrorKind::Authentication => "authentication",
			ErrorKind::Network => "network",
			ErrorKind::GraphQl => "graphql",
			ErrorKind::RateLimit => "rate_limit",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical error exposed by every public API of the client.
///
/// Only [`Error::Authentication`] is ever recovered automatically, and only once, by
/// [`JobberClient`](crate::client::JobberClient). Everything else is surfaced immediately.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Required secrets are absent or malformed; operator action is needed.
	#[error("{message}")]
	Configuration {
		/// Human-readable description.
		message: String,
	},
	/// Access token rejected, or the refresh exchange (or its persistence) failed.
	#[error("{message}")]
	Authentication {
		/// Human-readable description.
		message: String,
		/// HTTP status that triggered the failure, when one was observed.
		status: Option<u16>,
		/// Underlying cause, if any.
		#[source]
		source: Option<BoxError>,
	},
	/// Transport failure, non-2xx response, or a body that is not JSON.
	#[error("{message}")]
	Network {
		/// Human-readable description.
		message: String,
		/// HTTP status code, when a response was received.
		status: Option<u16>,
		/// Raw response body, when one was received.
		body: Option<String>,
		/// Endpoint that was being called.
		url: Option<Url>,
		/// Underlying transport error, if any.
		#[source]
		source: Option<BoxError>,
	},
	/// The API reported GraphQL errors or returned no `data`.
	#[error("{message}")]
	GraphQl {
		/// Human-readable description.
		message: String,
		/// Error objects exactly as returned by the API.
		errors: Vec<Value>,
		/// Query string that was submitted.
		query: String,
		/// Variables that were submitted.
		variables: Option<Value>,
		/// Full response body when the failure concerns its shape.
		response: Option<Value>,
	},
	/// Remaining rate-limit points dropped below the configured fraction of capacity.
	///
	/// The request that produced this error already succeeded; callers should back off for
	/// `wait_seconds` before issuing more.
	#[error("{message}")]
	RateLimit {
		/// Human-readable description.
		message: String,
		/// Snapshot that tripped the policy.
		throttle: ThrottleStatus,
		/// Estimated seconds until the budget climbs back to the threshold.
		wait_seconds: f64,
		/// Threshold fraction that was applied.
		threshold_fraction: f64,
	},
}
impl Error {
	/// Builds an [`Error::Configuration`].
	pub fn configuration(message: impl Into<String>) -> Self {
		Self::Configuration { message: message.into() }
	}

	/// Builds an [`Error::Authentication`] without an underlying cause.
	pub fn authentication(message: impl Into<String>) -> Self {
		Self::Authentication { message: message.into(), status: None, source: None }
	}

	/// Builds an [`Error::Authentication`] wrapping `source`.
	pub fn authentication_caused_by(
		message: impl Into<String>,
		source: impl 'static + Send + Sync + StdError,
	) -> Self {
		Self::Authentication { message: message.into(), status: None, source: Some(Box::new(source)) }
	}

	/// Returns the discriminant of this error.
	pub const fn kind(&self) -> ErrorKind {
		match self {
			Self::Configuration { .. } => ErrorKind::Configuration,
			Self::Authentication { .. } => ErrorKind::Authentication,
			Self::Network { .. } => ErrorKind::Network,
			Self::GraphQl { .. } => ErrorKind::GraphQl,
			Self::RateLimit { .. } => ErrorKind::RateLimit,
		}
	}

	/// Returns `true` when a token refresh followed by a single retry may succeed.
	pub const fn is_retryable_with_refresh(&self) -> bool {
		matches!(self, Self::Authentication { .. })
	}

	/// Suggested backoff for [`Error::RateLimit`].
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimit { wait_seconds, .. } =>
				Duration::try_from_secs_f64(wait_seconds.max(0.)).ok(),
			_ => None,
		}
	}

	/// Renders the structured context attached to this error.
	///
	/// Keys mirror the fields callers usually log: `status_code`, `response`, `url`,
	/// `errors`, `query`, `variables`, `throttle_status`, `wait_seconds`, `threshold_pct`.
	pub fn context(&self) -> Map<String, Value> {
		let mut ctx = Map::new();

		match self {
			Self::Configuration { .. } => {},
			Self::Authentication { status, .. } =>
				if let Some(status) = status {
					ctx.insert("status_code".into(), (*status).into());
				},
			Self::Network { status, body, url, .. } => {
				if let Some(status) = status {
					ctx.insert("status_code".into(), (*status).into());
				}
				if let Some(body) = body {
					ctx.insert("response".into(), body.clone().into());
				}
				if let Some(url) = url {
					ctx.insert("url".into(), url.as_str().into());
				}
			},
			Self::GraphQl { errors, query, variables, response, .. } => {
				ctx.insert("errors".into(), Value::Array(errors.clone()));
				ctx.insert("query".into(), query.clone().into());
				ctx.insert("variables".into(), variables.clone().unwrap_or(Value::Null));

				if let Some(response) = response {
					ctx.insert("response".into(), response.clone());
				}
			},
			Self::RateLimit { throttle, wait_seconds, threshold_fraction, .. } => {
				ctx.insert("throttle_status".into(), throttle.to_json());
				ctx.insert("wait_seconds".into(), (*wait_seconds).into());
				ctx.insert("threshold_pct".into(), (*threshold_fraction).into());
			},
		}

		ctx
	}
}
