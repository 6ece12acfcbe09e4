//! Single-shot GraphQL execution: request encoding, response classification, and the
//! rate-limit trip-wire.
//!
//! [`GraphQlExecutor::execute`] classifies a response in a fixed order: 401, other non-2xx,
//! transport failures, non-JSON bodies, the throttle snapshot (checked before GraphQL errors
//! so a low budget is reported even on an otherwise successful response), `errors`, and
//! finally a missing `data` key.

// crates.io
use reqwest::{
	StatusCode,
	header::{CONTENT_TYPE, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientConfig,
	http::{self, ReqwestHttpClient},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// One GraphQL operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphQlRequest {
	/// Query or mutation document.
	pub query: String,
	/// Variables; omitted from the wire when absent, null, or an empty object.
	#[serde(default, skip_serializing_if = "variables_absent")]
	pub variables: Option<Value>,
	/// Operation to run when the document defines several.
	#[serde(
		default,
		rename = "operationName",
		skip_serializing_if = "operation_name_absent"
	)]
	pub operation_name: Option<String>,
}
impl GraphQlRequest {
	/// Creates a request without variables or operation name.
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), variables: None, operation_name: None }
	}

	/// Attaches variables.
	pub fn with_variables(mut self, variables: Value) -> Self {
		self.variables = Some(variables);

		self
	}

	/// Selects the operation to run.
	pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
		self.operation_name = Some(name.into());

		self
	}
}

fn variables_absent(variables: &Option<Value>) -> bool {
	match variables {
		None | Some(Value::Null) => true,
		Some(Value::Object(map)) => map.is_empty(),
		Some(_) => false,
	}
}

fn operation_name_absent(name: &Option<String>) -> bool {
	name.as_deref().is_none_or(str::is_empty)
}

/// Rate-limit point budget reported under `extensions.cost.throttleStatus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleStatus {
	/// Points available right now.
	#[serde(default)]
	pub currently_available: i64,
	/// Point ceiling.
	#[serde(default = "ThrottleStatus::default_maximum")]
	pub maximum_available: i64,
	/// Points restored per second.
	#[serde(default = "ThrottleStatus::default_restore_rate")]
	pub restore_rate: i64,
}
impl ThrottleStatus {
	/// Ceiling assumed when the API omits `maximumAvailable`.
	pub const DEFAULT_MAXIMUM_AVAILABLE: i64 = 10_000;
	/// Restore rate assumed when the API omits `restoreRate`.
	pub const DEFAULT_RESTORE_RATE: i64 = 500;

	fn default_maximum() -> i64 {
		Self::DEFAULT_MAXIMUM_AVAILABLE
	}

	fn default_restore_rate() -> i64 {
		Self::DEFAULT_RESTORE_RATE
	}

	/// Renders the snapshot with the API's field names.
	pub fn to_json(&self) -> Value {
		serde_json::json!({
			"currentlyAvailable": self.currently_available,
			"maximumAvailable": self.maximum_available,
			"restoreRate": self.restore_rate,
		})
	}
}

/// Decides whether a throttle snapshot is low enough to tell the caller to back off.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimitPolicy {
	threshold_fraction: f64,
}
impl RateLimitPolicy {
	/// Creates a policy tripping below `threshold_fraction` of the ceiling.
	pub const fn new(threshold_fraction: f64) -> Self {
		Self { threshold_fraction }
	}

	/// Fraction of the ceiling that must remain available.
	pub const fn threshold_fraction(&self) -> f64 {
		self.threshold_fraction
	}

	/// Point threshold for `status`.
	pub fn threshold(&self, status: &ThrottleStatus) -> f64 {
		self.threshold_fraction * status.maximum_available as f64
	}

	/// Returns the estimated wait in seconds when `status` is below the threshold.
	///
	/// A non-positive restore rate is treated like an absent one.
	pub fn evaluate(&self, status: &ThrottleStatus) -> Option<f64> {
		let threshold = self.threshold(status);
		let available = status.currently_available as f64;

		if available >= threshold {
			return None;
		}

		let restore_rate = if status.restore_rate > 0 {
			status.restore_rate
		} else {
			ThrottleStatus::DEFAULT_RESTORE_RATE
		};

		Some((threshold - available) / restore_rate as f64)
	}

	/// Converts a tripped evaluation into [`Error::RateLimit`].
	pub fn check(&self, status: &ThrottleStatus) -> Result<()> {
		match self.evaluate(status) {
			None => Ok(()),
			Some(wait_seconds) => Err(Error::RateLimit {
				message: format!(
					"Rate limit low: {}/{} points available. Wait {wait_seconds:.1}s for points to restore.",
					status.currently_available, status.maximum_available
				),
				throttle: *status,
				wait_seconds,
				threshold_fraction: self.threshold_fraction,
			}),
		}
	}
}
impl Default for RateLimitPolicy {
	fn default() -> Self {
		Self::new(ClientConfig::DEFAULT_RATE_LIMIT_THRESHOLD)
	}
}

/// Executes GraphQL operations with one access token.
///
/// Stateless per call apart from remembering the last throttle snapshot it observed.
#[derive(Debug)]
pub struct GraphQlExecutor {
	http: ReqwestHttpClient,
	endpoint: Url,
	api_version: String,
	request_timeout: Duration,
	policy: RateLimitPolicy,
	access_token: TokenSecret,
	last_throttle: Mutex<Option<ThrottleStatus>>,
}
impl GraphQlExecutor {
	/// Binds an executor to `access_token` using the endpoint and limits in `config`.
	pub fn new(
		http: ReqwestHttpClient,
		config: &ClientConfig,
		access_token: impl Into<TokenSecret>,
	) -> Self {
		Self {
			http,
			endpoint: config.graphql_endpoint.clone(),
			api_version: config.api_version.clone(),
			request_timeout: config.request_timeout,
			policy: RateLimitPolicy::new(config.rate_limit_threshold),
			access_token: access_token.into(),
			last_throttle: Mutex::new(None),
		}
	}

	/// Last throttle snapshot observed, or `None` before the first parsed response.
	pub fn throttle_status(&self) -> Option<ThrottleStatus> {
		*self.last_throttle.lock()
	}

	/// Sends `request` and returns its `data` value.
	pub async fn execute(&self, request: &GraphQlRequest) -> Result<Value> {
		const KIND: OpKind = OpKind::Query;

		let span = OpSpan::new(KIND, "execute");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.execute_inner(request)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn execute_inner(&self, request: &GraphQlRequest) -> Result<Value> {
		let text = self.send(request).await?;
		let body: Value = serde_json::from_str(&text).map_err(|e| Error::Network {
			message: format!("Invalid JSON response: {text}"),
			status: None,
			body: Some(text.clone()),
			url: Some(self.endpoint.clone()),
			source: Some(Box::new(e)),
		})?;

		self.classify(request, body)
	}

	async fn send(&self, request: &GraphQlRequest) -> Result<String> {
		let response = self
			.http
			.post(self.endpoint.clone())
			.bearer_auth(self.access_token.expose())
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.header(ClientConfig::API_VERSION_HEADER, self.api_version.as_str())
			.json(request)
			.timeout(self.request_timeout)
			.send()
			.await
			.map_err(|e| self.transport_error(e))?;
		let status = response.status();

		if status == StatusCode::UNAUTHORIZED {
			return Err(Error::Authentication {
				message: "Access token invalid or expired.".into(),
				status: Some(status.as_u16()),
				source: None,
			});
		}

		let text = response.text().await.map_err(|e| self.transport_error(e))?;

		if !status.is_success() {
			return Err(Error::Network {
				message: format!("HTTP {}: {text}", status.as_u16()),
				status: Some(status.as_u16()),
				body: Some(text),
				url: Some(self.endpoint.clone()),
				source: None,
			});
		}

		Ok(text)
	}

	fn classify(&self, request: &GraphQlRequest, mut body: Value) -> Result<Value> {
		if let Some(raw) = body.pointer("/extensions/cost/throttleStatus") {
			let status = ThrottleStatus::deserialize(raw).map_err(|e| Error::Network {
				message: format!("Invalid throttleStatus in response: {e}"),
				status: None,
				body: Some(raw.to_string()),
				url: Some(self.endpoint.clone()),
				source: Some(Box::new(e)),
			})?;

			*self.last_throttle.lock() = Some(status);

			self.policy.check(&status)?;
		}

		match body.get("errors") {
			None | Some(Value::Null) => {},
			Some(raw) => {
				let errors = match raw {
					Value::Array(list) => list.clone(),
					other => vec![other.clone()],
				};
				let first = errors
					.first()
					.and_then(|e| e.get("message"))
					.and_then(Value::as_str)
					.unwrap_or("Unknown error");

				return Err(Error::GraphQl {
					message: format!("GraphQL query failed: {first}"),
					query: request.query.clone(),
					variables: request.variables.clone(),
					response: None,
					errors,
				});
			},
		}

		match body.as_object_mut().and_then(|map| map.remove("data")) {
			Some(data) => Ok(data),
			None => Err(Error::GraphQl {
				message: "Response missing 'data' field.".into(),
				errors: Vec::new(),
				query: request.query.clone(),
				variables: request.variables.clone(),
				response: Some(body),
			}),
		}
	}

	fn transport_error(&self, err: ReqwestError) -> Error {
		Error::Network {
			message: http::describe_transport_error(&err, self.request_timeout),
			status: err.status().map(|s| s.as_u16()),
			body: None,
			url: Some(self.endpoint.clone()),
			source: Some(Box::new(err)),
		}
	}
}
