//! Public entry point composing token management with request execution.

// self
use crate::{
	_prelude::*,
	auth::{TokenManager, TokenSecret},
	config::ClientConfig,
	graphql::{GraphQlExecutor, GraphQlRequest, ThrottleStatus},
	http::ReqwestHttpClient,
	secret::SecretStore,
};

/// Jobber GraphQL client.
///
/// Every call runs on a fresh [`GraphQlExecutor`] bound to a token from the
/// [`TokenManager`]. An authentication failure triggers exactly one refresh and one retry;
/// every other failure is returned as-is.
#[derive(Debug)]
pub struct JobberClient {
	token_manager: TokenManager,
	config: ClientConfig,
	http: ReqwestHttpClient,
	last_throttle: Mutex<Option<ThrottleStatus>>,
}
impl JobberClient {
	/// Wraps an existing token manager.
	pub fn new(token_manager: TokenManager, config: ClientConfig) -> Result<Self> {
		let http = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Ok(Self::with_http_client(token_manager, config, http))
	}

	/// Wraps an existing token manager and HTTP client.
	pub fn with_http_client(
		token_manager: TokenManager,
		config: ClientConfig,
		http: ReqwestHttpClient,
	) -> Self {
		Self { token_manager, config, http, last_throttle: Mutex::new(None) }
	}

	/// Loads credentials and tokens from `store` and builds a client sharing one HTTP pool
	/// between refreshes and queries.
	pub async fn from_secret_store(store: Arc<dyn SecretStore>, config: ClientConfig) -> Result<Self> {
		let http = ReqwestHttpClient::with_timeout(config.request_timeout)?;
		let token_manager =
			TokenManager::builder(store, config.clone()).http_client(http.clone()).build().await?;

		Ok(Self::with_http_client(token_manager, config, http))
	}

	/// Executes a query or mutation and returns its `data`.
	pub async fn execute_query(
		&self,
		query: impl Into<String>,
		variables: Option<Value>,
		operation_name: Option<&str>,
	) -> Result<Value> {
		let mut request = GraphQlRequest::new(query);

		request.variables = variables;
		request.operation_name = operation_name.map(str::to_owned);

		self.execute(&request).await
	}

	/// Executes a prepared request with a single refresh-and-retry on authentication
	/// failure.
	pub async fn execute(&self, request: &GraphQlRequest) -> Result<Value> {
		let token = self.token_manager.get_token().await?;

		match self.execute_once(token, request).await {
			Err(err) if err.is_retryable_with_refresh() => {
				let token = self.token_manager.refresh_on_401().await?;

				self.execute_once(token, request).await
			},
			result => result,
		}
	}

	/// Throttle snapshot from the most recent response that carried one.
	pub fn get_throttle_status(&self) -> Option<ThrottleStatus> {
		*self.last_throttle.lock()
	}

	/// Token manager backing this client.
	pub fn token_manager(&self) -> &TokenManager {
		&self.token_manager
	}

	/// Configuration this client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	async fn execute_once(
		&self,
		token: TokenSecret,
		request: &GraphQlRequest,
	) -> Result<Value> {
		let executor = GraphQlExecutor::new(self.http.clone(), &self.config, token);
		let result = executor.execute(request).await;

		if let Some(status) = executor.throttle_status() {
			*self.last_throttle.lock() = Some(status);
		}

		result
	}
}
