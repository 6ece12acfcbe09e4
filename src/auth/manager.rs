//! Token lifecycle: load from the secret store, refresh proactively and on demand, and mirror
//! every refresh back into the store.
//!
//! All reads and writes of the current [`TokenState`] go through one async mutex. A caller
//! that arrives while a refresh is running parks on that mutex and then observes the fresh
//! token, so concurrent callers never trigger duplicate refresh exchanges.
//!
//! When proactive refresh is enabled a single background task sleeps until
//! `expires_in - refresh_buffer` and then refreshes under the same mutex. Its failures never
//! reach a caller: they are logged, counted, and handed to the optional failure hook, and the
//! next [`TokenManager::get_token`] notices the still-expiring token and refreshes inline.

mod metrics;
mod schedule;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, TokenSecret, TokenState, token::state::unix_now},
	config::{ClientConfig, SecretKeys},
	http::{self, ReqwestHttpClient},
	obs::{self, OpKind, OpOutcome, OpSpan},
	secret::{SecretScope, SecretStore},
};
use schedule::RefreshSchedule;

/// Callback receiving background refresh failures.
pub type ProactiveFailureHook = Arc<dyn Fn(&Error) + Send + Sync>;

type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// Shortest wait before a background refresh fires.
///
/// Tokens whose lifetime never exceeds the refresh buffer would otherwise be refreshed in a
/// tight loop.
pub const MIN_PROACTIVE_DELAY: Duration = Duration::from_secs(1);

/// Owns the current token and keeps it valid; cheap to clone.
#[derive(Clone)]
pub struct TokenManager {
	inner: Arc<ManagerInner>,
}
impl TokenManager {
	/// Returns a builder for a manager backed by `store`.
	pub fn builder(store: Arc<dyn SecretStore>, config: ClientConfig) -> TokenManagerBuilder {
		TokenManagerBuilder::new(store, config)
	}

	/// Loads the current token for already-known credentials.
	///
	/// Fails with [`Error::Configuration`] if the store does not return three token values and
	/// with [`Error::Authentication`] if the stored expiry is not an integer.
	pub async fn new(
		credentials: ClientCredentials,
		store: Arc<dyn SecretStore>,
		config: ClientConfig,
	) -> Result<Self> {
		Self::builder(store, config).credentials(credentials).build().await
	}

	/// Loads the client credentials and then the current token from the store.
	pub async fn from_secret_store(store: Arc<dyn SecretStore>, config: ClientConfig) -> Result<Self> {
		Self::builder(store, config).build().await
	}

	/// Returns an access token that is valid for at least the refresh buffer, refreshing first
	/// when it is not.
	pub async fn get_token(&self) -> Result<TokenSecret> {
		let inner = &self.inner;
		let mut state = inner.state.lock().await;

		if state.should_refresh(inner.refresh_buffer_seconds) {
			inner.refresh_locked(&mut state, OpKind::Refresh).await?;
		}

		Ok(state.access_token.clone())
	}

	/// Refreshes unconditionally; used after the API rejected the current token.
	pub async fn refresh_on_401(&self) -> Result<TokenSecret> {
		let inner = &self.inner;
		let mut state = inner.state.lock().await;

		inner.refresh_locked(&mut state, OpKind::Refresh).await?;

		Ok(state.access_token.clone())
	}

	/// Returns a snapshot of the current token.
	pub async fn current(&self) -> TokenState {
		self.inner.state.lock().await.clone()
	}

	/// Refresh counters for this manager.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.inner.metrics
	}

	/// Returns `true` while a background refresh is pending.
	pub fn is_proactive_refresh_armed(&self) -> bool {
		self.inner.schedule.is_armed()
	}

	/// Remaining-lifetime threshold (seconds) that triggers a refresh.
	pub fn refresh_buffer_seconds(&self) -> i64 {
		self.inner.refresh_buffer_seconds
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("client_id", &self.inner.credentials.client_id)
			.field("scope", &self.inner.scope)
			.field("proactive_refresh", &self.inner.proactive_refresh)
			.field("refresh_buffer_seconds", &self.inner.refresh_buffer_seconds)
			.finish()
	}
}

/// Builder for [`TokenManager`].
pub struct TokenManagerBuilder {
	store: Arc<dyn SecretStore>,
	config: ClientConfig,
	credentials: Option<ClientCredentials>,
	http_client: Option<ReqwestHttpClient>,
	failure_hook: Option<ProactiveFailureHook>,
}
impl TokenManagerBuilder {
	fn new(store: Arc<dyn SecretStore>, config: ClientConfig) -> Self {
		Self { store, config, credentials: None, http_client: None, failure_hook: None }
	}

	/// Uses the provided credentials instead of loading them from the store.
	pub fn credentials(mut self, credentials: ClientCredentials) -> Self {
		self.credentials = Some(credentials);

		self
	}

	/// Reuses an existing HTTP client for refresh exchanges.
	pub fn http_client(mut self, client: ReqwestHttpClient) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Registers a callback for background refresh failures.
	pub fn on_proactive_failure(mut self, hook: impl Fn(&Error) + Send + Sync + 'static) -> Self {
		self.failure_hook = Some(Arc::new(hook));

		self
	}

	/// Loads credentials (unless supplied) and the current token, then arms the background
	/// refresh when enabled.
	///
	/// Must be called from within a tokio runtime.
	pub async fn build(self) -> Result<TokenManager> {
		let Self { store, config, credentials, http_client, failure_hook } = self;
		let credentials = match credentials {
			Some(credentials) => credentials,
			None => ClientCredentials::load(store.as_ref(), &config.keys, &config.scope).await?,
		};
		let http = match http_client {
			Some(client) => client,
			None => ReqwestHttpClient::with_timeout(config.request_timeout)?,
		};
		let state = load_state(store.as_ref(), &config.keys, &config.scope).await?;
		let inner = Arc::new(ManagerInner {
			credentials,
			store,
			scope: config.scope,
			keys: config.keys,
			token_endpoint: config.token_endpoint,
			request_timeout: config.request_timeout,
			proactive_refresh: config.proactive_refresh,
			refresh_buffer_seconds: config.refresh_buffer_seconds,
			http,
			state: AsyncMutex::new(state.clone()),
			schedule: RefreshSchedule::default(),
			metrics: RefreshMetrics::default(),
			failure_hook,
		});

		if inner.proactive_refresh {
			inner.arm_timer(&state);
		}

		Ok(TokenManager { inner })
	}
}
impl Debug for TokenManagerBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManagerBuilder")
			.field("scope", &self.config.scope)
			.field("credentials_set", &self.credentials.is_some())
			.field("failure_hook_set", &self.failure_hook.is_some())
			.finish()
	}
}

struct ManagerInner {
	credentials: ClientCredentials,
	store: Arc<dyn SecretStore>,
	scope: SecretScope,
	keys: SecretKeys,
	token_endpoint: Url,
	request_timeout: Duration,
	proactive_refresh: bool,
	refresh_buffer_seconds: i64,
	http: ReqwestHttpClient,
	state: AsyncMutex<TokenState>,
	schedule: RefreshSchedule,
	metrics: RefreshMetrics,
	failure_hook: Option<ProactiveFailureHook>,
}
impl ManagerInner {
	/// Exchanges the refresh token and replaces `state`; callers must hold the state lock.
	///
	/// The in-memory token is replaced (and the timer rearmed) before it is persisted, so a
	/// failed store write still leaves a usable token in memory.
	async fn refresh_locked(self: &Arc<Self>, state: &mut TokenState, kind: OpKind) -> Result<()> {
		let span = OpSpan::new(kind, "refresh_locked");

		obs::record_op_outcome(kind, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async {
				*state = self.exchange(state).await?;

				if self.proactive_refresh {
					self.arm_timer(state);
				}

				self.persist(state).await
			})
			.await;

		match &result {
			Ok(()) => {
				self.metrics.record_success();
				obs::record_op_outcome(kind, OpOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_op_outcome(kind, OpOutcome::Failure);
			},
		}

		result
	}

	async fn exchange(&self, current: &TokenState) -> Result<TokenState> {
		let form = [
			("grant_type", "refresh_token"),
			("refresh_token", current.refresh_token.expose()),
			("client_id", self.credentials.client_id.as_str()),
			("client_secret", self.credentials.client_secret.expose()),
		];
		let response = self
			.http
			.post(self.token_endpoint.clone())
			.form(&form)
			.timeout(self.request_timeout)
			.send()
			.await
			.map_err(|e| {
				let message = http::describe_transport_error(&e, self.request_timeout);

				Error::authentication_caused_by(format!("Token refresh failed: {message}."), e)
			})?;
		let status = response.status();
		let body = response.bytes().await.map_err(|e| {
			Error::authentication_caused_by("Token refresh response could not be read.", e)
		})?;

		if !status.is_success() {
			return Err(Error::Authentication {
				message: format!(
					"Token refresh failed: HTTP {}: {}.",
					status.as_u16(),
					String::from_utf8_lossy(&body).trim()
				),
				status: Some(status.as_u16()),
				source: None,
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&body);
		let payload: RefreshResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| {
				Error::authentication_caused_by("Token endpoint returned malformed JSON.", e)
			})?;
		let expires_in = payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
		let refresh_token = match payload.refresh_token {
			Some(rotated) => TokenSecret::new(rotated),
			None => current.refresh_token.clone(),
		};

		Ok(TokenState {
			access_token: TokenSecret::new(payload.access_token),
			refresh_token,
			expires_at: unix_now().saturating_add(expires_in),
		})
	}

	async fn persist(&self, state: &TokenState) -> Result<()> {
		let expires_at = state.expires_at.to_string();

		for (key, value) in [
			(self.keys.access_token.as_str(), state.access_token.expose()),
			(self.keys.refresh_token.as_str(), state.refresh_token.expose()),
			(self.keys.expires_at.as_str(), expires_at.as_str()),
		] {
			self.store.set(key, value, &self.scope).await.map_err(|e| {
				Error::authentication_caused_by(
					format!("Failed to update {key} in secret store {}.", self.scope),
					e,
				)
			})?;
		}

		Ok(())
	}

	fn arm_timer(self: &Arc<Self>, state: &TokenState) {
		let delay = proactive_delay(state.expires_in_seconds(), self.refresh_buffer_seconds);
		let weak = Arc::downgrade(self);
		let generation =
			self.schedule.rearm(|generation| tokio::spawn(proactive_task(weak, generation, delay)));

		obs::debug_refresh_scheduled(delay, generation);
	}

	async fn proactive_refresh(self: &Arc<Self>, generation: u64) {
		if !self.schedule.detach(generation) {
			return;
		}

		let mut state = self.state.lock().await;

		// Another refresh completed while this task waited for the lock.
		if !self.schedule.is_current(generation) {
			return;
		}

		if let Err(err) = self.refresh_locked(&mut state, OpKind::ProactiveRefresh).await {
			self.metrics.record_proactive_failure();
			obs::warn_swallowed_failure(OpKind::ProactiveRefresh, &err);

			if let Some(hook) = &self.failure_hook {
				hook(&err);
			}
		}
	}
}
impl Drop for ManagerInner {
	fn drop(&mut self) {
		self.schedule.cancel();
	}
}

fn proactive_delay(expires_in_seconds: i64, refresh_buffer_seconds: i64) -> Duration {
	let lead = expires_in_seconds.saturating_sub(refresh_buffer_seconds).max(0);

	Duration::from_secs(u64::try_from(lead).unwrap_or_default()).max(MIN_PROACTIVE_DELAY)
}

fn proactive_task(manager: Weak<ManagerInner>, generation: u64, delay: Duration) -> TaskFuture {
	Box::pin(async move {
		tokio::time::sleep(delay).await;

		if let Some(manager) = manager.upgrade() {
			manager.proactive_refresh(generation).await;
		}
	})
}

#[derive(Deserialize)]
struct RefreshResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

async fn load_state(
	store: &dyn SecretStore,
	keys: &SecretKeys,
	scope: &SecretScope,
) -> Result<TokenState> {
	let names = [keys.access_token.as_str(), keys.refresh_token.as_str(), keys.expires_at.as_str()];
	let values = store.get(&names, scope).await.map_err(|e| {
		Error::configuration(format!(
			"Failed to load tokens from {scope}: {e} Ensure the project and config exist."
		))
	})?;
	let count = values.len();
	let [access_token, refresh_token, expires_at]: [String; 3] =
		values.try_into().map_err(|_| {
			Error::configuration(format!(
				"Expected 3 token values from {scope}, got {count}; authenticate first."
			))
		})?;
	let expires_at_secs = expires_at.trim().parse::<i64>().map_err(|e| {
		Error::authentication_caused_by(
			format!("Invalid {} format: {expires_at}.", keys.expires_at),
			e,
		)
	})?;

	Ok(TokenState::new(access_token, refresh_token, expires_at_secs))
}
