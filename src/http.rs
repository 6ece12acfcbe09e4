//! Shared reqwest transport for token refreshes and GraphQL requests.

// std
use std::ops::Deref;
// crates.io
use reqwest::redirect::Policy;
// self
use crate::_prelude::*;

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Neither the token endpoint nor the GraphQL endpoint is expected to redirect, so clients
/// built here never follow redirects. Custom clients passed to
/// [`with_client`](ReqwestHttpClient::with_client) should be configured the same way.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose requests are bounded by `timeout`.
	pub fn with_timeout(timeout: Duration) -> Result<Self> {
		ReqwestClient::builder()
			.timeout(timeout)
			.redirect(Policy::none())
			.build()
			.map(Self)
			.map_err(|e| Error::configuration(format!("HTTP client could not be constructed: {e}.")))
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Renders a transport failure the way callers expect to read it.
pub(crate) fn describe_transport_error(err: &ReqwestError, timeout: Duration) -> String {
	if err.is_timeout() {
		format!("Request timeout after {} seconds", timeout.as_secs())
	} else if err.is_connect() {
		format!("Connection failed: {err}")
	} else {
		format!("HTTP request failed: {err}")
	}
}
