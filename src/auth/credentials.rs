//! OAuth client credentials.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::SecretKeys,
	secret::{SecretScope, SecretStore},
};

/// Client identifier and secret used for refresh grants; immutable once loaded.
#[derive(Clone)]
pub struct ClientCredentials {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Wraps an identifier/secret pair.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<TokenSecret>) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into() }
	}

	/// Loads both values from the secret store; anything other than exactly two values is a
	/// configuration error.
	pub async fn load(
		store: &dyn SecretStore,
		keys: &SecretKeys,
		scope: &SecretScope,
	) -> Result<Self> {
		let names = [keys.client_id.as_str(), keys.client_secret.as_str()];
		let values = store.get(&names, scope).await.map_err(|e| {
			Error::configuration(format!("Failed to load client credentials from {scope}: {e}"))
		})?;
		let [client_id, client_secret]: [String; 2] = values.try_into().map_err(|_| {
			Error::configuration(format!(
				"Expected {} and {} in {scope}; add the client credentials first.",
				keys.client_id, keys.client_secret
			))
		})?;

		Ok(Self::new(client_id, client_secret))
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}
