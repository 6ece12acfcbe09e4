//! Async Jobber GraphQL client: self-refreshing OAuth tokens mirrored into a secret store,
//! a rate-limit aware request executor, and webhook, schema, photo-note, and web-link helpers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod graphql;
pub mod http;
pub mod introspection;
pub mod links;
pub mod obs;
pub mod photos;
pub mod secret;
pub mod webhook;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::TokenState,
		config::{ClientConfig, ClientConfigBuilder},
		secret::{MemorySecretStore, SecretStore},
	};

	/// Client identifier seeded by [`seeded_secret_store`].
	pub const TEST_CLIENT_ID: &str = "client-test";
	/// Client secret seeded by [`seeded_secret_store`].
	pub const TEST_CLIENT_SECRET: &str = "secret-test";

	/// Returns a config builder whose endpoints point at a mock server rooted at `base`.
	///
	/// Proactive refresh is disabled so tests opt into background timers explicitly.
	pub fn mock_config_builder(base: &str) -> ClientConfigBuilder {
		let base = base.trim_end_matches('/');

		ClientConfig::builder()
			.token_endpoint(format!("{base}/api/oauth/token"))
			.graphql_endpoint(format!("{base}/api/graphql"))
			.proactive_refresh(false)
	}

	/// Builds a ready-to-use config pointing at a mock server rooted at `base`.
	pub fn mock_config(base: &str) -> ClientConfig {
		mock_config_builder(base).build().expect("Mock client config should build successfully.")
	}

	/// Returns the current UNIX timestamp in seconds.
	pub fn unix_now() -> i64 {
		OffsetDateTime::now_utc().unix_timestamp()
	}

	/// Creates an in-memory secret store holding client credentials plus the provided token.
	pub async fn seeded_secret_store(config: &ClientConfig, token: &TokenState) -> MemorySecretStore {
		let store = MemorySecretStore::default();
		let scope = &config.scope;
		let keys = &config.keys;
		let expires_at = token.expires_at.to_string();

		for (key, value) in [
			(keys.client_id.as_str(), TEST_CLIENT_ID),
			(keys.client_secret.as_str(), TEST_CLIENT_SECRET),
			(keys.access_token.as_str(), token.access_token.expose()),
			(keys.refresh_token.as_str(), token.refresh_token.expose()),
			(keys.expires_at.as_str(), expires_at.as_str()),
		] {
			store.set(key, value, scope).await.expect("Seeding the memory secret store should succeed.");
		}

		store.reset_write_count();

		store
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::{Arc, Weak},
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
