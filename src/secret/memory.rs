//! Thread-safe in-memory [`SecretStore`] implementation for local development and tests.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	secret::{SecretFuture, SecretScope, SecretStore, SecretStoreError},
};

type SecretMap = Arc<RwLock<HashMap<(SecretScope, String), String>>>;

/// Keeps secrets in-process; clones share the same backing map.
#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore {
	secrets: SecretMap,
	failing_keys: Arc<Mutex<HashSet<String>>>,
	writes: Arc<AtomicUsize>,
}
impl MemorySecretStore {
	/// Returns the stored value for `key`, if any.
	pub fn value(&self, key: &str, scope: &SecretScope) -> Option<String> {
		self.secrets.read().get(&(scope.clone(), key.to_owned())).cloned()
	}

	/// Removes `key` from `scope`.
	pub fn remove(&self, key: &str, scope: &SecretScope) -> Option<String> {
		self.secrets.write().remove(&(scope.clone(), key.to_owned()))
	}

	/// Makes every subsequent `set` for `key` fail.
	pub fn fail_writes_for(&self, key: impl Into<String>) {
		self.failing_keys.lock().insert(key.into());
	}

	/// Number of successful `set` calls since creation or the last reset.
	pub fn write_count(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	/// Resets the write counter.
	pub fn reset_write_count(&self) {
		self.writes.store(0, Ordering::SeqCst);
	}
}
impl SecretStore for MemorySecretStore {
	fn get<'a>(
		&'a self,
		keys: &'a [&'a str],
		scope: &'a SecretScope,
	) -> SecretFuture<'a, Vec<String>> {
		Box::pin(async move {
			let guard = self.secrets.read();

			Ok(keys
				.iter()
				.filter_map(|key| guard.get(&(scope.clone(), (*key).to_owned())).cloned())
				.collect())
		})
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		scope: &'a SecretScope,
	) -> SecretFuture<'a, ()> {
		Box::pin(async move {
			if self.failing_keys.lock().contains(key) {
				return Err(SecretStoreError::Backend {
					message: format!("write to {key} rejected"),
				});
			}

			self.secrets.write().insert((scope.clone(), key.to_owned()), value.to_owned());
			self.writes.fetch_add(1, Ordering::SeqCst);

			Ok(())
		})
	}
}
