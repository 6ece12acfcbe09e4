//! Immutable OAuth token snapshot and its expiry arithmetic.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// One access/refresh token pair plus the absolute instant the access token expires.
///
/// Values are never mutated in place; a refresh produces a brand new state.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
	/// Bearer credential attached to GraphQL requests.
	pub access_token: TokenSecret,
	/// Credential exchanged for a new access token.
	pub refresh_token: TokenSecret,
	/// Expiry instant in UNIX seconds.
	pub expires_at: i64,
}
impl TokenState {
	/// Creates a new snapshot.
	pub fn new(
		access_token: impl Into<TokenSecret>,
		refresh_token: impl Into<TokenSecret>,
		expires_at: i64,
	) -> Self {
		Self { access_token: access_token.into(), refresh_token: refresh_token.into(), expires_at }
	}

	/// Returns `true` if the access token is expired at `now` (UNIX seconds).
	pub fn is_expired_at(&self, now: i64) -> bool {
		now >= self.expires_at
	}

	/// Returns `true` if the access token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(unix_now())
	}

	/// Seconds left before expiry at `now`, never negative.
	pub fn expires_in_seconds_at(&self, now: i64) -> i64 {
		self.expires_at.saturating_sub(now).max(0)
	}

	/// Seconds left before expiry relative to the current clock, never negative.
	pub fn expires_in_seconds(&self) -> i64 {
		self.expires_in_seconds_at(unix_now())
	}

	/// Returns `true` if fewer than `buffer_seconds` remain at `now`.
	pub fn should_refresh_at(&self, buffer_seconds: i64, now: i64) -> bool {
		self.expires_in_seconds_at(now) < buffer_seconds
	}

	/// Returns `true` if fewer than `buffer_seconds` remain relative to the current clock.
	pub fn should_refresh(&self, buffer_seconds: i64) -> bool {
		self.should_refresh_at(buffer_seconds, unix_now())
	}

	/// Expiry as a UTC timestamp, if it is representable.
	pub fn expires_at_utc(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.expires_at).ok()
	}
}
impl Debug for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenState")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

pub(crate) fn unix_now() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp()
}
