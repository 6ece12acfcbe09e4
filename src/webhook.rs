//! Webhook signature verification and event decoding.

// crates.io
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::_prelude::*;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Jobber-Signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Webhook handling failures.
#[derive(Debug, ThisError)]
pub enum WebhookError {
	/// Signature header is not of the form `sha256=<hex>`.
	#[error("Invalid signature format: expected 'sha256=<hex_digest>', got '{header}'.")]
	InvalidSignatureFormat {
		/// Header value as received.
		header: String,
	},
	/// The webhook secret could not key the MAC.
	#[error("Webhook secret is not usable as an HMAC key.")]
	InvalidSecret,
	/// Payload is not a valid event document.
	#[error("Invalid webhook payload: {source}.")]
	InvalidPayload {
		/// Payload rendered lossily as UTF-8.
		payload: String,
		/// Decoder failure.
		#[source]
		source: serde_json::Error,
	},
}

/// Event topics Jobber delivers.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebhookTopic {
	ClientCreate,
	ClientUpdate,
	ClientDelete,
	QuoteCreate,
	QuoteUpdate,
	QuoteApproved,
	QuoteConverted,
	VisitCreate,
	VisitUpdate,
	VisitComplete,
	VisitDelete,
	InvoiceCreate,
	InvoiceUpdate,
	InvoicePaid,
	InvoiceSent,
	JobCreate,
	JobUpdate,
	JobComplete,
	RequestCreate,
	RequestUpdate,
	RequestApproved,
}
impl WebhookTopic {
	/// Every known topic.
	pub const ALL: [Self; 21] = [
		Self::ClientCreate,
		Self::ClientUpdate,
		Self::ClientDelete,
		Self::QuoteCreate,
		Self::QuoteUpdate,
		Self::QuoteApproved,
		Self::QuoteConverted,
		Self::VisitCreate,
		Self::VisitUpdate,
		Self::VisitComplete,
		Self::VisitDelete,
		Self::InvoiceCreate,
		Self::InvoiceUpdate,
		Self::InvoicePaid,
		Self::InvoiceSent,
		Self::JobCreate,
		Self::JobUpdate,
		Self::JobComplete,
		Self::RequestCreate,
		Self::RequestUpdate,
		Self::RequestApproved,
	];

	/// Wire name, e.g. `quote.approved`.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ClientCreate => "client.create",
			Self::ClientUpdate => "client.update",
			Self::ClientDelete => "client.delete",
			Self::QuoteCreate => "quote.create",
			Self::QuoteUpdate => "quote.update",
			Self::QuoteApproved => "quote.approved",
			Self::QuoteConverted => "quote.converted",
			Self::VisitCreate => "visit.create",
			Self::VisitUpdate => "visit.update",
			Self::VisitComplete => "visit.complete",
			Self::VisitDelete => "visit.delete",
			Self::InvoiceCreate => "invoice.create",
			Self::InvoiceUpdate => "invoice.update",
			Self::InvoicePaid => "invoice.paid",
			Self::InvoiceSent => "invoice.sent",
			Self::JobCreate => "job.create",
			Self::JobUpdate => "job.update",
			Self::JobComplete => "job.complete",
			Self::RequestCreate => "request.create",
			Self::RequestUpdate => "request.update",
			Self::RequestApproved => "request.approved",
		}
	}
}
impl Display for WebhookTopic {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for WebhookTopic {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|topic| topic.as_str() == s)
			.ok_or_else(|| format!("Unknown webhook topic '{s}'."))
	}
}

/// Decoded webhook delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
	/// Topic name as sent, e.g. `invoice.paid`.
	pub event_type: String,
	/// Topic-specific payload.
	#[serde(default)]
	pub data: Value,
	/// Any other top-level fields.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}
impl WebhookEvent {
	/// Known topic for this event, if any.
	pub fn topic(&self) -> Option<WebhookTopic> {
		self.event_type.parse().ok()
	}
}

/// Checks `signature_header` against the HMAC-SHA256 of `payload` keyed by `secret`.
///
/// Returns `Ok(false)` for a well-formed header whose digest does not match. Only the exact
/// lowercase hex rendering produced by [`compute_signature`] is accepted, so uppercase or
/// whitespace-padded digests are mismatches. The comparison runs in constant time.
pub fn verify_signature(
	payload: &[u8],
	signature_header: &str,
	secret: &str,
) -> Result<bool, WebhookError> {
	let digest = signature_header
		.strip_prefix(SIGNATURE_PREFIX)
		.ok_or_else(|| WebhookError::InvalidSignatureFormat { header: signature_header.into() })?;
	if !digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
		return Ok(false);
	}

	let Ok(received) = hex::decode(digest) else {
		return Ok(false);
	};

	Ok(keyed_mac(payload, secret)?.verify_slice(&received).is_ok())
}

/// Renders the signature header value for `payload`.
pub fn compute_signature(payload: &[u8], secret: &str) -> Result<String, WebhookError> {
	let digest = keyed_mac(payload, secret)?.finalize().into_bytes();

	Ok(format!("{SIGNATURE_PREFIX}{}", hex::encode(digest)))
}

/// Decodes a webhook body.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
	serde_json::from_slice(payload).map_err(|source| WebhookError::InvalidPayload {
		payload: String::from_utf8_lossy(payload).into_owned(),
		source,
	})
}

fn keyed_mac(payload: &[u8], secret: &str) -> Result<HmacSha256, WebhookError> {
	let mut mac =
		HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSecret)?;

	mac.update(payload);

	Ok(mac)
}
