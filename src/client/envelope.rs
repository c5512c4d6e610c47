//! Response envelope shared by every endpoint, plus the bootstrap payloads the client reads.

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Standard success envelope.
///
/// Every field is optional on the wire; endpoint-specific payloads live in `data`.
#[derive(Clone, Debug, Deserialize)]
pub struct VaultResponse<T> {
	/// Request identifier assigned by the service.
	#[serde(default)]
	pub request_id: Option<String>,
	/// Lease identifier for dynamic secrets.
	#[serde(default)]
	pub lease_id: Option<String>,
	/// Whether the lease may be renewed.
	#[serde(default)]
	pub renewable: Option<bool>,
	/// Lease duration in seconds.
	#[serde(default)]
	pub lease_duration: Option<u64>,
	/// Endpoint payload.
	pub data: Option<T>,
	/// Present when the response was wrapped instead of returned directly.
	#[serde(default)]
	pub wrap_info: Option<WrapInfo>,
	/// Warnings attached to an otherwise successful response.
	#[serde(default)]
	pub warnings: Option<Vec<String>>,
	/// Populated by login and token endpoints.
	#[serde(default)]
	pub auth: Option<AuthInfo>,
}
impl<T> VaultResponse<T> {
	/// Lease duration as a [`Duration`], zero when absent.
	pub fn lease(&self) -> Duration {
		Duration::from_secs(self.lease_duration.unwrap_or_default())
	}
}

/// Response-wrapping metadata.
#[derive(Clone, Debug, Deserialize)]
pub struct WrapInfo {
	/// Single-use wrapping token.
	pub token: TokenSecret,
	/// Accessor of the wrapping token.
	#[serde(default)]
	pub accessor: Option<String>,
	/// Wrapping TTL in seconds.
	#[serde(default)]
	pub ttl: u64,
	/// RFC 3339 creation timestamp.
	#[serde(default)]
	pub creation_time: Option<String>,
	/// Path that produced the wrapped response.
	#[serde(default)]
	pub creation_path: Option<String>,
}
impl WrapInfo {
	/// Parses [`WrapInfo::creation_time`], ignoring malformed values.
	pub fn created_at(&self) -> Option<OffsetDateTime> {
		self.creation_time.as_deref().and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
	}
}

/// `auth` block returned by credential exchanges.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthInfo {
	/// Issued token.
	pub client_token: Option<TokenSecret>,
	/// Token accessor.
	pub accessor: Option<String>,
	/// Policies attached to the token.
	pub policies: Vec<String>,
	/// Policies attached directly to the token (excluding identity policies).
	pub token_policies: Vec<String>,
	/// Auth-method metadata.
	pub metadata: Option<HashMap<String, String>>,
	/// Lease duration in seconds; zero for non-expiring tokens.
	pub lease_duration: u64,
	/// Whether the token may be renewed.
	pub renewable: bool,
}

/// Subset of `auth/token/lookup-self` consumed by the client.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenLookup {
	/// Token accessor.
	pub accessor: Option<String>,
	/// Display name of the token.
	pub display_name: Option<String>,
	/// Policies attached to the token.
	pub policies: Vec<String>,
	/// Remaining lifetime in seconds; zero means the token never expires.
	pub ttl: u64,
	/// Lifetime the token was created with, in seconds.
	pub creation_ttl: u64,
	/// Whether the token may be renewed.
	pub renewable: bool,
	/// RFC 3339 expiry, when the token expires.
	pub expire_time: Option<String>,
	/// Token metadata.
	pub meta: Option<HashMap<String, String>>,
}
impl TokenLookup {
	/// Remaining lifetime as a [`Duration`].
	pub fn lifetime(&self) -> Duration {
		Duration::from_secs(self.ttl)
	}

	/// Returns `true` when the token never expires.
	pub fn is_non_expiring(&self) -> bool {
		self.ttl == 0
	}
}

/// Payload of `sys/init`.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct InitStatus {
	/// Whether the service has been initialized.
	#[serde(default)]
	pub initialized: bool,
}

/// Payload of `LIST` endpoints.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct KeyList {
	/// Keys directly under the listed path; folders end with `/`.
	#[serde(default)]
	pub keys: Vec<String>,
}
