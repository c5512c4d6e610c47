//! Issued credential model.

// self
use crate::{_prelude::*, auth::TokenSecret, client::AuthInfo};

/// Token plus whatever lifetime metadata the issuing exchange reported.
///
/// Credentials are never mutated; a refresh produces a new value.
#[derive(Clone)]
pub struct Credential {
	/// Token attached to authenticated requests.
	pub token: TokenSecret,
	/// Token accessor, when the exchange reported one.
	pub accessor: Option<String>,
	/// Policies granted to the token.
	pub policies: Vec<String>,
	/// Whether the token may be renewed.
	pub renewable: bool,
	/// Lease duration; zero means the token never expires.
	pub lease_duration: Duration,
	/// Arbitrary metadata attached by the auth method.
	pub metadata: BTreeMap<String, String>,
	/// Instant the credential was obtained.
	pub acquired_at: OffsetDateTime,
}
impl Credential {
	/// Builds a credential for a pre-issued token with no known metadata.
	pub fn from_token(token: TokenSecret) -> Self {
		Self {
			token,
			accessor: None,
			policies: Vec::new(),
			renewable: false,
			lease_duration: Duration::ZERO,
			metadata: BTreeMap::new(),
			acquired_at: OffsetDateTime::now_utc(),
		}
	}

	/// Converts the `auth` block of a login response; `None` when it carries no usable token.
	pub fn from_auth(auth: AuthInfo) -> Option<Self> {
		let token = auth.client_token.filter(|token| !token.is_blank())?;
		let policies = if auth.policies.is_empty() { auth.token_policies } else { auth.policies };

		Some(Self {
			token,
			accessor: auth.accessor,
			policies,
			renewable: auth.renewable,
			lease_duration: Duration::from_secs(auth.lease_duration),
			metadata: auth.metadata.unwrap_or_default().into_iter().collect(),
			acquired_at: OffsetDateTime::now_utc(),
		})
	}

	/// Returns `true` when the credential reports no lease.
	pub fn is_non_expiring(&self) -> bool {
		self.lease_duration.is_zero()
	}

	/// Expiry instant derived from the lease, if any.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		if self.is_non_expiring() {
			return None;
		}

		let lease = time::Duration::try_from(self.lease_duration).ok()?;

		self.acquired_at.checked_add(lease)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token", &"<redacted>")
			.field("accessor", &self.accessor)
			.field("policies", &self.policies)
			.field("renewable", &self.renewable)
			.field("lease_duration", &self.lease_duration)
			.field("metadata", &self.metadata)
			.field("acquired_at", &self.acquired_at)
			.finish()
	}
}
