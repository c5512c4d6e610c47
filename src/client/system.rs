//! Bootstrap endpoints the client itself depends on.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	client::{ApiRequest, AuthInfo, InitStatus, TokenLookup, VaultClient, VaultResponse},
};

const LOOKUP_SELF: &str = "auth/token/lookup-self";
const RENEW_SELF: &str = "auth/token/renew-self";
const INIT: &str = "sys/init";
const UNWRAP: &str = "sys/wrapping/unwrap";

#[derive(Serialize)]
struct RenewBody<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	increment: Option<&'a str>,
}

impl VaultClient {
	/// Looks up the calling token, acquiring a credential first when needed.
	pub async fn lookup_self(&self) -> Result<TokenLookup> {
		self.send::<VaultResponse<TokenLookup>>(&ApiRequest::get(LOOKUP_SELF))
			.await?
			.and_then(|envelope| envelope.data)
			.ok_or_else(|| Error::MissingData { path: LOOKUP_SELF.into() })
	}

	/// Extends the calling token's lease, optionally requesting `increment` (e.g. `"1h"`).
	pub async fn renew_self(&self, increment: Option<&str>) -> Result<AuthInfo> {
		let request = ApiRequest::post(RENEW_SELF).json(&RenewBody { increment })?;

		self.send::<VaultResponse<serde::de::IgnoredAny>>(&request)
			.await?
			.and_then(|envelope| envelope.auth)
			.ok_or_else(|| Error::MissingData { path: RENEW_SELF.into() })
	}

	/// Reports whether the service has been initialized. Sent without credentials.
	pub async fn is_initialized(&self) -> Result<bool> {
		let status =
			self.send::<InitStatus>(&ApiRequest::get(INIT).unauthenticated()).await?.unwrap_or_default();

		Ok(status.initialized)
	}

	/// Unwraps a response-wrapped payload, authenticating with the wrapping token itself.
	pub async fn unwrap<T>(&self, wrapping_token: TokenSecret) -> Result<VaultResponse<T>>
	where
		T: DeserializeOwned,
	{
		self.send::<VaultResponse<T>>(&ApiRequest::post(UNWRAP).with_token(wrapping_token))
			.await?
			.ok_or_else(|| Error::MissingData { path: UNWRAP.into() })
	}
}
