//! Service client: the dispatcher plus the lazily populated credential cache.

pub mod dispatcher;
pub mod envelope;

mod system;

pub use dispatcher::*;
pub use envelope::*;

// self
use crate::{
	_prelude::*,
	auth::{self, Credential, CredentialCache, CredentialProvider, TokenSecret},
	config::ClientSettings,
	error::ConfigError,
	http::HttpTransport,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Client bound to one service address and one auth mechanism.
///
/// Cloning is cheap; clones share the dispatcher and the credential cache, so a credential
/// acquired through one clone is visible to all of them.
#[derive(Clone, Debug)]
pub struct VaultClient {
	inner: Arc<ClientInner>,
}
#[derive(Debug)]
struct ClientInner {
	dispatcher: Dispatcher,
	credentials: Option<CredentialCache>,
}
impl VaultClient {
	/// Builds a client over a default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn new(settings: ClientSettings) -> Result<Self, ConfigError> {
		Self::with_transport(settings, Arc::new(ReqwestTransport::new()?))
	}

	/// Builds a client over a caller-supplied transport.
	///
	/// The credential provider is selected from `settings.auth`; without a mechanism every
	/// request goes out unauthenticated.
	pub fn with_transport(
		settings: ClientSettings,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		let provider = settings.auth.as_ref().map(auth::provider_for).transpose()?;

		Ok(Self::assemble(settings, transport, provider))
	}

	/// Builds a client whose credentials come from a custom provider.
	pub fn with_provider(
		settings: ClientSettings,
		transport: Arc<dyn HttpTransport>,
		provider: Arc<dyn CredentialProvider>,
	) -> Self {
		Self::assemble(settings, transport, Some(provider))
	}

	fn assemble(
		settings: ClientSettings,
		transport: Arc<dyn HttpTransport>,
		provider: Option<Arc<dyn CredentialProvider>>,
	) -> Self {
		let dispatcher = Dispatcher::new(settings, transport);
		let credentials = provider.map(CredentialCache::new);

		Self { inner: Arc::new(ClientInner { dispatcher, credentials }) }
	}

	/// Settings the client was built with.
	pub fn settings(&self) -> &ClientSettings {
		self.inner.dispatcher.settings()
	}

	/// Underlying dispatcher.
	pub fn dispatcher(&self) -> &Dispatcher {
		&self.inner.dispatcher
	}

	/// Credential cache, when an auth mechanism is configured.
	pub fn credentials(&self) -> Option<&CredentialCache> {
		self.inner.credentials.as_ref()
	}

	/// Returns the current credential, acquiring it on first use.
	pub async fn credential(&self) -> Result<Option<Credential>> {
		match &self.inner.credentials {
			Some(cache) => Ok(Some(cache.credential(&self.inner.dispatcher).await?)),
			None => Ok(None),
		}
	}

	/// Discards the cached credential; the next authenticated request re-acquires it.
	pub fn reset_credential(&self) {
		if let Some(cache) = &self.inner.credentials {
			cache.reset();
		}
	}

	/// Sends `request` and returns the raw success response.
	///
	/// The token is read from the cache at send time, so a concurrent reset only affects
	/// requests that start afterwards.
	pub async fn send_raw(&self, request: &ApiRequest) -> Result<RawResponse> {
		let token = self.token_for(request).await?;

		self.inner.dispatcher.dispatch(request, token.as_ref()).await
	}

	/// Sends `request` and decodes the body as `T`; an empty body yields `None`.
	pub async fn send<T>(&self, request: &ApiRequest) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		self.send_raw(request).await?.json()
	}

	/// `GET path`, decoded as the standard envelope.
	pub async fn read<T>(&self, path: &str) -> Result<Option<VaultResponse<T>>>
	where
		T: DeserializeOwned,
	{
		self.send(&ApiRequest::get(path)).await
	}

	/// `LIST path`, returning the keys. A missing path lists as empty.
	pub async fn list(&self, path: &str) -> Result<Vec<String>> {
		match self.send::<VaultResponse<KeyList>>(&ApiRequest::list(path)).await {
			Ok(envelope) =>
				Ok(envelope.and_then(|envelope| envelope.data).map(|list| list.keys).unwrap_or_default()),
			Err(Error::Api(e)) if e.is_not_found() => Ok(Vec::new()),
			Err(e) => Err(e),
		}
	}

	/// `POST path` with a JSON body.
	pub async fn write<B, T>(&self, path: &str, body: &B) -> Result<Option<VaultResponse<T>>>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send(&ApiRequest::post(path).json(body)?).await
	}

	/// `PATCH path` with a merge-patch body.
	pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<Option<VaultResponse<T>>>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send(&ApiRequest::patch(path).json(body)?).await
	}

	/// `DELETE path`.
	pub async fn delete(&self, path: &str) -> Result<()> {
		self.send_raw(&ApiRequest::delete(path)).await.map(|_| ())
	}

	async fn token_for(&self, request: &ApiRequest) -> Result<Option<TokenSecret>> {
		if request.unauthenticated {
			return Ok(None);
		}
		if let Some(token) = &request.token_override {
			return Ok(Some(token.clone()));
		}

		match &self.inner.credentials {
			Some(cache) => Ok(Some(cache.token(&self.inner.dispatcher).await?)),
			None => Ok(None),
		}
	}
}
