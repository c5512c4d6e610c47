//! Lazy, single-flight credential cache.
//!
//! The cache holds one generation at a time: an [`OnceCell`] that is filled by the first caller
//! to ask for a credential. Concurrent callers await the same initialization instead of
//! running their own exchange. [`CredentialCache::reset`] swaps in an empty generation; callers
//! that already hold the old token keep using it, and the next caller starts one new exchange.
//! Exchanges from different generations never overlap; a reset during a slow exchange queues
//! the next one behind it.

mod metrics;

pub use metrics::CacheMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialProvider, TokenSecret},
	client::Dispatcher,
};

type Generation = Arc<OnceCell<Credential>>;

/// Memoizes the credential produced by a [`CredentialProvider`].
pub struct CredentialCache {
	provider: Arc<dyn CredentialProvider>,
	slot: Mutex<Generation>,
	exchange: AsyncMutex<()>,
	metrics: CacheMetrics,
}
impl CredentialCache {
	/// Creates an empty cache around `provider`.
	pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
		Self {
			provider,
			slot: Mutex::new(Arc::new(OnceCell::new())),
			exchange: AsyncMutex::new(()),
			metrics: Default::default(),
		}
	}

	/// Returns the cached credential, running the provider exchange if the slot is empty.
	///
	/// A failed exchange leaves the slot empty so the next caller tries again.
	pub async fn credential(&self, dispatcher: &Dispatcher) -> Result<Credential> {
		let generation = self.slot.lock().clone();
		let credential = generation
			.get_or_try_init(|| async {
				let _exchange = self.exchange.lock().await;

				self.metrics.record_attempt();

				match self.provider.acquire(dispatcher).await {
					Ok(credential) => {
						self.metrics.record_success();

						Ok(credential)
					},
					Err(err) => {
						self.metrics.record_failure();

						Err(err)
					},
				}
			})
			.await?;

		Ok(credential.clone())
	}

	/// Returns the cached token, acquiring it first when needed.
	pub async fn token(&self, dispatcher: &Dispatcher) -> Result<TokenSecret> {
		Ok(self.credential(dispatcher).await?.token)
	}

	/// Returns the current credential without triggering an exchange.
	pub fn current(&self) -> Option<Credential> {
		self.slot.lock().get().cloned()
	}

	/// Discards the memoized credential; the next access starts a new exchange.
	pub fn reset(&self) {
		*self.slot.lock() = Arc::new(OnceCell::new());

		self.metrics.record_reset();
	}

	/// Label of the mechanism backing this cache.
	pub fn mechanism(&self) -> &'static str {
		self.provider.mechanism()
	}

	/// Exchange counters for this cache.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.metrics
	}
}
impl Debug for CredentialCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialCache")
			.field("mechanism", &self.provider.mechanism())
			.field("populated", &self.slot.lock().is_initialized())
			.field("metrics", &self.metrics)
			.finish()
	}
}
