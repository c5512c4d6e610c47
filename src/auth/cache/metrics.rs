// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for credential exchanges.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	resets: AtomicU64,
}
impl CacheMetrics {
	/// Returns the number of provider exchanges started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of exchanges that produced a credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns how many times the cache was reset.
	pub fn resets(&self) -> u64 {
		self.resets.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reset(&self) {
		self.resets.fetch_add(1, Ordering::Relaxed);
	}
}
