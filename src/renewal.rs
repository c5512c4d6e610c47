//! Periodic renewal supervisor.
//!
//! The supervisor asks the service how long the current token lives, arms one timer at
//! `lifetime × factor`, and on expiry drops the cached credential and looks it up again, which
//! re-acquires it through the client's credential cache. A non-expiring token parks the
//! supervisor in [`RenewalState::Idle`]. Every transition happens under one mutex, and disposal
//! is terminal. Each transition bumps a generation counter; a renewal checks its generation
//! before every request, so a disposed or superseded renewal stops sending.

// std
use std::ops::Deref;
// crates.io
use tokio::{task::JoinHandle, time::Instant};
// self
use crate::{
	_prelude::*,
	client::{TokenLookup, VaultClient},
	error::ConfigError,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Receives renewal outcomes. Both callbacks default to no-ops.
pub trait RenewalObserver
where
	Self: Send + Sync,
{
	/// Called after a successful renewal with the fresh lookup.
	fn on_renewed(&self, lookup: &TokenLookup) {
		let _ = lookup;
	}

	/// Called when a renewal attempt fails. The failure is not propagated from timer fires.
	fn on_failure(&self, error: &Error) {
		let _ = error;
	}
}

/// Tunables for [`RenewalSupervisor`].
#[derive(Clone)]
pub struct RenewalOptions {
	/// Fraction of the remaining lifetime to wait before renewing; within `(0, 1]`.
	pub factor: f64,
	/// Delay before retrying after a failed renewal; `None` parks the supervisor in `Idle`.
	pub failure_backoff: Option<Duration>,
	/// Optional outcome observer.
	pub observer: Option<Arc<dyn RenewalObserver>>,
}
impl RenewalOptions {
	/// Default renewal factor.
	pub const DEFAULT_FACTOR: f64 = 0.9;
	/// Default retry delay after a failed renewal.
	pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(30);

	/// Overrides the renewal factor.
	pub fn with_factor(mut self, factor: f64) -> Self {
		self.factor = factor;

		self
	}

	/// Overrides the failure backoff.
	pub fn with_failure_backoff(mut self, backoff: Option<Duration>) -> Self {
		self.failure_backoff = backoff;

		self
	}

	/// Installs an observer.
	pub fn with_observer(mut self, observer: Arc<dyn RenewalObserver>) -> Self {
		self.observer = Some(observer);

		self
	}

	/// Delay before the next renewal for `lookup`, or `None` for a non-expiring token.
	pub fn delay_for(&self, lookup: &TokenLookup) -> Option<Duration> {
		if lookup.is_non_expiring() {
			return None;
		}

		let millis = (lookup.ttl as f64 * self.factor * 1_000.).round() as u64;

		Some(Duration::from_millis(millis))
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.factor > 0. && self.factor <= 1. {
			Ok(())
		} else {
			Err(ConfigError::InvalidRenewalFactor { factor: self.factor })
		}
	}
}
impl Default for RenewalOptions {
	fn default() -> Self {
		Self {
			factor: Self::DEFAULT_FACTOR,
			failure_backoff: Some(Self::DEFAULT_FAILURE_BACKOFF),
			observer: None,
		}
	}
}
impl Debug for RenewalOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RenewalOptions")
			.field("factor", &self.factor)
			.field("failure_backoff", &self.failure_backoff)
			.field("observer_set", &self.observer.is_some())
			.finish()
	}
}

/// Observable supervisor state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewalState {
	/// No timer armed: the token never expires, or the last renewal failed without backoff.
	Idle,
	/// A timer is armed.
	Armed {
		/// Instant the timer fires.
		due_at: Instant,
		/// Delay the timer was armed with.
		delay: Duration,
	},
	/// A renewal is in flight.
	Renewing,
	/// Terminal; no further renewals happen.
	Disposed,
}

/// Keeps the client's credential fresh by renewing it ahead of expiry.
///
/// Dereferences to the wrapped [`VaultClient`]. Dropping the supervisor disposes it.
pub struct RenewalSupervisor {
	shared: Arc<Shared>,
}
impl RenewalSupervisor {
	/// Looks up the current token once and arms the first timer.
	///
	/// Errors from the initial lookup are returned, since the client has no usable credential.
	pub async fn start(client: VaultClient, options: RenewalOptions) -> Result<Self> {
		options.validate()?;

		let lookup = client.lookup_self().await?;
		let shared = Arc::new(Shared {
			client,
			options,
			control: Mutex::new(Control { state: RenewalState::Idle, timer: None, generation: 0 }),
		});

		shared.arm(0, shared.options.delay_for(&lookup));

		Ok(Self { shared })
	}

	/// Current state.
	pub fn state(&self) -> RenewalState {
		self.shared.control.lock().state
	}

	/// Wrapped client.
	pub fn client(&self) -> &VaultClient {
		&self.shared.client
	}

	/// Renews immediately, replacing any armed timer, and returns the resulting state.
	///
	/// Unlike timer fires, a failed renewal is returned to the caller; the failure backoff still
	/// applies. A disposed supervisor does nothing, and while a renewal is already in flight
	/// this returns [`RenewalState::Renewing`] without starting another.
	pub async fn renew_now(&self) -> Result<RenewalState> {
		let generation = {
			let mut control = self.shared.control.lock();

			match control.state {
				RenewalState::Disposed | RenewalState::Renewing => return Ok(control.state),
				RenewalState::Idle | RenewalState::Armed { .. } => (),
			}
			if let Some(timer) = control.timer.take() {
				timer.abort();
			}

			control.generation += 1;
			control.state = RenewalState::Renewing;

			control.generation
		};

		self.shared.renew(generation).await?;

		Ok(self.state())
	}

	/// Cancels any armed timer and stops renewing. Idempotent.
	pub fn dispose(&self) {
		self.shared.dispose();
	}
}
impl Deref for RenewalSupervisor {
	type Target = VaultClient;

	fn deref(&self) -> &Self::Target {
		&self.shared.client
	}
}
impl Drop for RenewalSupervisor {
	fn drop(&mut self) {
		self.shared.dispose();
	}
}
impl Debug for RenewalSupervisor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RenewalSupervisor")
			.field("state", &self.state())
			.field("options", &self.shared.options)
			.finish()
	}
}

struct Shared {
	client: VaultClient,
	options: RenewalOptions,
	control: Mutex<Control>,
}
impl Shared {
	/// Replaces the armed timer if `generation` is still current. `None`, or a delay past the
	/// clock's range, parks the supervisor in `Idle`.
	fn arm(self: &Arc<Self>, generation: u64, delay: Option<Duration>) {
		let mut control = self.control.lock();

		if control.generation != generation || control.state == RenewalState::Disposed {
			return;
		}
		if let Some(timer) = control.timer.take() {
			timer.abort();
		}

		control.generation += 1;

		let Some((delay, due_at)) =
			delay.and_then(|delay| Some((delay, Instant::now().checked_add(delay)?)))
		else {
			control.state = RenewalState::Idle;

			obs::debug(OpKind::Renewal, "No renewal delay; supervisor parked.");

			return;
		};
		let generation = control.generation;
		let weak = Arc::downgrade(self);

		control.timer = Some(tokio::spawn(async move {
			tokio::time::sleep_until(due_at).await;

			if let Some(shared) = weak.upgrade() {
				shared.fire(generation).await;
			}
		}));
		control.state = RenewalState::Armed { due_at, delay };
	}

	async fn fire(self: &Arc<Self>, generation: u64) {
		{
			let mut control = self.control.lock();

			if control.generation != generation
				|| !matches!(control.state, RenewalState::Armed { .. })
			{
				return;
			}

			// The running task owns this handle; detach it instead of aborting itself.
			control.timer = None;
			control.state = RenewalState::Renewing;
		}

		let _ = self.renew(generation).await;
	}

	fn is_current(&self, generation: u64) -> bool {
		let control = self.control.lock();

		control.generation == generation && control.state == RenewalState::Renewing
	}

	/// Runs one renewal for `generation`. Returns `Ok(None)` once that generation is superseded.
	async fn renew(self: &Arc<Self>, generation: u64) -> Result<Option<TokenLookup>> {
		const KIND: OpKind = OpKind::Renewal;

		let span = OpSpan::new(KIND, "renew");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result: Result<Option<TokenLookup>> = span
			.instrument(async {
				if !self.is_current(generation) {
					return Ok(None);
				}

				self.client.reset_credential();
				self.client.credential().await?;

				if !self.is_current(generation) {
					return Ok(None);
				}

				self.client.lookup_self().await.map(Some)
			})
			.await;

		match &result {
			Ok(None) => {
				obs::debug(KIND, "Renewal superseded; no further requests sent.");
			},
			Ok(Some(lookup)) => {
				obs::record_op_outcome(KIND, OpOutcome::Success);

				if let Some(observer) = &self.options.observer {
					observer.on_renewed(lookup);
				}

				self.arm(generation, self.options.delay_for(lookup));
			},
			Err(e) => {
				obs::record_op_outcome(KIND, OpOutcome::Failure);
				obs::warn(KIND, "Token renewal failed.", e);

				if let Some(observer) = &self.options.observer {
					observer.on_failure(e);
				}

				self.arm(generation, self.options.failure_backoff);
			},
		}

		result
	}

	fn dispose(&self) {
		let mut control = self.control.lock();

		if control.state == RenewalState::Disposed {
			return;
		}

		control.state = RenewalState::Disposed;
		control.generation += 1;

		if let Some(timer) = control.timer.take() {
			timer.abort();
		}
	}
}

struct Control {
	state: RenewalState,
	timer: Option<JoinHandle<()>>,
	generation: u64,
}
