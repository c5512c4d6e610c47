mod common;

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use tokio::time::{self, Instant};
// self
use common::*;
use vault_session::{
	RenewalOptions, RenewalState, RenewalSupervisor,
	client::TokenLookup,
	error::{ConfigError, Error},
	renewal::RenewalObserver,
};

#[derive(Default)]
struct CountingObserver {
	renewed: AtomicUsize,
	failed: AtomicUsize,
}
impl RenewalObserver for CountingObserver {
	fn on_renewed(&self, _lookup: &TokenLookup) {
		self.renewed.fetch_add(1, Ordering::SeqCst);
	}

	fn on_failure(&self, _error: &Error) {
		self.failed.fetch_add(1, Ordering::SeqCst);
	}
}

fn transport(lookups: &[(u16, String)]) -> Arc<FakeTransport> {
	let transport = FakeTransport::new().reply(APPROLE_LOGIN, 200, &login_body("s.issued", 3600));
	let transport = lookups
		.iter()
		.fold(transport, |transport, (status, body)| transport.reply(LOOKUP_SELF, *status, body));

	Arc::new(transport)
}

async fn start(transport: &Arc<FakeTransport>, options: RenewalOptions) -> RenewalSupervisor {
	RenewalSupervisor::start(client(approle_settings(), transport), options)
		.await
		.expect("Supervisor should start.")
}

#[tokio::test(start_paused = true)]
async fn non_expiring_token_leaves_supervisor_idle() {
	let transport = transport(&[(200, lookup_body(0))]);
	let supervisor = start(&transport, RenewalOptions::default()).await;

	assert_eq!(supervisor.state(), RenewalState::Idle);

	time::sleep(Duration::from_secs(86_400)).await;

	assert_eq!(transport.hits(LOOKUP_SELF), 1);
	assert_eq!(transport.hits(APPROLE_LOGIN), 1);
}

#[tokio::test(start_paused = true)]
async fn timer_fires_at_factor_of_lifetime_and_rearms() {
	let transport = transport(&[(200, lookup_body(3600))]);
	let started = Instant::now();
	let supervisor = start(&transport, RenewalOptions::default()).await;

	assert_eq!(
		supervisor.state(),
		RenewalState::Armed {
			due_at: started + Duration::from_secs(3240),
			delay: Duration::from_secs(3240)
		}
	);

	time::sleep(Duration::from_secs(3239)).await;

	assert_eq!(transport.hits(LOOKUP_SELF), 1);

	time::sleep(Duration::from_secs(2)).await;

	assert_eq!(transport.hits(LOOKUP_SELF), 2);
	assert_eq!(transport.hits(APPROLE_LOGIN), 2);
	assert_eq!(
		supervisor.state(),
		RenewalState::Armed {
			due_at: started + Duration::from_secs(6480),
			delay: Duration::from_secs(3240)
		}
	);
	assert_eq!(supervisor.credentials().map(|cache| cache.metrics().resets()), Some(1));
}

#[tokio::test(start_paused = true)]
async fn failed_renewal_retries_after_backoff() {
	let transport =
		transport(&[(200, lookup_body(100)), (500, "{}".into()), (200, lookup_body(100))]);
	let observer = Arc::new(CountingObserver::default());
	let options = RenewalOptions::default()
		.with_failure_backoff(Some(Duration::from_secs(30)))
		.with_observer(observer.clone());
	let supervisor = start(&transport, options).await;

	time::sleep(Duration::from_secs(91)).await;

	assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
	assert!(matches!(
		supervisor.state(),
		RenewalState::Armed { delay, .. } if delay == Duration::from_secs(30)
	));

	time::sleep(Duration::from_secs(30)).await;

	assert_eq!(observer.renewed.load(Ordering::SeqCst), 1);
	assert_eq!(transport.hits(LOOKUP_SELF), 3);
	assert!(matches!(
		supervisor.state(),
		RenewalState::Armed { delay, .. } if delay == Duration::from_secs(90)
	));
}

#[tokio::test(start_paused = true)]
async fn failed_renewal_without_backoff_parks_idle() {
	let transport = transport(&[(200, lookup_body(100)), (503, "{}".into())]);
	let supervisor =
		start(&transport, RenewalOptions::default().with_failure_backoff(None)).await;

	time::sleep(Duration::from_secs(91)).await;

	assert_eq!(supervisor.state(), RenewalState::Idle);

	time::sleep(Duration::from_secs(3600)).await;

	assert_eq!(transport.hits(LOOKUP_SELF), 2);
}

#[tokio::test(start_paused = true)]
async fn dispose_is_idempotent_and_final() {
	let transport = transport(&[(200, lookup_body(3600))]);
	let supervisor = start(&transport, RenewalOptions::default()).await;

	supervisor.dispose();
	supervisor.dispose();

	assert_eq!(supervisor.state(), RenewalState::Disposed);

	time::sleep(Duration::from_secs(7200)).await;

	assert_eq!(transport.hits(LOOKUP_SELF), 1);
	assert_eq!(
		supervisor.renew_now().await.expect("Renewing a disposed supervisor is a no-op."),
		RenewalState::Disposed
	);
	assert_eq!(transport.hits(LOOKUP_SELF), 1);
}

fn slow_transport() -> Arc<FakeTransport> {
	Arc::new(
		FakeTransport::new()
			.with_latency(Duration::from_secs(1))
			.reply(APPROLE_LOGIN, 200, &login_body("s.issued", 3600))
			.reply(LOOKUP_SELF, 200, &lookup_body(100)),
	)
}

#[tokio::test(start_paused = true)]
async fn dispose_during_renewal_stops_further_requests() {
	let transport = slow_transport();
	let supervisor = start(&transport, RenewalOptions::default()).await;

	// Armed for 90 s; the renewal login is in flight half a second after the fire.
	time::sleep(Duration::from_millis(90_500)).await;

	assert_eq!(supervisor.state(), RenewalState::Renewing);
	assert_eq!(transport.hits(APPROLE_LOGIN), 2);

	supervisor.dispose();
	supervisor.dispose();
	time::sleep(Duration::from_secs(300)).await;

	assert_eq!(supervisor.state(), RenewalState::Disposed);
	assert_eq!(transport.hits(APPROLE_LOGIN), 2);
	assert_eq!(transport.hits(LOOKUP_SELF), 1);
}

#[tokio::test(start_paused = true)]
async fn renew_now_during_renewal_does_not_start_another() {
	let transport = slow_transport();
	let supervisor = start(&transport, RenewalOptions::default()).await;

	time::sleep(Duration::from_millis(90_500)).await;

	assert_eq!(
		supervisor.renew_now().await.expect("Renewal in flight should not fail the caller."),
		RenewalState::Renewing
	);

	time::sleep(Duration::from_secs(10)).await;

	assert_eq!(transport.hits(APPROLE_LOGIN), 2);
	assert_eq!(transport.hits(LOOKUP_SELF), 2);
	assert!(matches!(
		supervisor.state(),
		RenewalState::Armed { delay, .. } if delay == Duration::from_secs(90)
	));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_supervisor_cancels_the_timer() {
	let transport = transport(&[(200, lookup_body(60))]);

	drop(start(&transport, RenewalOptions::default()).await);
	time::sleep(Duration::from_secs(600)).await;

	assert_eq!(transport.hits(LOOKUP_SELF), 1);
}

#[tokio::test(start_paused = true)]
async fn renew_now_replaces_the_armed_timer() {
	let transport = transport(&[(200, lookup_body(3600))]);
	let started = Instant::now();
	let supervisor = start(&transport, RenewalOptions::default()).await;

	time::sleep(Duration::from_secs(100)).await;

	let state = supervisor.renew_now().await.expect("Manual renewal should succeed.");

	assert_eq!(
		state,
		RenewalState::Armed {
			due_at: started + Duration::from_secs(3340),
			delay: Duration::from_secs(3240)
		}
	);

	time::sleep(Duration::from_secs(3200)).await;

	assert_eq!(transport.hits(LOOKUP_SELF), 2);
}

#[tokio::test(start_paused = true)]
async fn start_surfaces_initial_lookup_failure() {
	let transport = transport(&[(403, r#"{"errors":["permission denied"]}"#.into())]);
	let err = RenewalSupervisor::start(client(approle_settings(), &transport), Default::default())
		.await
		.expect_err("Initial lookup failure must be returned.");

	assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn start_rejects_out_of_range_factor() {
	let transport = transport(&[(200, lookup_body(60))]);
	let err = RenewalSupervisor::start(
		client(approle_settings(), &transport),
		RenewalOptions::default().with_factor(1.5),
	)
	.await
	.expect_err("Factor above one must be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::InvalidRenewalFactor { .. })));
	assert_eq!(transport.hits(LOOKUP_SELF), 0);
}
