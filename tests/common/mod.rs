//! Shared fixtures for integration tests: a scripted, recording transport.

#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	sync::Arc,
	time::Duration,
};
// crates.io
use http::HeaderMap;
use parking_lot::Mutex;
// self
use vault_session::{
	AuthMechanism, ClientSettings, VaultClient,
	error::TransportError,
	http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
};

pub const ADDRESS: &str = "http://127.0.0.1:8200";
pub const APPROLE_LOGIN: &str = "auth/approle/login";
pub const LOOKUP_SELF: &str = "auth/token/lookup-self";

/// One request as the transport saw it.
#[derive(Clone, Debug)]
pub struct Recorded {
	pub method: String,
	pub path: String,
	pub headers: HeaderMap,
	pub body: Vec<u8>,
}

/// Replies from per-path queues; the last reply of a queue repeats. Unknown paths get a 404.
#[derive(Default)]
pub struct FakeTransport {
	routes: Mutex<HashMap<String, VecDeque<(u16, String)>>>,
	requests: Mutex<Vec<Recorded>>,
	latency: Option<Duration>,
}
impl FakeTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Delays every reply, so concurrent callers overlap.
	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);

		self
	}

	/// Queues a reply for `path`.
	pub fn reply(self, path: &str, status: u16, body: &str) -> Self {
		self.routes.lock().entry(path.to_owned()).or_default().push_back((status, body.to_owned()));

		self
	}

	pub fn requests(&self) -> Vec<Recorded> {
		self.requests.lock().clone()
	}

	pub fn hits(&self, path: &str) -> usize {
		self.requests.lock().iter().filter(|r| r.path == path).count()
	}

	fn next_reply(&self, path: &str) -> (u16, String) {
		let mut routes = self.routes.lock();

		match routes.get_mut(path) {
			Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
			Some(queue) => queue.front().cloned().unwrap_or_default(),
			None => (404, r#"{"errors":[]}"#.to_owned()),
		}
	}
}
impl HttpTransport for FakeTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let path = request
				.uri()
				.path()
				.trim_start_matches('/')
				.trim_start_matches("v1/")
				.to_owned();

			self.requests.lock().push(Recorded {
				method: request.method().as_str().to_owned(),
				path: path.clone(),
				headers: request.headers().clone(),
				body: request.body().clone(),
			});

			if let Some(latency) = self.latency {
				tokio::time::sleep(latency).await;
			}

			let (status, body) = self.next_reply(&path);
			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() = http::StatusCode::from_u16(status)
				.map_err(|e| TransportError::network(http::Error::from(e)))?;

			Ok(response)
		})
	}
}

pub fn login_body(token: &str, lease: u64) -> String {
	format!(
		r#"{{"auth":{{"client_token":"{token}","accessor":"acc-{token}","policies":["default"],"lease_duration":{lease},"renewable":true}}}}"#
	)
}

pub fn lookup_body(ttl: u64) -> String {
	format!(r#"{{"data":{{"ttl":{ttl},"renewable":true,"policies":["default"]}}}}"#)
}

pub fn approle_settings() -> ClientSettings {
	ClientSettings::builder(ADDRESS)
		.auth(AuthMechanism::app_role("role-1", Some("secret-1".into())))
		.build()
		.expect("AppRole settings fixture should build.")
}

pub fn client(settings: ClientSettings, transport: &Arc<FakeTransport>) -> VaultClient {
	VaultClient::with_transport(settings, transport.clone())
		.expect("Client fixture should build over the fake transport.")
}
