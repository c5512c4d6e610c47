//! Logs in with AppRole against a mock service, reads a secret, and keeps the token renewed.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
// self
use vault_session::{
	AuthMechanism, ClientSettings, RenewalOptions, RenewalSupervisor, VaultClient,
};

#[derive(Debug, Deserialize)]
struct KvV2<T> {
	data: T,
}

#[derive(Debug, Deserialize)]
struct DatabaseSecret {
	username: String,
	password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/auth/approle/login");
			then.status(200).header("content-type", "application/json").body(
				r#"{"auth":{"client_token":"s.demo","policies":["app"],"lease_duration":3600,"renewable":true}}"#,
			);
		})
		.await;
	let _lookup = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/auth/token/lookup-self").header("x-vault-token", "s.demo");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"data":{"ttl":3600,"renewable":true,"policies":["app"]}}"#);
		})
		.await;
	let _secret = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/secret/data/db").header("x-vault-token", "s.demo");
			then.status(200).header("content-type", "application/json").body(
				r#"{"data":{"data":{"username":"app","password":"hunter2"},"metadata":{"version":3}}}"#,
			);
		})
		.await;
	let settings = ClientSettings::builder(server.base_url())
		.auth(AuthMechanism::app_role("demo-role", Some("demo-secret".into())))
		.namespace("team-a")
		.build()?;
	let supervisor =
		RenewalSupervisor::start(VaultClient::new(settings)?, RenewalOptions::default()).await?;

	println!("Renewal state: {:?}", supervisor.state());

	let secret = supervisor
		.read::<KvV2<DatabaseSecret>>("secret/data/db")
		.await?
		.and_then(|envelope| envelope.data)
		.map(|kv| kv.data);

	if let Some(secret) = secret {
		println!("Database user {} (password {} chars).", secret.username, secret.password.len());
	}

	println!("Login exchanges: {}.", login.hits_async().await);

	supervisor.dispose();

	Ok(())
}
