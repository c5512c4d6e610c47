//! Client settings, header schemes, request/response hooks, and environment loading.

// self
use crate::{
	_prelude::*,
	auth::{AuthMechanism, AuthMethodKind, TokenSecret},
	error::ConfigError,
	http::{HttpRequest, HttpResponse},
};

/// How the credential is transmitted on authenticated requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenHeader {
	/// `X-Vault-Token: <token>`.
	#[default]
	VaultToken,
	/// `Authorization: Bearer <token>`.
	Bearer,
}

/// Side-effect hook invoked with every outgoing request just before it is sent.
///
/// Hooks observe or decorate requests (proxy headers, tracing ids); they never decide whether
/// a request is sent.
pub trait RequestHook
where
	Self: Send + Sync,
{
	/// Inspects or mutates the outgoing request.
	fn before_send(&self, request: &mut HttpRequest);
}
impl<F> RequestHook for F
where
	F: Fn(&mut HttpRequest) + Send + Sync,
{
	fn before_send(&self, request: &mut HttpRequest) {
		self(request)
	}
}

/// Side-effect hook invoked with every response right after it is received.
pub trait ResponseHook
where
	Self: Send + Sync,
{
	/// Inspects the response.
	fn after_receive(&self, response: &HttpResponse);
}
impl<F> ResponseHook for F
where
	F: Fn(&HttpResponse) + Send + Sync,
{
	fn after_receive(&self, response: &HttpResponse) {
		self(response)
	}
}

/// Immutable configuration owned by one client instance.
#[derive(Clone)]
pub struct ClientSettings {
	/// Base service address (scheme, host, port, optional path prefix).
	pub address: Url,
	/// Selected auth mechanism; `None` sends every request unauthenticated.
	pub auth: Option<AuthMechanism>,
	/// Header scheme used to attach the credential.
	pub token_header: TokenHeader,
	/// Namespace attached to every request, when set.
	pub namespace: Option<String>,
	/// Overall timeout applied to every network call.
	pub timeout: Option<Duration>,
	/// Hook run before each request is sent.
	pub before_request: Option<Arc<dyn RequestHook>>,
	/// Hook run after each response is received.
	pub after_response: Option<Arc<dyn ResponseHook>>,
}
impl ClientSettings {
	/// API version segment prefixed to every resource path.
	pub const API_VERSION: &'static str = "v1";

	/// Creates a new builder for the provided service address.
	pub fn builder(address: impl Into<String>) -> ClientSettingsBuilder {
		ClientSettingsBuilder::new(address)
	}

	/// Loads settings from the process environment.
	///
	/// See [`ClientSettings::from_lookup`] for the variables consulted.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads settings through `lookup`, which maps a variable name to its value.
	///
	/// Reads `VAULT_ADDR` (required), `VAULT_NAMESPACE`, `VAULT_CLIENT_TIMEOUT` (seconds),
	/// `VAULT_TOKEN_HEADER` (`vault_token` or `bearer`), and `VAULT_AUTH_METHOD`. Without
	/// `VAULT_AUTH_METHOD`, a present `VAULT_TOKEN` selects the token mechanism. Mechanism
	/// parameters come from `VAULT_TOKEN`, `VAULT_ROLE_ID`, `VAULT_SECRET_ID`,
	/// `VAULT_USERNAME`, `VAULT_PASSWORD`, `VAULT_ROLE`, `VAULT_JWT`, and `VAULT_AUTH_MOUNT`.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());
		let required = |name: &'static str| var(name).ok_or(ConfigError::MissingEnv { name });
		let address = required("VAULT_ADDR")?;
		let mut builder = ClientSettings::builder(address);

		if let Some(namespace) = var("VAULT_NAMESPACE") {
			builder = builder.namespace(namespace);
		}
		if let Some(raw) = var("VAULT_CLIENT_TIMEOUT") {
			let secs = raw
				.trim()
				.parse::<u64>()
				.map_err(|_| ConfigError::InvalidEnv { name: "VAULT_CLIENT_TIMEOUT", value: raw })?;

			builder = builder.timeout(Duration::from_secs(secs));
		}
		if let Some(raw) = var("VAULT_TOKEN_HEADER") {
			let header = match raw.trim().to_ascii_lowercase().as_str() {
				"vault_token" | "x-vault-token" => TokenHeader::VaultToken,
				"bearer" | "authorization" => TokenHeader::Bearer,
				_ => return Err(ConfigError::InvalidEnv { name: "VAULT_TOKEN_HEADER", value: raw }),
			};

			builder = builder.token_header(header);
		}

		let kind = match var("VAULT_AUTH_METHOD") {
			Some(tag) => Some(tag.parse::<AuthMethodKind>()?),
			None => var("VAULT_TOKEN").map(|_| AuthMethodKind::Token),
		};

		if let Some(kind) = kind {
			let mechanism = match kind {
				AuthMethodKind::Token => AuthMechanism::token(required("VAULT_TOKEN")?),
				AuthMethodKind::AppRole => AuthMechanism::app_role(
					required("VAULT_ROLE_ID")?,
					var("VAULT_SECRET_ID").map(TokenSecret::new),
				),
				AuthMethodKind::UserPass =>
					AuthMechanism::user_pass(required("VAULT_USERNAME")?, required("VAULT_PASSWORD")?),
				AuthMethodKind::Ldap =>
					AuthMechanism::ldap(required("VAULT_USERNAME")?, required("VAULT_PASSWORD")?),
				AuthMethodKind::Kubernetes =>
					AuthMechanism::kubernetes(required("VAULT_ROLE")?, required("VAULT_JWT")?),
				AuthMethodKind::Jwt => AuthMechanism::jwt(var("VAULT_ROLE"), required("VAULT_JWT")?),
			};
			let mechanism = match var("VAULT_AUTH_MOUNT") {
				Some(mount) => mechanism.with_mount(mount),
				None => mechanism,
			};

			builder = builder.auth(mechanism);
		}

		builder.build()
	}

	/// Absolute URI for a resource path, e.g. `secret/data/app` → `<address>/v1/secret/data/app`.
	pub fn resource_uri(&self, path: &str) -> String {
		format!(
			"{}/{}/{}",
			self.address.as_str().trim_end_matches('/'),
			Self::API_VERSION,
			path.trim_start_matches('/')
		)
	}
}
impl Debug for ClientSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientSettings")
			.field("address", &self.address.as_str())
			.field("auth", &self.auth.as_ref().map(AuthMechanism::kind))
			.field("token_header", &self.token_header)
			.field("namespace", &self.namespace)
			.field("timeout", &self.timeout)
			.field("before_request_set", &self.before_request.is_some())
			.field("after_response_set", &self.after_response.is_some())
			.finish()
	}
}

/// Builder for [`ClientSettings`] values.
pub struct ClientSettingsBuilder {
	address: String,
	auth: Option<AuthMechanism>,
	token_header: TokenHeader,
	namespace: Option<String>,
	timeout: Option<Duration>,
	before_request: Option<Arc<dyn RequestHook>>,
	after_response: Option<Arc<dyn ResponseHook>>,
}
impl ClientSettingsBuilder {
	/// Creates a new builder seeded with the service address.
	pub fn new(address: impl Into<String>) -> Self {
		Self {
			address: address.into(),
			auth: None,
			token_header: TokenHeader::default(),
			namespace: None,
			timeout: None,
			before_request: None,
			after_response: None,
		}
	}

	/// Sets the auth mechanism.
	pub fn auth(mut self, mechanism: AuthMechanism) -> Self {
		self.auth = Some(mechanism);

		self
	}

	/// Selects the credential header scheme.
	pub fn token_header(mut self, header: TokenHeader) -> Self {
		self.token_header = header;

		self
	}

	/// Attaches a namespace header to every request.
	pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = Some(namespace.into());

		self
	}

	/// Sets the overall timeout for every network call.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Installs a pre-request hook.
	pub fn before_request(mut self, hook: impl RequestHook + 'static) -> Self {
		self.before_request = Some(Arc::new(hook));

		self
	}

	/// Installs a post-response hook.
	pub fn after_response(mut self, hook: impl ResponseHook + 'static) -> Self {
		self.after_response = Some(Arc::new(hook));

		self
	}

	/// Validates the configuration and produces [`ClientSettings`].
	pub fn build(self) -> Result<ClientSettings, ConfigError> {
		if self.address.trim().is_empty() {
			return Err(ConfigError::BlankField { field: "address" });
		}

		let address = Url::parse(self.address.trim())
			.map_err(|source| ConfigError::InvalidAddress { source })?;

		if !matches!(address.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { scheme: address.scheme().to_owned() });
		}
		if self.namespace.as_deref().is_some_and(|namespace| namespace.trim().is_empty()) {
			return Err(ConfigError::BlankField { field: "namespace" });
		}
		if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
			return Err(ConfigError::ZeroTimeout);
		}
		if let Some(mechanism) = &self.auth {
			mechanism.validate()?;
		}

		Ok(ClientSettings {
			address,
			auth: self.auth,
			token_header: self.token_header,
			namespace: self.namespace.map(|ns| ns.trim().trim_matches('/').to_owned()),
			timeout: self.timeout,
			before_request: self.before_request,
			after_response: self.after_response,
		})
	}
}
impl Debug for ClientSettingsBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientSettingsBuilder")
			.field("address", &self.address)
			.field("auth", &self.auth.as_ref().map(AuthMechanism::kind))
			.field("token_header", &self.token_header)
			.field("namespace", &self.namespace)
			.field("timeout", &self.timeout)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars = vars
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<String, String>>();

		move |name| vars.get(name).cloned()
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		let err = ClientSettings::builder("not a url").build().expect_err("Garbage must fail.");

		assert!(matches!(err, ConfigError::InvalidAddress { .. }));

		let err = ClientSettings::builder("ftp://vault.local").build().expect_err("FTP must fail.");

		assert!(matches!(err, ConfigError::UnsupportedScheme { scheme } if scheme == "ftp"));

		let err = ClientSettings::builder("https://vault.local")
			.namespace("  ")
			.build()
			.expect_err("Blank namespace must fail.");

		assert!(matches!(err, ConfigError::BlankField { field: "namespace" }));

		let err = ClientSettings::builder("https://vault.local")
			.timeout(Duration::ZERO)
			.build()
			.expect_err("Zero timeout must fail.");

		assert!(matches!(err, ConfigError::ZeroTimeout));

		let err = ClientSettings::builder("https://vault.local")
			.auth(AuthMechanism::app_role("role", None).with_mount(""))
			.build()
			.expect_err("Blank mount must fail.");

		assert!(matches!(err, ConfigError::BlankField { field: "mount" }));
	}

	#[test]
	fn resource_uri_prefixes_api_version() {
		let settings = ClientSettings::builder("https://vault.local:8200/")
			.build()
			.expect("Settings should build.");

		assert_eq!(
			settings.resource_uri("/secret/data/app"),
			"https://vault.local:8200/v1/secret/data/app"
		);
	}

	#[test]
	fn env_lookup_selects_mechanism() {
		let settings = ClientSettings::from_lookup(lookup(&[
			("VAULT_ADDR", "https://vault.local"),
			("VAULT_NAMESPACE", "team-a/"),
			("VAULT_CLIENT_TIMEOUT", "7"),
			("VAULT_AUTH_METHOD", "approle"),
			("VAULT_ROLE_ID", "role-1"),
			("VAULT_SECRET_ID", "secret-1"),
			("VAULT_AUTH_MOUNT", "ci-approle"),
			("VAULT_TOKEN_HEADER", "bearer"),
		]))
		.expect("AppRole environment should load.");

		assert_eq!(settings.namespace.as_deref(), Some("team-a"));
		assert_eq!(settings.timeout, Some(Duration::from_secs(7)));
		assert_eq!(settings.token_header, TokenHeader::Bearer);
		assert!(matches!(
			settings.auth,
			Some(AuthMechanism::AppRole { ref mount, ref role_id, secret_id: Some(_) })
				if mount == "ci-approle" && role_id == "role-1"
		));

		let settings = ClientSettings::from_lookup(lookup(&[
			("VAULT_ADDR", "http://127.0.0.1:8200"),
			("VAULT_TOKEN", "s.root"),
		]))
		.expect("Token environment should load.");

		assert!(matches!(settings.auth, Some(AuthMechanism::Token { .. })));
	}

	#[test]
	fn env_lookup_reports_missing_and_unknown_values() {
		let err = ClientSettings::from_lookup(lookup(&[])).expect_err("Missing address must fail.");

		assert!(matches!(err, ConfigError::MissingEnv { name: "VAULT_ADDR" }));

		let err = ClientSettings::from_lookup(lookup(&[
			("VAULT_ADDR", "https://vault.local"),
			("VAULT_AUTH_METHOD", "kerberos"),
		]))
		.expect_err("Unknown mechanism must fail.");

		assert!(matches!(err, ConfigError::UnknownMechanism { .. }));

		let err = ClientSettings::from_lookup(lookup(&[
			("VAULT_ADDR", "https://vault.local"),
			("VAULT_AUTH_METHOD", "userpass"),
			("VAULT_USERNAME", "alice"),
		]))
		.expect_err("Missing password must fail.");

		assert!(matches!(err, ConfigError::MissingEnv { name: "VAULT_PASSWORD" }));

		let err = ClientSettings::from_lookup(lookup(&[
			("VAULT_ADDR", "https://vault.local"),
			("VAULT_CLIENT_TIMEOUT", "soon"),
		]))
		.expect_err("Non-numeric timeout must fail.");

		assert!(matches!(err, ConfigError::InvalidEnv { name: "VAULT_CLIENT_TIMEOUT", .. }));
	}
}
