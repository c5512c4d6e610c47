//! Credential providers: one network exchange per acquisition, selected by mechanism tag.

// crates.io
use serde::de::IgnoredAny;
// self
use crate::{
	_prelude::*,
	auth::{AuthMechanism, AuthMethodKind, Credential, TokenSecret},
	client::{ApiRequest, Dispatcher, VaultResponse},
	error::ConfigError,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Boxed future returned by [`CredentialProvider::acquire`].
pub type CredentialFuture<'a> = Pin<Box<dyn Future<Output = Result<Credential>> + 'a + Send>>;

/// Obtains a fresh credential from the service.
///
/// Implementations perform at most one unauthenticated request through `dispatcher` and must
/// never attach a previously issued token.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	/// Stable mechanism label used in errors and spans.
	fn mechanism(&self) -> &'static str;

	/// Runs the exchange and returns the issued credential.
	fn acquire<'a>(&'a self, dispatcher: &'a Dispatcher) -> CredentialFuture<'a>;
}

/// Builds the provider for `mechanism`, validating its parameters first.
pub fn provider_for(
	mechanism: &AuthMechanism,
) -> Result<Arc<dyn CredentialProvider>, ConfigError> {
	mechanism.validate()?;

	let provider: Arc<dyn CredentialProvider> = match mechanism {
		AuthMechanism::Token { token } => Arc::new(StaticTokenProvider::new(token.clone())),
		_ => Arc::new(LoginProvider::new(mechanism)?),
	};

	Ok(provider)
}

/// Hands back a pre-issued token without contacting the service.
#[derive(Clone, Debug)]
pub struct StaticTokenProvider {
	token: TokenSecret,
}
impl StaticTokenProvider {
	/// Wraps a pre-issued token.
	pub fn new(token: TokenSecret) -> Self {
		Self { token }
	}
}
impl CredentialProvider for StaticTokenProvider {
	fn mechanism(&self) -> &'static str {
		"token"
	}

	fn acquire<'a>(&'a self, _dispatcher: &'a Dispatcher) -> CredentialFuture<'a> {
		Box::pin(async move { Ok(Credential::from_token(self.token.clone())) })
	}
}

/// Performs `POST auth/<mount>/login[/<username>]` and reads `auth.client_token`.
#[derive(Clone, Debug)]
pub struct LoginProvider {
	kind: AuthMethodKind,
	path: String,
	body: BTreeMap<&'static str, TokenSecret>,
}
impl LoginProvider {
	/// Creates a provider for a login-based mechanism.
	pub fn new(mechanism: &AuthMechanism) -> Result<Self, ConfigError> {
		let mut body = BTreeMap::new();
		let path = match mechanism {
			AuthMechanism::Token { .. } =>
				return Err(ConfigError::NoLoginEndpoint { mechanism: "token" }),
			AuthMechanism::AppRole { mount, role_id, secret_id } => {
				body.insert("role_id", TokenSecret::new(role_id.as_str()));

				if let Some(secret_id) = secret_id {
					body.insert("secret_id", secret_id.clone());
				}

				format!("auth/{}/login", trim_mount(mount))
			},
			AuthMechanism::UserPass { mount, username, password }
			| AuthMechanism::Ldap { mount, username, password } => {
				body.insert("password", password.clone());

				format!("auth/{}/login/{}", trim_mount(mount), urlencoding::encode(username))
			},
			AuthMechanism::Kubernetes { mount, role, jwt } => {
				body.insert("role", TokenSecret::new(role.as_str()));
				body.insert("jwt", jwt.clone());

				format!("auth/{}/login", trim_mount(mount))
			},
			AuthMechanism::Jwt { mount, role, jwt } => {
				if let Some(role) = role {
					body.insert("role", TokenSecret::new(role.as_str()));
				}

				body.insert("jwt", jwt.clone());

				format!("auth/{}/login", trim_mount(mount))
			},
		};

		Ok(Self { kind: mechanism.kind(), path, body })
	}

	/// Path of the login endpoint, relative to the API version prefix.
	pub fn login_path(&self) -> &str {
		&self.path
	}
}
impl CredentialProvider for LoginProvider {
	fn mechanism(&self) -> &'static str {
		self.kind.as_str()
	}

	fn acquire<'a>(&'a self, dispatcher: &'a Dispatcher) -> CredentialFuture<'a> {
		const KIND: OpKind = OpKind::Acquire;

		Box::pin(async move {
			let span = OpSpan::new(KIND, self.mechanism());

			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let result: Result<Credential> = span
				.instrument(async move {
					let request =
						ApiRequest::post(self.path.as_str()).unauthenticated().json(&self.body)?;
					let response = dispatcher.dispatch(&request, None).await?;

					response
						.json::<VaultResponse<IgnoredAny>>()?
						.and_then(|envelope| envelope.auth)
						.and_then(Credential::from_auth)
						.ok_or(Error::NoUsableCredential { mechanism: self.mechanism() })
				})
				.await;

			match &result {
				Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
				Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
			}

			result
		})
	}
}

fn trim_mount(mount: &str) -> &str {
	mount.trim().trim_matches('/')
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn login(mechanism: AuthMechanism) -> LoginProvider {
		LoginProvider::new(&mechanism).expect("Login mechanism fixture should build.")
	}

	#[test]
	fn login_paths_follow_mechanism_shape() {
		let cases = [
			(AuthMechanism::app_role("r", None), "auth/approle/login"),
			(AuthMechanism::user_pass("alice", "pw"), "auth/userpass/login/alice"),
			(AuthMechanism::ldap("bob", "pw").with_mount("/corp-ldap/"), "auth/corp-ldap/login/bob"),
			(AuthMechanism::kubernetes("web", "jwt"), "auth/kubernetes/login"),
			(AuthMechanism::jwt(None, "jwt").with_mount("oidc"), "auth/oidc/login"),
		];

		for (mechanism, path) in cases {
			assert_eq!(login(mechanism).login_path(), path);
		}
	}

	#[test]
	fn username_is_a_single_path_segment() {
		let provider = login(AuthMechanism::user_pass("ops/admin?x=1", "pw"));

		assert_eq!(provider.login_path(), "auth/userpass/login/ops%2Fadmin%3Fx%3D1");

		let provider = login(AuthMechanism::ldap("jane doe", "pw"));

		assert_eq!(provider.login_path(), "auth/ldap/login/jane%20doe");
	}

	#[test]
	fn login_body_omits_absent_optionals() {
		let provider = login(AuthMechanism::app_role("role-1", None));

		assert_eq!(provider.body.get("role_id").map(TokenSecret::expose), Some("role-1"));
		assert!(!provider.body.contains_key("secret_id"));

		let provider = login(AuthMechanism::user_pass("alice", "pw"));
		let encoded = serde_json::to_string(&provider.body).expect("Login body should encode.");

		assert_eq!(encoded, r#"{"password":"pw"}"#);
	}

	#[test]
	fn token_mechanism_has_no_login_endpoint() {
		let err = LoginProvider::new(&AuthMechanism::token("s.1"))
			.expect_err("Token mechanism must not build a login provider.");

		assert!(matches!(err, ConfigError::NoLoginEndpoint { mechanism: "token" }));
	}

	#[test]
	fn provider_selection_validates_parameters() {
		let err = provider_for(&AuthMechanism::kubernetes("", "jwt"))
			.err()
			.expect("Blank role must fail at construction.");

		assert!(matches!(err, ConfigError::BlankField { field: "role" }));
		assert_eq!(
			provider_for(&AuthMechanism::token("s.1"))
				.expect("Token mechanism should build.")
				.mechanism(),
			"token"
		);
		assert_eq!(
			provider_for(&AuthMechanism::app_role("r", None))
				.expect("AppRole mechanism should build.")
				.mechanism(),
			"approle"
		);
	}
}
