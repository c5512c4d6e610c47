//! Auth mechanism descriptors selected once at configuration time.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Mechanism tags accepted in configuration files and `VAULT_AUTH_METHOD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethodKind {
	/// Pre-issued token.
	Token,
	/// AppRole login.
	#[serde(rename = "approle")]
	AppRole,
	/// Username/password login.
	#[serde(rename = "userpass")]
	UserPass,
	/// LDAP login.
	Ldap,
	/// Kubernetes service-account login.
	Kubernetes,
	/// JWT/OIDC login.
	Jwt,
}
impl AuthMethodKind {
	/// Returns the stable tag and default mount path.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Token => "token",
			Self::AppRole => "approle",
			Self::UserPass => "userpass",
			Self::Ldap => "ldap",
			Self::Kubernetes => "kubernetes",
			Self::Jwt => "jwt",
		}
	}
}
impl Display for AuthMethodKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for AuthMethodKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"token" => Ok(Self::Token),
			"approle" => Ok(Self::AppRole),
			"userpass" => Ok(Self::UserPass),
			"ldap" => Ok(Self::Ldap),
			"kubernetes" => Ok(Self::Kubernetes),
			"jwt" | "oidc" => Ok(Self::Jwt),
			_ => Err(ConfigError::UnknownMechanism { tag: s.to_owned() }),
		}
	}
}

/// Immutable descriptor naming the credential provider and carrying its parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthMechanism {
	/// Pre-issued token; no exchange is performed.
	Token {
		/// Token value.
		token: TokenSecret,
	},
	/// `POST auth/<mount>/login` with `role_id` and optional `secret_id`.
	#[serde(rename = "approle")]
	AppRole {
		/// Mount path of the auth method.
		#[serde(default = "approle_mount")]
		mount: String,
		/// Role identifier.
		role_id: String,
		/// Secret identifier, when the role requires one.
		#[serde(default)]
		secret_id: Option<TokenSecret>,
	},
	/// `POST auth/<mount>/login/<username>` with `password`.
	#[serde(rename = "userpass")]
	UserPass {
		/// Mount path of the auth method.
		#[serde(default = "userpass_mount")]
		mount: String,
		/// Username.
		username: String,
		/// Password.
		password: TokenSecret,
	},
	/// `POST auth/<mount>/login/<username>` with `password`.
	Ldap {
		/// Mount path of the auth method.
		#[serde(default = "ldap_mount")]
		mount: String,
		/// Username.
		username: String,
		/// Password.
		password: TokenSecret,
	},
	/// `POST auth/<mount>/login` with `role` and the service-account `jwt`.
	Kubernetes {
		/// Mount path of the auth method.
		#[serde(default = "kubernetes_mount")]
		mount: String,
		/// Role name.
		role: String,
		/// Service-account token.
		jwt: TokenSecret,
	},
	/// `POST auth/<mount>/login` with `jwt` and optional `role`.
	Jwt {
		/// Mount path of the auth method.
		#[serde(default = "jwt_mount")]
		mount: String,
		/// Role name; the mount's default role applies when absent.
		#[serde(default)]
		role: Option<String>,
		/// Signed JWT.
		jwt: TokenSecret,
	},
}
impl AuthMechanism {
	/// Static token mechanism.
	pub fn token(token: impl Into<TokenSecret>) -> Self {
		Self::Token { token: token.into() }
	}

	/// AppRole mechanism on the default `approle` mount.
	pub fn app_role(role_id: impl Into<String>, secret_id: Option<TokenSecret>) -> Self {
		Self::AppRole {
			mount: approle_mount(),
			role_id: role_id.into(),
			secret_id,
		}
	}

	/// UserPass mechanism on the default `userpass` mount.
	pub fn user_pass(username: impl Into<String>, password: impl Into<TokenSecret>) -> Self {
		Self::UserPass {
			mount: userpass_mount(),
			username: username.into(),
			password: password.into(),
		}
	}

	/// LDAP mechanism on the default `ldap` mount.
	pub fn ldap(username: impl Into<String>, password: impl Into<TokenSecret>) -> Self {
		Self::Ldap {
			mount: ldap_mount(),
			username: username.into(),
			password: password.into(),
		}
	}

	/// Kubernetes mechanism on the default `kubernetes` mount.
	pub fn kubernetes(role: impl Into<String>, jwt: impl Into<TokenSecret>) -> Self {
		Self::Kubernetes {
			mount: kubernetes_mount(),
			role: role.into(),
			jwt: jwt.into(),
		}
	}

	/// JWT mechanism on the default `jwt` mount.
	pub fn jwt(role: Option<String>, jwt: impl Into<TokenSecret>) -> Self {
		Self::Jwt { mount: jwt_mount(), role, jwt: jwt.into() }
	}

	/// Overrides the mount path. Has no effect on [`AuthMechanism::Token`].
	pub fn with_mount(mut self, new_mount: impl Into<String>) -> Self {
		match &mut self {
			Self::Token { .. } => {},
			Self::AppRole { mount, .. }
			| Self::UserPass { mount, .. }
			| Self::Ldap { mount, .. }
			| Self::Kubernetes { mount, .. }
			| Self::Jwt { mount, .. } => *mount = new_mount.into(),
		}

		self
	}

	/// Returns the mechanism tag.
	pub fn kind(&self) -> AuthMethodKind {
		match self {
			Self::Token { .. } => AuthMethodKind::Token,
			Self::AppRole { .. } => AuthMethodKind::AppRole,
			Self::UserPass { .. } => AuthMethodKind::UserPass,
			Self::Ldap { .. } => AuthMethodKind::Ldap,
			Self::Kubernetes { .. } => AuthMethodKind::Kubernetes,
			Self::Jwt { .. } => AuthMethodKind::Jwt,
		}
	}

	/// Rejects blank mounts and blank required parameters.
	pub fn validate(&self) -> Result<(), ConfigError> {
		match self {
			Self::Token { token } => not_blank("token", token.expose()),
			Self::AppRole { mount, role_id, secret_id } => {
				not_blank("mount", mount)?;
				not_blank("role_id", role_id)?;

				match secret_id {
					Some(secret) => not_blank("secret_id", secret.expose()),
					None => Ok(()),
				}
			},
			Self::UserPass { mount, username, password }
			| Self::Ldap { mount, username, password } => {
				not_blank("mount", mount)?;
				not_blank("username", username)?;
				not_blank("password", password.expose())
			},
			Self::Kubernetes { mount, role, jwt } => {
				not_blank("mount", mount)?;
				not_blank("role", role)?;
				not_blank("jwt", jwt.expose())
			},
			Self::Jwt { mount, role, jwt } => {
				not_blank("mount", mount)?;

				if let Some(role) = role {
					not_blank("role", role)?;
				}

				not_blank("jwt", jwt.expose())
			},
		}
	}
}

fn approle_mount() -> String {
	AuthMethodKind::AppRole.as_str().into()
}

fn userpass_mount() -> String {
	AuthMethodKind::UserPass.as_str().into()
}

fn ldap_mount() -> String {
	AuthMethodKind::Ldap.as_str().into()
}

fn kubernetes_mount() -> String {
	AuthMethodKind::Kubernetes.as_str().into()
}

fn jwt_mount() -> String {
	AuthMethodKind::Jwt.as_str().into()
}

fn not_blank(field: &'static str, value: &str) -> Result<(), ConfigError> {
	if value.trim().is_empty() { Err(ConfigError::BlankField { field }) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn tags_round_trip_through_from_str() {
		for kind in [
			AuthMethodKind::Token,
			AuthMethodKind::AppRole,
			AuthMethodKind::UserPass,
			AuthMethodKind::Ldap,
			AuthMethodKind::Kubernetes,
			AuthMethodKind::Jwt,
		] {
			assert_eq!(kind.as_str().parse::<AuthMethodKind>().expect("Known tag should parse."), kind);
		}

		let err = "kerberos".parse::<AuthMethodKind>().expect_err("Unknown tag must be rejected.");

		assert!(matches!(err, ConfigError::UnknownMechanism { tag } if tag == "kerberos"));
	}

	#[test]
	fn validate_rejects_blank_mounts_and_fields() {
		let err = AuthMechanism::app_role("role", None)
			.with_mount(" ")
			.validate()
			.expect_err("Blank mount must be rejected.");

		assert!(matches!(err, ConfigError::BlankField { field: "mount" }));

		let err = AuthMechanism::user_pass("", "pw")
			.validate()
			.expect_err("Blank username must be rejected.");

		assert!(matches!(err, ConfigError::BlankField { field: "username" }));
		assert!(AuthMechanism::token("s.abc").validate().is_ok());
	}

	#[test]
	fn descriptor_deserializes_from_tagged_config() {
		let mechanism: AuthMechanism = serde_json::from_str(
			r#"{"method":"approle","mount":"ci","role_id":"r-1","secret_id":"s-1"}"#,
		)
		.expect("Tagged AppRole config should deserialize.");

		assert_eq!(mechanism.kind(), AuthMethodKind::AppRole);
		assert!(matches!(&mechanism, AuthMechanism::AppRole { mount, .. } if mount == "ci"));

		let mechanism: AuthMechanism =
			serde_json::from_str(r#"{"method":"userpass","username":"alice","password":"pw"}"#)
				.expect("UserPass config without a mount should deserialize.");

		assert!(matches!(&mechanism, AuthMechanism::UserPass { mount, .. } if mount == "userpass"));

		let mechanism: AuthMechanism =
			serde_json::from_str(r#"{"method":"kubernetes","role":"web","jwt":"ey.j"}"#)
				.expect("Kubernetes config without a mount should deserialize.");

		assert!(
			matches!(&mechanism, AuthMechanism::Kubernetes { mount, .. } if mount == "kubernetes")
		);

		let err = serde_json::from_str::<AuthMechanism>(r#"{"method":"kerberos"}"#);

		assert!(err.is_err());
	}
}
