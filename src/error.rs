//! Client-level error types shared across the dispatcher, credential providers, and renewal.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Service answered with a non-success status.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Response body could not be decoded into the requested shape.
	#[error("Response body for `{path}` could not be decoded.")]
	Decode {
		/// Request path that produced the body.
		path: String,
		/// Structured parsing failure pointing at the offending JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be encoded.")]
	Encode(#[source] serde_json::Error),
	/// A successful response carried no payload where one is required.
	#[error("Response for `{path}` carried no data.")]
	MissingData {
		/// Request path that produced the empty response.
		path: String,
	},

	/// Login succeeded at the transport level but carried no token.
	#[error(
		"The {mechanism} auth mechanism yielded no usable credential; verify the configured parameters."
	)]
	NoUsableCredential {
		/// Mechanism label (e.g., `approle`).
		mechanism: &'static str,
	},
}
impl Error {
	/// Returns the HTTP status when the error came from the service.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(e) => Some(e.status),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised while building a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Service address could not be parsed.
	#[error("Service address is invalid.")]
	InvalidAddress {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Service address uses a scheme other than http/https.
	#[error("Service address must use http or https, got `{scheme}`.")]
	UnsupportedScheme {
		/// Scheme that was supplied.
		scheme: String,
	},
	/// A required parameter was empty or whitespace.
	#[error("The `{field}` parameter must not be blank.")]
	BlankField {
		/// Name of the offending parameter.
		field: &'static str,
	},
	/// A required environment variable is absent.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// An environment variable holds an unparsable value.
	#[error("Environment variable `{name}` holds an invalid value: {value}.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Raw value.
		value: String,
	},
	/// Auth mechanism tag is not recognized.
	#[error("Auth mechanism `{tag}` is not supported.")]
	UnknownMechanism {
		/// Tag that failed to resolve.
		tag: String,
	},
	/// The mechanism has no login endpoint to exchange against.
	#[error("The {mechanism} auth mechanism has no login endpoint.")]
	NoLoginEndpoint {
		/// Mechanism label.
		mechanism: &'static str,
	},
	/// Configured timeout is zero.
	#[error("Request timeout must be greater than zero.")]
	ZeroTimeout,
	/// Renewal factor falls outside `(0, 1]`.
	#[error("Renewal factor must be within (0, 1], got {factor}.")]
	InvalidRenewalFactor {
		/// Rejected factor.
		factor: f64,
	},
	/// A body was attached to a verb that never carries one.
	#[error("The {method} verb does not accept a request body.")]
	BodyNotPermitted {
		/// Verb label.
		method: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The configured overall request timeout elapsed.
	#[error("Request to the service timed out after {0:?}.")]
	Timeout(Duration),
	/// The outgoing HTTP request could not be assembled.
	#[error("Outgoing request could not be built.")]
	InvalidRequest(#[from] ::http::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Non-success response from the service.
///
/// `errors` and `warnings` are parsed best-effort from the body; a body that is not the
/// expected JSON envelope leaves both empty instead of raising a second error.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Service responded with status {status}{}", format_errors(.errors))]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Human-readable error strings from the body.
	pub errors: Vec<String>,
	/// Warning strings from the body.
	pub warnings: Vec<String>,
}
impl ApiError {
	/// Builds an error from a status code and a raw response body.
	pub fn from_body(status: u16, body: &[u8]) -> Self {
		#[derive(Default, Deserialize)]
		struct ErrorEnvelope {
			#[serde(default)]
			errors: Option<Vec<String>>,
			#[serde(default)]
			warnings: Option<Vec<String>>,
		}

		let envelope = serde_json::from_slice::<ErrorEnvelope>(body).unwrap_or_default();

		Self {
			status,
			errors: envelope.errors.unwrap_or_default(),
			warnings: envelope.warnings.unwrap_or_default(),
		}
	}

	/// Returns `true` for 404 responses.
	pub fn is_not_found(&self) -> bool {
		self.status == 404
	}

	/// Returns `true` for 403 responses.
	pub fn is_permission_denied(&self) -> bool {
		self.status == 403
	}
}

fn format_errors(errors: &[String]) -> String {
	if errors.is_empty() { ".".into() } else { format!(": {}.", errors.join("; ")) }
}
