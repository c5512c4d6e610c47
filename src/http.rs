//! Transport primitives for service requests.
//!
//! The module exposes [`HttpTransport`] so downstream crates can plug in a custom HTTP
//! stack (proxies, test doubles, alternative TLS setups) without touching the dispatcher.
//! Requests and responses travel as plain [`http`] values with owned byte bodies, which keeps
//! the hooks in [`crate::config`] independent of any particular client library.

// crates.io
use ::http::{Method as HttpMethod, method::InvalidMethod};
// self
use crate::{_prelude::*, error::TransportError};

/// Outgoing request handed to a transport.
pub type HttpRequest = ::http::Request<Vec<u8>>;
/// Response returned by a transport.
pub type HttpResponse = ::http::Response<Vec<u8>>;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing a single request.
///
/// Implementations must not follow redirects or retry on their own; the dispatcher owns
/// timeouts and callers own retry policy.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the full response body has been read.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Verbs understood by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// Read a resource.
	Get,
	/// Enumerate keys under a path; sent as the non-standard `LIST` verb.
	List,
	/// Create or update with a JSON body.
	Post,
	/// Create or replace with a JSON body.
	Put,
	/// Partial update using JSON merge-patch semantics.
	Patch,
	/// Delete a resource.
	Delete,
}
impl Method {
	/// Returns the wire verb.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::List => "LIST",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
		}
	}

	/// Returns `true` for verbs that carry a request body.
	pub const fn permits_body(self) -> bool {
		matches!(self, Self::Post | Self::Put | Self::Patch)
	}

	/// Content type used for the request body of this verb.
	pub const fn content_type(self) -> &'static str {
		match self {
			Self::Patch => "application/merge-patch+json",
			_ => "application/json",
		}
	}

	/// Converts into the [`http`] representation.
	///
	/// `LIST` is an extension verb; it is never downgraded to another verb.
	pub fn to_http(self) -> Result<HttpMethod, InvalidMethod> {
		Ok(match self {
			Self::Get => HttpMethod::GET,
			Self::Post => HttpMethod::POST,
			Self::Put => HttpMethod::PUT,
			Self::Patch => HttpMethod::PATCH,
			Self::Delete => HttpMethod::DELETE,
			Self::List => HttpMethod::from_bytes(Self::List.as_str().as_bytes())?,
		})
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// [`HttpTransport`] backed by a shared [`ReqwestClient`].
///
/// Redirect following should be disabled on custom clients; the service answers API calls
/// directly and a redirect would drop the credential headers.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with redirects disabled.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
