//! Request dispatcher: header assembly, body encoding, hooks, timeout, and status mapping.

// crates.io
use ::http::{
	HeaderMap, HeaderValue,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::{ClientSettings, TokenHeader},
	error::{ApiError, ConfigError, TransportError},
	http::{HttpRequest, HttpTransport, Method},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Marker header attached to every request.
pub const REQUEST_HEADER: &str = "x-vault-request";
/// Dedicated credential header.
pub const TOKEN_HEADER: &str = "x-vault-token";
/// Namespace header.
pub const NAMESPACE_HEADER: &str = "x-vault-namespace";
/// Response-wrapping TTL header.
pub const WRAP_TTL_HEADER: &str = "x-vault-wrap-ttl";

/// One request against the service API.
#[derive(Clone)]
pub struct ApiRequest {
	/// Resource path below the API version prefix.
	pub path: String,
	/// Verb.
	pub method: Method,
	/// Encoded JSON body.
	pub body: Option<Vec<u8>>,
	/// Response-wrapping TTL (e.g. `"5m"` or `"300"`).
	pub wrap_ttl: Option<String>,
	/// Skips credential attachment entirely.
	pub unauthenticated: bool,
	/// Token attached instead of the cached credential.
	pub token_override: Option<TokenSecret>,
}
impl ApiRequest {
	/// Creates a request for `path` with `method`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			method,
			body: None,
			wrap_ttl: None,
			unauthenticated: false,
			token_override: None,
		}
	}

	/// `GET path`.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// `LIST path`.
	pub fn list(path: impl Into<String>) -> Self {
		Self::new(Method::List, path)
	}

	/// `POST path`.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// `PUT path`.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// `PATCH path`.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// `DELETE path`.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Serializes `body` as the JSON request body.
	pub fn json<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body).map_err(Error::Encode)?);

		Ok(self)
	}

	/// Asks the service to response-wrap the result with the given TTL.
	pub fn wrap_ttl(mut self, ttl: impl Into<String>) -> Self {
		self.wrap_ttl = Some(ttl.into());

		self
	}

	/// Sends the request without any credential.
	pub fn unauthenticated(mut self) -> Self {
		self.unauthenticated = true;

		self
	}

	/// Attaches `token` instead of the client's cached credential.
	pub fn with_token(mut self, token: TokenSecret) -> Self {
		self.token_override = Some(token);

		self
	}
}
impl Debug for ApiRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiRequest")
			.field("method", &self.method)
			.field("path", &self.path)
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.field("wrap_ttl", &self.wrap_ttl)
			.field("unauthenticated", &self.unauthenticated)
			.field("token_override_set", &self.token_override.is_some())
			.finish()
	}
}

/// Successful response, kept raw until the caller picks a shape.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// Path the request targeted.
	pub path: String,
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` when the body is empty or whitespace (e.g. `204 No Content`).
	pub fn is_empty(&self) -> bool {
		self.body.iter().all(u8::is_ascii_whitespace)
	}

	/// Decodes the body, returning `None` for an empty body.
	pub fn json<T>(&self) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		if self.is_empty() {
			return Ok(None);
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map(Some)
			.map_err(|source| Error::Decode { path: self.path.clone(), source })
	}

	/// Body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Builds and sends single requests against the configured service.
///
/// The dispatcher owns no credential state; callers pass the token to attach. This keeps it
/// usable by credential providers, which must exchange without one.
#[derive(Clone)]
pub struct Dispatcher {
	settings: ClientSettings,
	transport: Arc<dyn HttpTransport>,
}
impl Dispatcher {
	/// Creates a dispatcher over `transport`.
	pub fn new(settings: ClientSettings, transport: Arc<dyn HttpTransport>) -> Self {
		Self { settings, transport }
	}

	/// Settings this dispatcher was built with.
	pub fn settings(&self) -> &ClientSettings {
		&self.settings
	}

	/// Sends `request`, attaching `token` when given and the request is authenticated.
	///
	/// Success statuses resolve to the raw response; any other status becomes an [`ApiError`].
	/// Nothing is retried.
	pub async fn dispatch(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<RawResponse> {
		const KIND: OpKind = OpKind::Dispatch;

		let span = OpSpan::new(KIND, request.method.as_str());

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result: Result<RawResponse> = span
			.instrument(async move {
				let token = if request.unauthenticated { None } else { token };
				let mut outgoing = self.build_request(request, token)?;

				if let Some(hook) = &self.settings.before_request {
					hook.before_send(&mut outgoing);
				}

				let response = match self.settings.timeout {
					Some(limit) => tokio::time::timeout(limit, self.transport.execute(outgoing))
						.await
						.map_err(|_| TransportError::Timeout(limit))??,
					None => self.transport.execute(outgoing).await?,
				};

				if let Some(hook) = &self.settings.after_response {
					hook.after_receive(&response);
				}

				let status = response.status();

				if !status.is_success() {
					return Err(ApiError::from_body(status.as_u16(), response.body()).into());
				}

				let (parts, body) = response.into_parts();

				Ok(RawResponse {
					path: request.path.clone(),
					status: parts.status.as_u16(),
					headers: parts.headers,
					body,
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Assembles the outgoing HTTP request.
	///
	/// Headers are inserted with overwrite semantics, so each header appears at most once.
	pub fn build_request(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<HttpRequest> {
		let body = match &request.body {
			Some(_) if !request.method.permits_body() =>
				return Err(ConfigError::BodyNotPermitted { method: request.method.as_str() }.into()),
			Some(body) => body.clone(),
			None => Vec::new(),
		};
		let has_body = !body.is_empty();
		let method = request
			.method
			.to_http()
			.map_err(|e| TransportError::from(::http::Error::from(e)))?;
		let mut outgoing = ::http::Request::builder()
			.method(method)
			.uri(self.settings.resource_uri(&request.path))
			.body(body)
			.map_err(TransportError::from)?;
		let headers = outgoing.headers_mut();

		headers.insert(REQUEST_HEADER, HeaderValue::from_static("true"));

		if let Some(token) = token {
			match self.settings.token_header {
				TokenHeader::VaultToken => {
					headers.remove(AUTHORIZATION);
					headers.insert(TOKEN_HEADER, credential_value(token.expose())?);
				},
				TokenHeader::Bearer => {
					headers.remove(TOKEN_HEADER);
					headers
						.insert(AUTHORIZATION, credential_value(&format!("Bearer {}", token.expose()))?);
				},
			}
		}
		if let Some(ttl) = &request.wrap_ttl {
			headers.insert(WRAP_TTL_HEADER, header_value(ttl)?);
		}
		if let Some(namespace) = &self.settings.namespace {
			headers.insert(NAMESPACE_HEADER, header_value(namespace)?);
		}
		if has_body {
			headers.insert(CONTENT_TYPE, HeaderValue::from_static(request.method.content_type()));
		}

		Ok(outgoing)
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher").field("settings", &self.settings).finish()
	}
}

fn header_value(raw: &str) -> Result<HeaderValue> {
	HeaderValue::from_str(raw).map_err(|e| Error::from(TransportError::from(::http::Error::from(e))))
}

/// Header value carrying a token; kept out of debug output and HPACK tables.
fn credential_value(raw: &str) -> Result<HeaderValue> {
	let mut value = header_value(raw)?;

	value.set_sensitive(true);

	Ok(value)
}
