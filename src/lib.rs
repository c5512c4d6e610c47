//! Async client core for Vault-style secrets services: lazily acquired, single-flight credentials,
//! a typed request dispatcher, and a supervisor that renews tokens before they expire.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod renewal;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::{Mutex as AsyncMutex, OnceCell};
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

pub use auth::{AuthMechanism, Credential, TokenSecret};
pub use client::{ApiRequest, VaultClient};
pub use config::{ClientSettings, TokenHeader};
pub use renewal::{RenewalOptions, RenewalState, RenewalSupervisor};
