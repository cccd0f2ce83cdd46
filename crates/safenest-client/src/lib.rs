//! # safenest-client -- Typed Rust client for the activation backend
//!
//! Provides typed access to every collaborator endpoint the device
//! activation workflow touches:
//! - **Devices**: claim a pairing code (`functions/v1/bind-device`)
//! - **Children**: list and create child profiles (`rest/v1/children`)
//! - **Filtering**: DNS-filter provisioning (`functions/v1/dns-*`)
//! - **Status**: primary and fallback activation status read paths
//! - **Postinstall**: the device-authorized configuration push
//!
//! ## Authorization
//!
//! Every request carries the project API key in the `apikey` header.
//! Operator calls add the operator's bearer token, status calls use the
//! API key as bearer, and the postinstall push uses the device credential.
//!
//! ## Retries
//!
//! Transport-level retries are configurable and default to zero. Status
//! calls are never retried here; the credential poller owns that loop.

pub mod children;
pub mod config;
pub mod devices;
pub mod error;
pub mod filtering;
pub(crate) mod http;
pub mod postinstall;
pub(crate) mod retry;
pub mod status;

pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use status::{ActivationStatus, StatusEndpoint};

use std::time::Duration;

use safenest_core::SecretToken;

/// Top-level activation backend client. Holds sub-clients per collaborator.
#[derive(Debug, Clone)]
pub struct ActivationClient {
    devices: devices::DeviceClient,
    children: children::ChildClient,
    filtering: filtering::FilteringClient,
    status: status::StatusClient,
    postinstall: postinstall::PostinstallClient,
}

impl ActivationClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let api_key = SecretToken::new(config.api_key.as_str(), "api key")
            .map_err(|_| ApiError::Config(ConfigError::Missing("SAFENEST_API_KEY")))?;

        let http = reqwest::Client::builder()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    "apikey",
                    reqwest::header::HeaderValue::from_str(api_key.expose())
                        .map_err(|_| ApiError::InvalidHeader("apikey"))?,
                );
                headers
            })
            .build()
            .map_err(|e| ApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let retries = config.transport_retries;
        Ok(Self {
            devices: devices::DeviceClient::new(
                http.clone(),
                base_url.clone(),
                config.bind_timeout_ms.map(Duration::from_millis),
                retries,
            ),
            children: children::ChildClient::new(http.clone(), base_url.clone(), retries),
            filtering: filtering::FilteringClient::new(http.clone(), base_url.clone(), retries),
            status: status::StatusClient::new(http.clone(), base_url.clone(), api_key),
            postinstall: postinstall::PostinstallClient::new(
                http,
                base_url,
                config.publish_timeout_ms.map(Duration::from_millis),
                retries,
            ),
        })
    }

    /// Access the device-binding client.
    pub fn devices(&self) -> &devices::DeviceClient {
        &self.devices
    }

    /// Access the child-profile client.
    pub fn children(&self) -> &children::ChildClient {
        &self.children
    }

    /// Access the DNS-filter provisioning client.
    pub fn filtering(&self) -> &filtering::FilteringClient {
        &self.filtering
    }

    /// Access the activation status client (primary and fallback).
    pub fn status(&self) -> &status::StatusClient {
        &self.status
    }

    /// Access the device postinstall client.
    pub fn postinstall(&self) -> &postinstall::PostinstallClient {
        &self.postinstall
    }
}
