// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Authenticated HTTP transport to the certsrv site.
//!
//! One variant per Windows-integrated authentication mechanism. Both share
//! the same contract: a request goes out with the client-wide User-Agent and
//! the mechanism's `Authorization` header, any final status other than 200
//! becomes [`CertsrvError::UnexpectedStatus`], and a 200 response is handed
//! back with its Content-Type and body.

mod kerberos;
mod ntlm;

pub use kerberos::KerberosTransport;
pub use ntlm::NtlmTransport;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::config::{AuthMethod, CertsrvClientConfig};
use crate::error::{CertsrvError, Result};
use crate::tls::build_http_client;

/// A request to the CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaRequest {
    method: Method,
    url: Url,
    content_type: Option<&'static str>,
    body: Option<String>,
}

impl CaRequest {
    /// A GET request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            content_type: None,
            body: None,
        }
    }

    /// A POST request with a body of the given content type.
    pub fn post(url: Url, content_type: &'static str, body: String) -> Self {
        Self {
            method: Method::POST,
            url,
            content_type: Some(content_type),
            body: Some(body),
        }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Content type of the body, if any.
    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Build a reqwest request; authentication headers are added by the
    /// transport. Each handshake leg gets a fresh builder.
    pub(crate) fn to_reqwest(&self, http: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut builder = http.request(self.method.clone(), self.url.clone());
        if let Some(content_type) = self.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

/// A successful (HTTP 200) response from the CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaResponse {
    content_type: Option<String>,
    body: String,
}

impl CaResponse {
    /// Build a response from its parts.
    pub fn new(content_type: Option<String>, body: String) -> Self {
        Self { content_type, body }
    }

    /// The Content-Type header value, exactly as sent.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Take the response body.
    pub fn into_body(self) -> String {
        self.body
    }
}

/// HTTP transport authenticated with Kerberos or NTLM.
#[derive(Debug)]
pub enum AuthenticatedTransport {
    /// SPNEGO/Kerberos (`Authorization: Negotiate`).
    Kerberos(KerberosTransport),
    /// NTLM (`Authorization: NTLM`).
    Ntlm(NtlmTransport),
}

impl AuthenticatedTransport {
    /// Build the transport for the configured mechanism.
    ///
    /// For Kerberos this resolves the realm configuration and logs in, so
    /// credential problems surface here rather than on the first request.
    pub async fn connect(config: &CertsrvClientConfig) -> Result<Self> {
        let http = build_http_client(config)?;

        match &config.auth {
            AuthMethod::Kerberos(auth) => {
                let host = config
                    .host()
                    .ok_or_else(|| CertsrvError::config("CA URL has no host"))?;
                let transport = KerberosTransport::connect(http, auth, host).await?;
                Ok(Self::Kerberos(transport))
            }
            AuthMethod::Ntlm(auth) => Ok(Self::Ntlm(NtlmTransport::new(http, auth.clone()))),
        }
    }

    /// Name of the authentication mechanism.
    pub fn mechanism(&self) -> &'static str {
        match self {
            Self::Kerberos(_) => "kerberos",
            Self::Ntlm(_) => "ntlm",
        }
    }

    /// Send a request and return the CA's 200 response.
    ///
    /// # Errors
    ///
    /// Returns [`CertsrvError::Http`] if the request cannot be sent or the
    /// body cannot be read, and [`CertsrvError::UnexpectedStatus`] for any
    /// status other than 200 (including 3xx and 401).
    pub async fn execute(&self, request: &CaRequest) -> Result<CaResponse> {
        tracing::debug!(
            mechanism = self.mechanism(),
            "{} {}",
            request.method(),
            request.url()
        );

        let response = match self {
            Self::Kerberos(transport) => transport.send(request).await?,
            Self::Ntlm(transport) => transport.send(request).await?,
        };

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(status = status.as_u16(), "CA returned non-200 status");
            return Err(CertsrvError::unexpected_status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(CaResponse::new(content_type, body))
    }
}
