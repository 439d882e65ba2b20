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

//! HTTP client construction for the certsrv transports.
//!
//! Both authentication transports share one `reqwest::Client` built here:
//! the User-Agent is installed as a client-wide default so that no request
//! can leave without it.

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::config::{CertsrvClientConfig, TrustAnchors};
use crate::error::{CertsrvError, Result};

/// Build a reqwest Client with the configured timeout, User-Agent and
/// trust anchors.
///
/// Redirects are not followed; a 3xx from the CA is reported as a status
/// error.
pub fn build_http_client(config: &CertsrvClientConfig) -> Result<reqwest::Client> {
    let user_agent = HeaderValue::from_str(&config.user_agent)
        .map_err(|e| CertsrvError::config(format!("Invalid user agent: {}", e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, user_agent);

    // NTLM authenticates the connection, not the request: keep a single
    // idle connection per host so the handshake legs share it.
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .default_headers(headers)
        .pool_max_idle_per_host(1)
        .redirect(reqwest::redirect::Policy::none())
        .http1_only()
        .use_rustls_tls();

    match &config.trust_anchors {
        TrustAnchors::WebPki => {
            builder = builder.tls_built_in_root_certs(true);
        }
        TrustAnchors::Explicit(ca_certs) => {
            builder = builder.tls_built_in_root_certs(false);
            for ca_pem in ca_certs {
                let cert = reqwest::Certificate::from_pem(ca_pem).map_err(|e| {
                    CertsrvError::config(format!("Failed to parse CA certificate: {}", e))
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }
        TrustAnchors::InsecureAcceptAny => {
            builder = builder
                .tls_built_in_root_certs(false)
                .danger_accept_invalid_certs(true);
        }
    }

    builder = builder.min_tls_version(reqwest::tls::Version::TLS_1_2);

    builder
        .build()
        .map_err(|e| CertsrvError::config(format!("Failed to build HTTP client: {}", e)))
}
