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

//! # certsrv-client
//!
//! A client for the web enrollment pages (`/certsrv`) of Microsoft Active
//! Directory Certificate Services.
//!
//! certsrv has no API: a certificate request is posted as an HTML form and
//! the outcome has to be read back from the HTML page the CA renders. This
//! library submits a PEM CSR for a certificate template, recognizes the
//! issued, pending and denied pages, and downloads the issued certificate
//! and its PKCS#7 chain.
//!
//! ## Features
//!
//! - **Async-first design** using Tokio
//! - **Kerberos (SPNEGO) authentication** with a password, realm
//!   configuration from krb5.conf text, `KRB5CONF` or `/etc/krb5.conf`
//! - **NTLMv2 authentication** for sites without Kerberos
//! - **Typed outcomes**: pending and denied requests are distinct errors
//!   carrying the request ID or the CA's disposition message
//!
//! ## Quick Start
//!
//! ```no_run
//! use certsrv_client::{CertsrvClient, CertsrvClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CertsrvClientConfig::builder()
//!         .server_url("https://ca.example.com")?
//!         .kerberos("svc-enroll", "password")
//!         .build()?;
//!
//!     let client = CertsrvClient::new(config).await?;
//!
//!     let csr = std::fs::read_to_string("server.csr")?;
//!     let artifacts = client.enroll(&csr, "WebServer", "").await?;
//!     println!("{}", artifacts.certificate_base64());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Handling Pending Requests
//!
//! ```no_run
//! use certsrv_client::{CertsrvClient, CertsrvError, RequestId};
//!
//! # async fn example(client: CertsrvClient, csr: &str) -> Result<(), CertsrvError> {
//! match client.enroll(csr, "WebServer", "").await {
//!     Ok(artifacts) => println!("issued {}", artifacts.id()),
//!     Err(CertsrvError::Pending { request_id: Some(id) }) => {
//!         // Once an administrator has approved the request:
//!         let artifacts = client.retrieve_certificates(&RequestId::parse(id)?).await?;
//!         println!("issued {}", artifacts.id());
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod krb5;
pub mod ntlm;
pub mod operations;
pub mod tls;
pub mod transport;
pub mod types;

// Re-export main types at crate root for convenience
pub use client::CertsrvClient;
pub use config::{
    AuthMethod, CertsrvClientConfig, CertsrvClientConfigBuilder, ClientSettings, KerberosAuth,
    NtlmAuth, TrustAnchors,
};
pub use error::{CertsrvError, Result};
pub use transport::AuthenticatedTransport;
pub use types::{CertificateArtifacts, DispositionOutcome, EnrollmentRequest, RequestId};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent string for HTTP requests.
///
/// certsrv serves its HTML error page in place of certificate downloads
/// when the User-Agent does not look like a browser.
pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; certsrv-client/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("Mozilla/5.0 (compatible; certsrv-client/"));
        assert!(USER_AGENT.contains(VERSION));
    }
}
