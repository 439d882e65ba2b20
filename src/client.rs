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

//! certsrv client implementation.

use crate::config::CertsrvClientConfig;
use crate::error::Result;
use crate::operations::{self, disposition};
use crate::transport::AuthenticatedTransport;
use crate::types::{CertificateArtifacts, DispositionOutcome, EnrollmentRequest, RequestId};

/// Client for the certsrv web enrollment pages of a Microsoft CA.
///
/// One enrollment is at most three sequential round trips: the submission,
/// the chain download and the leaf download. Nothing is retried; a pending
/// request has to be picked up again with [`retrieve_certificates`] once an
/// administrator has issued it.
///
/// The client can be shared between tasks. Kerberos ticket state lives
/// behind the transport's own locks; each NTLM request performs its own
/// handshake.
///
/// # Example
///
/// ```no_run
/// use certsrv_client::{CertsrvClient, CertsrvClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CertsrvClientConfig::builder()
///     .server_url("https://ca.example.com")?
///     .ntlm("EXAMPLE\\svc-enroll", "password")
///     .build()?;
///
/// let client = CertsrvClient::new(config).await?;
///
/// let csr = std::fs::read_to_string("server.csr")?;
/// let artifacts = client.enroll(&csr, "WebServer", "").await?;
/// println!("issued request {}", artifacts.id());
/// # Ok(())
/// # }
/// ```
///
/// [`retrieve_certificates`]: CertsrvClient::retrieve_certificates
#[derive(Debug)]
pub struct CertsrvClient {
    config: CertsrvClientConfig,
    transport: AuthenticatedTransport,
}

impl CertsrvClient {
    /// Create a new client.
    ///
    /// With Kerberos this logs in to the realm before returning.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CertsrvError::Config`] if the HTTP client or realm
    /// configuration cannot be set up, and
    /// [`crate::CertsrvError::KerberosLogin`] if the Kerberos login fails.
    pub async fn new(config: CertsrvClientConfig) -> Result<Self> {
        let transport = AuthenticatedTransport::connect(&config).await?;
        tracing::debug!(
            server = %config.server_url,
            mechanism = transport.mechanism(),
            "certsrv client ready"
        );
        Ok(Self { config, transport })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &CertsrvClientConfig {
        &self.config
    }

    /// Get the authenticated transport.
    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    /// Submit a CSR for `template` and retrieve the issued certificate and
    /// chain.
    ///
    /// `attributes` are extra `name:value` lines for the CA, separated by
    /// CRLF; pass an empty string for none.
    ///
    /// # Errors
    ///
    /// - [`crate::CertsrvError::InvalidRequest`] if the inputs are unusable
    /// - [`crate::CertsrvError::Pending`] if the request awaits approval
    /// - [`crate::CertsrvError::Denied`] with the CA's disposition message
    /// - [`crate::CertsrvError::UnknownResponse`] for unrecognized pages
    /// - transport errors from any of the three requests
    pub async fn enroll(
        &self,
        csr: &str,
        template: &str,
        attributes: &str,
    ) -> Result<CertificateArtifacts> {
        let request = EnrollmentRequest::new(csr, template, attributes)?;
        self.enroll_request(&request).await
    }

    /// Enroll with a prepared request.
    pub async fn enroll_request(&self, request: &EnrollmentRequest) -> Result<CertificateArtifacts> {
        let id = self.submit(request).await?;
        self.retrieve_certificates(&id).await
    }

    /// Submit a request and return the ID of the issued certificate.
    ///
    /// Fails with the pending, denied or unknown outcome when the CA did not
    /// issue immediately.
    pub async fn submit(&self, request: &EnrollmentRequest) -> Result<RequestId> {
        tracing::info!(template = %request.template(), "Submitting certificate request");

        let submission = operations::build_submission(&self.config, request);
        let response = self.transport.execute(&submission).await?;

        let outcome = disposition::classify(response.body());
        match &outcome {
            DispositionOutcome::Pending { request_id } => tracing::warn!(
                request_id = request_id.as_ref().map(RequestId::as_str),
                "Certificate request is pending"
            ),
            DispositionOutcome::Denied { message } => {
                tracing::warn!(%message, "Certificate request denied")
            }
            DispositionOutcome::Malformed => {
                tracing::warn!("Unrecognized response to certificate request")
            }
            DispositionOutcome::Issued(_) => {}
        }

        let id = outcome.into_result()?;
        tracing::info!(request_id = %id, "Certificate issued");
        Ok(id)
    }

    /// Download the chain and certificate of an issued request.
    pub async fn retrieve_certificates(&self, id: &RequestId) -> Result<CertificateArtifacts> {
        operations::retrieve_artifacts(&self.transport, &self.config, id).await
    }
}
