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

//! Retrieval of issued certificates (GET /certsrv/certnew.{p7b,cer}).
//!
//! Success is recognized purely by the response Content-Type. On failure
//! the CA serves its HTML error page with a 200 status, so any other
//! content type sends the body through [`classify`] and the resulting
//! outcome becomes the error.

use crate::config::CertsrvClientConfig;
use crate::error::Result;
use crate::operations::disposition::classify;
use crate::transport::{AuthenticatedTransport, CaRequest, CaResponse};
use crate::types::{content_types, endpoints, CertificateArtifacts, RequestId};

/// Encoding selector for base64 (PEM body without armor) downloads.
pub const ENCODING_BASE64: &str = "b64";

/// A downloadable artifact of an issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// PKCS#7 certificate chain.
    Chain,
    /// Leaf certificate.
    Certificate,
}

impl Artifact {
    /// Endpoint path.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Chain => endpoints::CHAIN,
            Self::Certificate => endpoints::CERTIFICATE,
        }
    }

    /// The only Content-Type accepted as success.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Chain => content_types::PKCS7_CERTIFICATES,
            Self::Certificate => content_types::PKIX_CERT,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Certificate => "certificate",
        }
    }
}

/// Build the download request for one artifact.
pub fn build_retrieval(config: &CertsrvClientConfig, artifact: Artifact, id: &RequestId) -> CaRequest {
    let mut url = config.build_url(artifact.path());
    url.query_pairs_mut()
        .append_pair("ReqID", id.as_str())
        .append_pair("Enc", ENCODING_BASE64);
    CaRequest::get(url)
}

/// Accept a download response or turn it into the error its body describes.
pub fn accept_artifact(artifact: Artifact, response: CaResponse) -> Result<String> {
    let expected = artifact.content_type();
    if response.content_type() == Some(expected) && !response.body().is_empty() {
        return Ok(response.into_body());
    }

    tracing::debug!(
        artifact = artifact.name(),
        content_type = response.content_type().unwrap_or("<none>"),
        expected,
        "Unexpected content type, classifying response body"
    );
    Err(classify(response.body()).into_error())
}

/// Download one artifact.
pub async fn fetch_artifact(
    transport: &AuthenticatedTransport,
    config: &CertsrvClientConfig,
    artifact: Artifact,
    id: &RequestId,
) -> Result<String> {
    let request = build_retrieval(config, artifact, id);
    let response = transport.execute(&request).await?;
    accept_artifact(artifact, response)
}

/// Download the chain, then the leaf certificate, stopping at the first
/// failure.
pub async fn retrieve_artifacts(
    transport: &AuthenticatedTransport,
    config: &CertsrvClientConfig,
    id: &RequestId,
) -> Result<CertificateArtifacts> {
    let chain = fetch_artifact(transport, config, Artifact::Chain, id).await?;
    let certificate = fetch_artifact(transport, config, Artifact::Certificate, id).await?;

    tracing::info!(request_id = %id, "Retrieved certificate and chain");
    Ok(CertificateArtifacts::new(id.clone(), certificate, chain))
}
