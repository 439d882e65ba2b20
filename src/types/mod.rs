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

//! Enrollment request and response types.
//!
//! This module provides the values that flow through one enrollment
//! transaction: the caller's request, the CA-assigned request ID, the
//! outcome recovered from a CA page, and the retrieved certificate artifacts.

use std::fmt;

use serde::Serialize;

use crate::error::{CertsrvError, Result};

/// Request identifier assigned by the CA.
///
/// This is the join key between a submission and the retrieval of its
/// issued artifacts. The CA renders it as a decimal number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Parse a request ID, which must be a non-empty string of ASCII digits.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CertsrvError::invalid_request(format!(
                "request id must be numeric, got '{}'",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Get the request ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A certificate enrollment request.
///
/// The CSR and the extra attributes are passed to the CA verbatim. The
/// template name ends up inside the CA's attribute block, one
/// `name:value` pair per line, so it may not contain line breaks or a colon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentRequest {
    csr: String,
    template: String,
    attributes: String,
}

impl EnrollmentRequest {
    /// Create a new enrollment request.
    ///
    /// # Errors
    ///
    /// Returns [`CertsrvError::InvalidRequest`] if the CSR is empty or the
    /// template name is not a valid identifier.
    pub fn new(
        csr: impl Into<String>,
        template: impl Into<String>,
        attributes: impl Into<String>,
    ) -> Result<Self> {
        let csr = csr.into();
        let template = template.into();

        if csr.trim().is_empty() {
            return Err(CertsrvError::invalid_request("CSR is empty"));
        }
        validate_template(&template)?;

        Ok(Self {
            csr,
            template,
            attributes: attributes.into(),
        })
    }

    /// The PEM-encoded certificate signing request.
    pub fn csr(&self) -> &str {
        &self.csr
    }

    /// The certificate template name.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Additional attributes appended after the template line.
    pub fn attributes(&self) -> &str {
        &self.attributes
    }

    /// Build the CA attribute block: the template line followed by the
    /// caller-supplied attributes.
    pub fn cert_attrib(&self) -> String {
        format!(
            "CertificateTemplate:{}\r\n{}",
            self.template, self.attributes
        )
    }
}

fn validate_template(template: &str) -> Result<()> {
    if template.trim().is_empty() {
        return Err(CertsrvError::invalid_request("template name is empty"));
    }
    if let Some(c) = template.chars().find(|c| c.is_control() || *c == ':') {
        return Err(CertsrvError::invalid_request(format!(
            "template name contains invalid character {:?}",
            c
        )));
    }
    Ok(())
}

/// Certificates retrieved for an issued request.
///
/// Only built once both the chain and the leaf certificate were retrieved
/// with the expected content types; there is no partially populated form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateArtifacts {
    id: RequestId,
    certificate_base64: String,
    certificate_chain_base64: String,
}

impl CertificateArtifacts {
    pub(crate) fn new(
        id: RequestId,
        certificate_base64: String,
        certificate_chain_base64: String,
    ) -> Self {
        debug_assert!(!certificate_base64.is_empty());
        debug_assert!(!certificate_chain_base64.is_empty());
        Self {
            id,
            certificate_base64,
            certificate_chain_base64,
        }
    }

    /// The CA request ID.
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Base64-encoded leaf certificate, as returned by the CA.
    pub fn certificate_base64(&self) -> &str {
        &self.certificate_base64
    }

    /// Base64-encoded PKCS#7 certificate chain, as returned by the CA.
    pub fn certificate_chain_base64(&self) -> &str {
        &self.certificate_chain_base64
    }
}

/// Outcome recovered from a CA HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionOutcome {
    /// The page links to the issued certificate.
    Issued(RequestId),

    /// The request was accepted but awaits approval.
    Pending {
        /// Request ID shown on the pending page.
        request_id: Option<RequestId>,
    },

    /// The CA denied the request.
    Denied {
        /// Disposition message shown by the CA.
        message: String,
    },

    /// The page did not match any recognized shape.
    Malformed,
}

impl DispositionOutcome {
    /// Returns the request ID if the certificate was issued.
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Issued(id) => Some(id),
            _ => None,
        }
    }

    /// Returns true if the page reported an issued certificate.
    pub fn is_issued(&self) -> bool {
        matches!(self, Self::Issued(_))
    }

    /// Convert the outcome of a submission into the issued request ID or the
    /// error describing why there is none.
    pub fn into_result(self) -> Result<RequestId> {
        match self {
            Self::Issued(id) => Ok(id),
            other => Err(other.into_error()),
        }
    }

    /// Convert the outcome into an error.
    ///
    /// An `Issued` outcome maps to [`CertsrvError::UnknownResponse`]; this is
    /// only used for pages that were supposed to carry certificate data.
    pub fn into_error(self) -> CertsrvError {
        match self {
            Self::Pending { request_id } => {
                CertsrvError::pending(request_id.map(|id| id.0))
            }
            Self::Denied { message } => CertsrvError::denied(message),
            Self::Issued(_) | Self::Malformed => CertsrvError::UnknownResponse,
        }
    }
}

/// Content types used by the certsrv web enrollment pages.
pub mod content_types {
    /// Submission form body.
    pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

    /// Base64 PKCS#7 certificate chain.
    pub const PKCS7_CERTIFICATES: &str = "application/x-pkcs7-certificates";

    /// Base64 X.509 certificate.
    pub const PKIX_CERT: &str = "application/pkix-cert";
}

/// certsrv endpoint paths.
pub mod endpoints {
    /// Request submission page.
    pub const SUBMIT: &str = "/certsrv/certfnsh.asp";

    /// Certificate chain download.
    pub const CHAIN: &str = "/certsrv/certnew.p7b";

    /// Leaf certificate download.
    pub const CERTIFICATE: &str = "/certsrv/certnew.cer";
}
