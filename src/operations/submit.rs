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

//! Request submission (POST /certsrv/certfnsh.asp).
//!
//! The form mirrors what the certsrv "advanced request" page posts when a
//! user pastes a CSR and picks a template.

use url::form_urlencoded;

use crate::config::CertsrvClientConfig;
use crate::transport::CaRequest;
use crate::types::{content_types, endpoints, EnrollmentRequest};

/// Form field names, in the order they are sent.
pub mod fields {
    /// Request mode.
    pub const MODE: &str = "Mode";
    /// The PEM CSR.
    pub const CERT_REQUEST: &str = "CertRequest";
    /// The attribute block, template line first.
    pub const CERT_ATTRIB: &str = "CertAttrib";
    /// Request kind shown in the CA's request list.
    pub const FRIENDLY_TYPE: &str = "FriendlyType";
    /// Certificate store flags.
    pub const TARGET_STORE_FLAGS: &str = "TargetStoreFlags";
    /// Whether the CA keeps the issued certificate.
    pub const SAVE_CERT: &str = "SaveCert";
}

const MODE_NEW_REQUEST: &str = "newreq";
const FRIENDLY_TYPE_SAVED_REQUEST: &str = "Saved-Request Certificate";
const TARGET_STORE_FLAGS_NONE: &str = "0";
const SAVE_CERT_YES: &str = "yes";

/// Encode the submission form body.
pub fn encode_form(request: &EnrollmentRequest) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(fields::MODE, MODE_NEW_REQUEST)
        .append_pair(fields::CERT_REQUEST, request.csr())
        .append_pair(fields::CERT_ATTRIB, &request.cert_attrib())
        .append_pair(fields::FRIENDLY_TYPE, FRIENDLY_TYPE_SAVED_REQUEST)
        .append_pair(fields::TARGET_STORE_FLAGS, TARGET_STORE_FLAGS_NONE)
        .append_pair(fields::SAVE_CERT, SAVE_CERT_YES)
        .finish()
}

/// Build the submission request.
pub fn build_submission(config: &CertsrvClientConfig, request: &EnrollmentRequest) -> CaRequest {
    CaRequest::post(
        config.build_url(endpoints::SUBMIT),
        content_types::FORM_URLENCODED,
        encode_form(request),
    )
}
