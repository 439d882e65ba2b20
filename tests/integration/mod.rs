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

//! Integration test utilities and helpers
//!
//! This module provides a mock certsrv site that speaks NTLM, along with
//! the HTML pages and certificate bodies the CA serves.

#![allow(dead_code)]

use base64::prelude::*;
use certsrv_client::{CertsrvClient, CertsrvClientConfig};
use wiremock::matchers::{header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Content types served by certsrv
pub const CONTENT_TYPE_PKIX_CERT: &str = "application/pkix-cert";
pub const CONTENT_TYPE_PKCS7: &str = "application/x-pkcs7-certificates";
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// certsrv endpoint paths
pub const PATH_SUBMIT: &str = "/certsrv/certfnsh.asp";
pub const PATH_CERTIFICATE: &str = "/certsrv/certnew.cer";
pub const PATH_CHAIN: &str = "/certsrv/certnew.p7b";

/// Authorization header of the first (NEGOTIATE) leg.
pub const NTLM_NEGOTIATE: &str = "^NTLM TlRMTVNTUAAB";
/// Authorization header of the final (AUTHENTICATE) leg.
pub const NTLM_AUTHENTICATE: &str = "^NTLM TlRMTVNTUAADAAAA";

pub const CSR: &str = "-----BEGIN CERTIFICATE REQUEST-----\n\
MIICvDCCAaQCAQAwdzELMAkGA1UEBhMCVVMxDTALBgNVBAgMBFV0YWgxDzANBgNV\n\
-----END CERTIFICATE REQUEST-----\n";

pub const CERTIFICATE_B64: &str = "MIIDdzCCAl+gAwIBAgIEAgAAuTANBgkqhkiG9w0BAQUFADBa";
pub const CHAIN_B64: &str = "MIIGLwYJKoZIhvcNAQcCoIIGIDCCBhwCAQExADALBgkqhkiG";

pub const USERNAME: &str = "EXAMPLE\\svc-enroll";
pub const PASSWORD: &str = "Passw0rd!";

/// A minimal NTLM CHALLENGE message.
pub fn ntlm_challenge() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(b"NTLMSSP\0");
    msg.extend_from_slice(&2u32.to_le_bytes());
    // empty target name
    msg.extend_from_slice(&[0u8; 8]);
    // UNICODE | REQUEST_TARGET | NTLM | EXTENDED_SESSIONSECURITY
    msg.extend_from_slice(&0x0008_0205u32.to_le_bytes());
    msg.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    msg
}

/// certsrv page for an issued request.
pub fn issued_page(id: u32) -> String {
    format!(
        "<html><head><title>Microsoft Active Directory Certificate Services</title></head>\n\
         <body><h3>Certificate Issued</h3>\n\
         <p>The certificate you requested was issued to you.</p>\n\
         <a href=\"certnew.cer?ReqID={id}&amp;Enc=b64\">Base 64 encoded</a>\n\
         <script>function handleGetCert() {{ location=\"certnew.cer?ReqID={id}&\"+getEncoding(); }}</script>\n\
         </body></html>"
    )
}

/// certsrv page for a request awaiting approval.
pub fn pending_page(id: u32) -> String {
    format!(
        "<html><body><h3>Certificate Pending</h3>\n\
         <p>Your certificate request has been received. However, you must wait \
         for an administrator to issue the certificate you requested.</p>\n\
         <p>Your Request Id is {id}.</p></body></html>"
    )
}

/// certsrv page for a denied request.
pub fn denied_page(message: &str) -> String {
    format!(
        "<html><body><h3>Certificate Request Denied</h3>\n\
         <p>Your certificate request was denied.</p>\n\
         <p>The disposition message is \"{message}\"</p>\n\
         <pre>Contact your administrator for further information.\n\
         The disposition message is \"{message}\"</pre></body></html>"
    )
}

/// Mock certsrv site builder for integration tests
pub struct MockCertsrv {
    server: MockServer,
}

impl MockCertsrv {
    /// Start a mock site that answers every NEGOTIATE with a challenge.
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(header_regex("Authorization", NTLM_NEGOTIATE))
            .respond_with(ResponseTemplate::new(401).insert_header(
                "WWW-Authenticate",
                format!("NTLM {}", BASE64_STANDARD.encode(ntlm_challenge())),
            ))
            .mount(&server)
            .await;

        Self { server }
    }

    /// Get the base URL of the mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get a reference to the inner MockServer for custom mocking
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Requests that completed the NTLM handshake.
    pub async fn authenticated_requests(&self) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| {
                r.headers
                    .get("Authorization")
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.starts_with("NTLM TlRMTVNTUAADAAAA"))
            })
            .collect()
    }

    /// Answer the submission with an HTML page.
    pub async fn mock_submit(&self, page: String) {
        Mock::given(method("POST"))
            .and(path(PATH_SUBMIT))
            .and(header_regex("Authorization", NTLM_AUTHENTICATE))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page, CONTENT_TYPE_HTML))
            .mount(&self.server)
            .await;
    }

    /// Answer a download with the given status, body and content type.
    pub async fn mock_download(
        &self,
        endpoint: &str,
        id: u32,
        status: u16,
        body: &str,
        content_type: &str,
    ) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(query_param("ReqID", id.to_string()))
            .and(query_param("Enc", "b64"))
            .and(header_regex("Authorization", NTLM_AUTHENTICATE))
            .respond_with(
                ResponseTemplate::new(status).set_body_raw(body.to_string(), content_type),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve the certificate and chain of an issued request.
    pub async fn mock_issued_artifacts(&self, id: u32) {
        self.mock_download(PATH_CHAIN, id, 200, CHAIN_B64, CONTENT_TYPE_PKCS7)
            .await;
        self.mock_download(PATH_CERTIFICATE, id, 200, CERTIFICATE_B64, CONTENT_TYPE_PKIX_CERT)
            .await;
    }

    /// Client configuration for this site.
    pub fn config(&self) -> CertsrvClientConfig {
        CertsrvClientConfig::builder()
            .server_url(self.url())
            .expect("Valid URL")
            .ntlm(USERNAME, PASSWORD)
            .build()
            .expect("Valid config")
    }

    /// NTLM client for this site.
    pub async fn client(&self) -> CertsrvClient {
        CertsrvClient::new(self.config())
            .await
            .expect("Client creation failed")
    }
}
