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


//! Integration tests for HTTP status handling

use crate::integration::*;
use certsrv_client::{CertsrvClient, CertsrvClientConfig, CertsrvError, RequestId};
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_server_error_on_submit() {
    let mock = MockCertsrv::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_SUBMIT))
        .and(header_regex("Authorization", NTLM_AUTHENTICATE))
        .respond_with(ResponseTemplate::new(500))
        .mount(mock.inner())
        .await;

    let client = mock.client().await;
    let err = client.enroll(CSR, "WebServer", "").await.unwrap_err();

    assert!(matches!(err, CertsrvError::UnexpectedStatus { status: 500 }));
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "status error: 500");
}

#[tokio::test]
async fn test_rejected_credentials() {
    let mock = MockCertsrv::start().await;
    Mock::given(header_regex("Authorization", NTLM_AUTHENTICATE))
        .respond_with(ResponseTemplate::new(401))
        .mount(mock.inner())
        .await;

    let client = mock.client().await;
    let err = client.enroll(CSR, "WebServer", "").await.unwrap_err();

    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let mock = MockCertsrv::start().await;
    Mock::given(method("GET"))
        .and(path(PATH_CHAIN))
        .and(header_regex("Authorization", NTLM_AUTHENTICATE))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/certsrv/"))
        .mount(mock.inner())
        .await;

    let client = mock.client().await;
    let err = client
        .retrieve_certificates(&RequestId::parse("1").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(302));
}

#[tokio::test]
async fn test_not_found_on_download() {
    let mock = MockCertsrv::start().await;
    mock.mock_download(PATH_CHAIN, 2, 404, "", CONTENT_TYPE_HTML)
        .await;

    let client = mock.client().await;
    let err = client
        .retrieve_certificates(&RequestId::parse("2").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, CertsrvError::UnexpectedStatus { status: 404 }));
}

#[tokio::test]
async fn test_connection_refused() {
    // Nothing listens on the discard port of the loopback address
    let config = CertsrvClientConfig::builder()
        .server_url("http://127.0.0.1:9")
        .unwrap()
        .ntlm(USERNAME, PASSWORD)
        .build()
        .unwrap();

    let client = CertsrvClient::new(config).await.unwrap();
    let err = client.enroll(CSR, "WebServer", "").await.unwrap_err();

    assert!(matches!(err, CertsrvError::Http(_)), "got {:?}", err);
}
