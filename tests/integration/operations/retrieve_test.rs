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


//! Integration tests for GET /certsrv/certnew.{p7b,cer}

use crate::integration::*;
use certsrv_client::{CertsrvError, RequestId};

#[tokio::test]
async fn test_retrieve_after_approval() {
    let mock = MockCertsrv::start().await;
    mock.mock_issued_artifacts(57).await;

    let client = mock.client().await;
    let artifacts = client
        .retrieve_certificates(&RequestId::parse("57").unwrap())
        .await
        .expect("retrieval failed");

    assert_eq!(artifacts.id().as_str(), "57");
    assert_eq!(artifacts.certificate_base64(), CERTIFICATE_B64);
    assert_eq!(artifacts.certificate_chain_base64(), CHAIN_B64);
}

#[tokio::test]
async fn test_chain_error_page_stops_retrieval() {
    let mock = MockCertsrv::start().await;
    mock.mock_download(
        PATH_CHAIN,
        8,
        200,
        &denied_page("Denied by Policy Module"),
        CONTENT_TYPE_HTML,
    )
    .await;
    mock.mock_download(PATH_CERTIFICATE, 8, 200, CERTIFICATE_B64, CONTENT_TYPE_PKIX_CERT)
        .await;

    let client = mock.client().await;
    let err = client
        .retrieve_certificates(&RequestId::parse("8").unwrap())
        .await
        .unwrap_err();

    assert!(err.is_denied());
    assert_eq!(err.to_string(), "Denied by Policy Module");

    // The leaf is never requested after the chain failed
    let paths: Vec<String> = mock
        .authenticated_requests()
        .await
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(paths, vec![PATH_CHAIN]);
}

#[tokio::test]
async fn test_still_pending_on_retrieval() {
    let mock = MockCertsrv::start().await;
    mock.mock_download(PATH_CHAIN, 9, 200, &pending_page(9), CONTENT_TYPE_HTML)
        .await;

    let client = mock.client().await;
    let err = client
        .retrieve_certificates(&RequestId::parse("9").unwrap())
        .await
        .unwrap_err();

    assert!(err.is_pending());
    assert_eq!(err.request_id(), Some("9"));
}

#[tokio::test]
async fn test_wrong_content_type_for_leaf() {
    let mock = MockCertsrv::start().await;
    mock.mock_download(PATH_CHAIN, 10, 200, CHAIN_B64, CONTENT_TYPE_PKCS7)
        .await;
    mock.mock_download(PATH_CERTIFICATE, 10, 200, CERTIFICATE_B64, "text/plain")
        .await;

    let client = mock.client().await;
    let err = client
        .retrieve_certificates(&RequestId::parse("10").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, CertsrvError::UnknownResponse));
}

#[tokio::test]
async fn test_issued_enrollment_with_failed_download() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(21)).await;
    mock.mock_download(PATH_CHAIN, 21, 200, CHAIN_B64, CONTENT_TYPE_PKCS7)
        .await;
    mock.mock_download(
        PATH_CERTIFICATE,
        21,
        200,
        "<html>Certificate Services is unavailable</html>",
        CONTENT_TYPE_HTML,
    )
    .await;

    let client = mock.client().await;
    let err = client.enroll(CSR, "WebServer", "").await.unwrap_err();

    assert!(matches!(err, CertsrvError::UnknownResponse));
}

#[tokio::test]
async fn test_single_disposition_marker_is_unknown_error() {
    let mock = MockCertsrv::start().await;
    mock.mock_download(
        PATH_CHAIN,
        11,
        200,
        "<html><p>The disposition message is \"Denied by Policy Module\"</p></html>",
        CONTENT_TYPE_HTML,
    )
    .await;

    let client = mock.client().await;
    let err = client
        .retrieve_certificates(&RequestId::parse("11").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, CertsrvError::UnknownResponse));
    assert_eq!(err.to_string(), "an unknown error occurred");
}
