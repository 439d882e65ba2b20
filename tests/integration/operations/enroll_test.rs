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


//! Integration tests for POST /certsrv/certfnsh.asp and the full enrollment

use crate::integration::*;
use certsrv_client::{CertsrvError, EnrollmentRequest};
use url::form_urlencoded;

#[tokio::test]
async fn test_successful_enrollment() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(4711)).await;
    mock.mock_issued_artifacts(4711).await;

    let client = mock.client().await;
    let artifacts = client
        .enroll(CSR, "WebServer", "")
        .await
        .expect("enrollment failed");

    assert_eq!(artifacts.id().as_str(), "4711");
    assert_eq!(artifacts.certificate_base64(), CERTIFICATE_B64);
    assert_eq!(artifacts.certificate_chain_base64(), CHAIN_B64);
}

#[tokio::test]
async fn test_submission_form() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(12)).await;
    mock.mock_issued_artifacts(12).await;

    let client = mock.client().await;
    client
        .enroll(CSR, "WebServer", "SAN:dns=www.example.com")
        .await
        .expect("enrollment failed");

    let requests = mock.authenticated_requests().await;
    let submission = requests
        .iter()
        .find(|r| r.url.path() == PATH_SUBMIT)
        .expect("no authenticated submission");

    assert_eq!(
        submission
            .headers
            .get("Content-Type")
            .and_then(|v| v.to_str().ok()),
        Some("application/x-www-form-urlencoded")
    );

    let form: Vec<(String, String)> = form_urlencoded::parse(&submission.body)
        .into_owned()
        .collect();
    let field = |name: &str| {
        form.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(field("Mode"), Some("newreq"));
    assert_eq!(field("CertRequest"), Some(CSR));
    assert_eq!(
        field("CertAttrib"),
        Some("CertificateTemplate:WebServer\r\nSAN:dns=www.example.com")
    );
    assert_eq!(field("FriendlyType"), Some("Saved-Request Certificate"));
    assert_eq!(field("TargetStoreFlags"), Some("0"));
    assert_eq!(field("SaveCert"), Some("yes"));
}

#[tokio::test]
async fn test_enrollment_request_order() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(3)).await;
    mock.mock_issued_artifacts(3).await;

    let client = mock.client().await;
    client.enroll(CSR, "User", "").await.expect("enrollment failed");

    let paths: Vec<String> = mock
        .authenticated_requests()
        .await
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(paths, vec![PATH_SUBMIT, PATH_CHAIN, PATH_CERTIFICATE]);
}

#[tokio::test]
async fn test_pending_enrollment() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(pending_page(57)).await;

    let client = mock.client().await;
    let err = client.enroll(CSR, "WebServer", "").await.unwrap_err();

    assert!(err.is_pending(), "expected pending, got {:?}", err);
    assert_eq!(err.request_id(), Some("57"));

    // No download is attempted for a pending request
    let requests = mock.authenticated_requests().await;
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_denied_enrollment() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(denied_page("Denied by Policy Module")).await;

    let client = mock.client().await;
    let err = client.enroll(CSR, "WebServer", "").await.unwrap_err();

    assert!(err.is_denied());
    assert_eq!(err.to_string(), "Denied by Policy Module");
    match err {
        CertsrvError::Denied { message } => assert_eq!(message, "Denied by Policy Module"),
        other => panic!("expected Denied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unrecognized_submission_page() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit("<html><body>Something went wrong</body></html>".to_string())
        .await;

    let client = mock.client().await;
    let err = client.enroll(CSR, "WebServer", "").await.unwrap_err();

    assert!(matches!(err, CertsrvError::UnknownResponse));
    assert_eq!(err.to_string(), "an unknown error occurred");
}

#[tokio::test]
async fn test_submit_returns_request_id() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(99)).await;

    let client = mock.client().await;
    let request = EnrollmentRequest::new(CSR, "WebServer", "").unwrap();
    let id = client.submit(&request).await.expect("submit failed");
    assert_eq!(id.as_str(), "99");
}

#[tokio::test]
async fn test_invalid_request_sends_nothing() {
    let mock = MockCertsrv::start().await;

    let client = mock.client().await;
    let err = client.enroll("", "WebServer", "").await.unwrap_err();
    assert!(matches!(err, CertsrvError::InvalidRequest(_)));

    let err = client.enroll(CSR, "", "").await.unwrap_err();
    assert!(matches!(err, CertsrvError::InvalidRequest(_)));

    assert!(mock
        .inner()
        .received_requests()
        .await
        .unwrap_or_default()
        .is_empty());
}
