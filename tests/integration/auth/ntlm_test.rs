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


//! Integration tests for the NTLM handshake

use crate::integration::*;
use base64::prelude::*;

#[tokio::test]
async fn test_handshake_legs() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(5)).await;
    mock.mock_issued_artifacts(5).await;

    let client = mock.client().await;
    client.enroll(CSR, "WebServer", "").await.expect("enrollment failed");

    let requests = mock.inner().received_requests().await.unwrap();
    // negotiate + authenticate for each of the three requests
    assert_eq!(requests.len(), 6);

    for pair in requests.chunks(2) {
        let negotiate = pair[0].headers.get("Authorization").unwrap().to_str().unwrap();
        let authenticate = pair[1].headers.get("Authorization").unwrap().to_str().unwrap();
        assert!(negotiate.starts_with("NTLM TlRMTVNTUAAB"));
        assert!(authenticate.starts_with("NTLM TlRMTVNTUAADAAAA"));
        assert_eq!(pair[0].url, pair[1].url);
    }
}

#[tokio::test]
async fn test_authenticate_message_carries_identity() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(6)).await;
    mock.mock_issued_artifacts(6).await;

    let client = mock.client().await;
    client.enroll(CSR, "WebServer", "").await.expect("enrollment failed");

    let requests = mock.authenticated_requests().await;
    let header = requests[0].headers.get("Authorization").unwrap().to_str().unwrap();
    let message = BASE64_STANDARD
        .decode(header.trim_start_matches("NTLM "))
        .unwrap();

    let utf16 = |s: &str| -> Vec<u8> { s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect() };
    let contains = |needle: &[u8]| message.windows(needle.len()).any(|w| w == needle);
    assert!(contains(&utf16("svc-enroll")));
    assert!(contains(&utf16("EXAMPLE")));
    assert!(!contains(&utf16(PASSWORD)));
}

#[tokio::test]
async fn test_user_agent_on_every_request() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(7)).await;
    mock.mock_issued_artifacts(7).await;

    let client = mock.client().await;
    client.enroll(CSR, "WebServer", "").await.expect("enrollment failed");

    let requests = mock.inner().received_requests().await.unwrap();
    assert!(!requests.is_empty());
    for request in requests {
        assert_eq!(
            request.headers.get("User-Agent").and_then(|v| v.to_str().ok()),
            Some(certsrv_client::USER_AGENT)
        );
    }
}

#[tokio::test]
async fn test_custom_user_agent() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(pending_page(1)).await;

    let config = certsrv_client::CertsrvClientConfig::builder()
        .server_url(mock.url())
        .unwrap()
        .ntlm(USERNAME, PASSWORD)
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
        .build()
        .unwrap();
    let client = certsrv_client::CertsrvClient::new(config).await.unwrap();
    let _ = client.enroll(CSR, "WebServer", "").await;

    let requests = mock.authenticated_requests().await;
    assert_eq!(
        requests[0].headers.get("User-Agent").and_then(|v| v.to_str().ok()),
        Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
    );
}
