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

use base64::prelude::*;
use reqwest::header::{HeaderMap, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;

use super::CaRequest;
use crate::config::NtlmAuth;
use crate::error::{CertsrvError, Result};
use crate::ntlm::{self, ChallengeMessage};

/// NTLM over HTTP: negotiate, challenge, authenticate.
#[derive(Debug)]
pub struct NtlmTransport {
    http: reqwest::Client,
    auth: NtlmAuth,
}

impl NtlmTransport {
    /// Create a transport with the given credentials.
    pub fn new(http: reqwest::Client, auth: NtlmAuth) -> Self {
        Self { http, auth }
    }

    /// Run the handshake for one request and return the final response.
    ///
    /// A first response that is not a 401 carrying an NTLM challenge is
    /// returned as-is for the caller's status handling.
    pub async fn send(&self, request: &CaRequest) -> Result<reqwest::Response> {
        let negotiate = BASE64_STANDARD.encode(ntlm::negotiate_message());
        let response = request
            .to_reqwest(&self.http)
            .header(AUTHORIZATION, format!("NTLM {}", negotiate))
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(challenge) = challenge_from(response.headers())? else {
            tracing::debug!("401 without an NTLM challenge");
            return Ok(response);
        };

        // Drain the 401 body so the connection is reused for the final leg.
        response.bytes().await?;

        let challenge = ChallengeMessage::parse(&challenge)?;
        let authenticate = ntlm::authenticate_message(&self.auth, &challenge);
        tracing::debug!(user = %self.auth.username, "Answering NTLM challenge");

        Ok(request
            .to_reqwest(&self.http)
            .header(
                AUTHORIZATION,
                format!("NTLM {}", BASE64_STANDARD.encode(authenticate)),
            )
            .send()
            .await?)
    }
}

/// Extract the challenge message from `WWW-Authenticate: NTLM <base64>`.
fn challenge_from(headers: &HeaderMap) -> Result<Option<Vec<u8>>> {
    for value in headers.get_all(WWW_AUTHENTICATE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let Some((scheme, token)) = value.trim().split_once(' ') else {
            continue;
        };
        if scheme.eq_ignore_ascii_case("NTLM") {
            let decoded = BASE64_STANDARD
                .decode(token.trim())
                .map_err(|e| CertsrvError::ntlm(format!("invalid challenge encoding: {}", e)))?;
            return Ok(Some(decoded));
        }
    }
    Ok(None)
}
