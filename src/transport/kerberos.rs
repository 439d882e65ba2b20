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
use reqwest::header::AUTHORIZATION;

use super::CaRequest;
use crate::config::KerberosAuth;
use crate::error::Result;
use crate::krb5::{KerberosSession, Krb5ConfigSource, PrincipalName};

/// HTTP Negotiate with a Kerberos service ticket for `HTTP/<host>`.
#[derive(Debug)]
pub struct KerberosTransport {
    http: reqwest::Client,
    session: KerberosSession,
    service: PrincipalName,
}

impl KerberosTransport {
    /// Resolve the realm configuration and log in.
    pub async fn connect(http: reqwest::Client, auth: &KerberosAuth, host: &str) -> Result<Self> {
        let source = Krb5ConfigSource::resolve(auth.krb5_conf.as_deref());
        tracing::debug!(source = %source.describe(), "Loading Kerberos configuration");
        let krb5_config = source.load()?;

        let session = KerberosSession::login(auth, &krb5_config).await?;
        Ok(Self {
            http,
            session,
            service: PrincipalName::service("HTTP", host),
        })
    }

    /// The logged-in session.
    pub fn session(&self) -> &KerberosSession {
        &self.session
    }

    /// Send a request with a fresh SPNEGO token.
    pub async fn send(&self, request: &CaRequest) -> Result<reqwest::Response> {
        let token = self.session.negotiate_token(&self.service).await?;
        Ok(request
            .to_reqwest(&self.http)
            .header(
                AUTHORIZATION,
                format!("Negotiate {}", BASE64_STANDARD.encode(token)),
            )
            .send()
            .await?)
    }
}
