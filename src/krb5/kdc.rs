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

//! KDC exchanges over TCP (RFC 4120 section 7.2.2).

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{CertsrvError, Result};

/// Largest reply accepted from a KDC.
const MAX_REPLY_SIZE: usize = 1 << 20;

/// Sends requests to the KDCs of one realm, trying each in turn.
#[derive(Debug, Clone)]
pub struct KdcClient {
    addresses: Vec<String>,
    timeout: Duration,
}

impl KdcClient {
    /// Create a client for the given `host:port` addresses.
    pub fn new(addresses: Vec<String>, timeout: Duration) -> Self {
        Self { addresses, timeout }
    }

    /// The configured KDC addresses.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Send an encoded request and return the encoded reply from the first
    /// KDC that answers.
    pub async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut last_error = None;

        for address in &self.addresses {
            match tokio::time::timeout(self.timeout, exchange_with(address, request)).await {
                Ok(Ok(reply)) => {
                    debug!(kdc = %address, bytes = reply.len(), "KDC replied");
                    return Ok(reply);
                }
                Ok(Err(e)) => {
                    warn!(kdc = %address, error = %e, "KDC exchange failed");
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    warn!(kdc = %address, "KDC exchange timed out");
                    last_error = Some(format!("timed out after {:?}", self.timeout));
                }
            }
        }

        Err(CertsrvError::kerberos(format!(
            "no KDC reachable: {}",
            last_error.unwrap_or_else(|| "no KDC addresses configured".to_string())
        )))
    }
}

async fn exchange_with(address: &str, request: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(address).await?;

    let len = u32::try_from(request.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "request too large"))?;
    let mut framed = Vec::with_capacity(request.len() + 4);
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(request);
    stream.write_all(&framed).await?;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_REPLY_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("reply of {} bytes exceeds limit", len),
        ));
    }

    let mut reply = vec![0u8; len];
    stream.read_exact(&mut reply).await?;
    Ok(reply)
}
