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

//! Error types for the certsrv client.
//!
//! This module defines all error types that can occur while talking to a
//! certsrv web enrollment endpoint: configuration and login errors raised
//! while the client is built, transport errors raised per request, and the
//! protocol outcomes recovered from the CA's HTML pages.

use thiserror::Error;

/// Result type alias using [`CertsrvError`].
pub type Result<T> = std::result::Result<T, CertsrvError>;

/// Errors that can occur during certsrv client operations.
#[derive(Debug, Error)]
pub enum CertsrvError {
    /// Invalid client or realm configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kerberos login (AS exchange) failed while building the client.
    #[error("could not login client with kerberos authentication: {0}")]
    KerberosLogin(String),

    /// Kerberos service ticket or SPNEGO token could not be produced.
    #[error("Kerberos error: {0}")]
    Kerberos(String),

    /// NTLM handshake failed.
    #[error("NTLM error: {0}")]
    Ntlm(String),

    /// HTTP request could not be sent or its body could not be read.
    #[error("error making request: {0}")]
    Http(#[from] reqwest::Error),

    /// The CA answered with an HTTP status other than 200.
    #[error("status error: {status}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The enrollment request could not be built from the caller's data.
    #[error("Invalid enrollment request: {0}")]
    InvalidRequest(String),

    /// The CA accepted the request but has not issued a certificate yet.
    #[error("{}", pending_message(.request_id))]
    Pending {
        /// Request ID reported on the pending page, if one was present.
        request_id: Option<String>,
    },

    /// The CA denied the request.
    #[error("{message}")]
    Denied {
        /// Disposition message reported by the CA.
        message: String,
    },

    /// The CA response did not match any recognized page shape.
    #[error("an unknown error occurred")]
    UnknownResponse,

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn pending_message(request_id: &Option<String>) -> String {
    match request_id {
        Some(id) => format!("certificate pending for request id {}", id),
        None => "certificate pending".to_string(),
    }
}

impl CertsrvError {
    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Kerberos login error with the given message.
    pub fn kerberos_login(msg: impl Into<String>) -> Self {
        Self::KerberosLogin(msg.into())
    }

    /// Create a Kerberos error with the given message.
    pub fn kerberos(msg: impl Into<String>) -> Self {
        Self::Kerberos(msg.into())
    }

    /// Create an NTLM error with the given message.
    pub fn ntlm(msg: impl Into<String>) -> Self {
        Self::Ntlm(msg.into())
    }

    /// Create an invalid request error with the given message.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an unexpected status error.
    pub fn unexpected_status(status: u16) -> Self {
        Self::UnexpectedStatus { status }
    }

    /// Create a pending error.
    pub fn pending(request_id: Option<String>) -> Self {
        Self::Pending { request_id }
    }

    /// Create a denied error carrying the CA's disposition message.
    pub fn denied(message: impl Into<String>) -> Self {
        Self::Denied {
            message: message.into(),
        }
    }

    /// Returns true if the CA reported the request as pending.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Returns true if the CA explicitly denied the request.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// Returns the request ID carried by a pending error.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Pending { request_id } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this is a status error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status } => Some(*status),
            _ => None,
        }
    }
}
