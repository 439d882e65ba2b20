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

//! Kerberos V5 client for HTTP Negotiate authentication.
//!
//! Covers what a password-authenticated client needs to reach a certsrv
//! endpoint: realm configuration, the AS and TGS exchanges over TCP with
//! AES encryption types, and the SPNEGO token sent to the web server.

pub mod asn1;
pub mod config;
pub mod crypto;
pub mod kdc;
pub mod messages;
pub mod session;
pub mod spnego;

pub use config::{Krb5Config, Krb5ConfigSource, KRB5CONF_ENV};
pub use messages::PrincipalName;
pub use session::{Credential, KerberosSession};
