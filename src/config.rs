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

//! Configuration types for the certsrv client.
//!
//! This module provides configuration structures for setting up a certsrv
//! client, including the CA address, the Windows-integrated authentication
//! method, and HTTP settings. [`ClientSettings`] is the TOML form of the same
//! information used by the command-line tool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CertsrvError, Result};

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a single KDC exchange.
pub const DEFAULT_KDC_TIMEOUT: Duration = Duration::from_secs(10);

/// Default requested ticket lifetime.
pub const DEFAULT_TICKET_LIFETIME: Duration = Duration::from_secs(10 * 60 * 60);

/// Environment variable read for the password when none is configured.
pub const DEFAULT_PASSWORD_ENV: &str = "CERTSRV_PASSWORD";

/// Configuration for a certsrv client.
#[derive(Clone)]
pub struct CertsrvClientConfig {
    /// CA web enrollment base URL (e.g., "http://ca.example.com").
    pub server_url: Url,

    /// Authentication method used for every request.
    pub auth: AuthMethod,

    /// User-Agent sent with every request.
    ///
    /// The CA answers certificate downloads with an HTML page instead of
    /// the certificate when this header is missing.
    pub user_agent: String,

    /// Request timeout duration.
    pub timeout: Duration,

    /// Trust anchor configuration for https CA endpoints.
    pub trust_anchors: TrustAnchors,
}

impl std::fmt::Debug for CertsrvClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertsrvClientConfig")
            .field("server_url", &self.server_url)
            .field("auth", &self.auth)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("trust_anchors", &self.trust_anchors)
            .finish()
    }
}

impl CertsrvClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CertsrvClientConfigBuilder {
        CertsrvClientConfigBuilder::new()
    }

    /// Build the URL of a certsrv endpoint.
    pub fn build_url(&self, path: &str) -> Url {
        let mut url = self.server_url.clone();
        url.set_path(path);
        url.set_query(None);
        url
    }

    /// Host name of the CA, used to form the Kerberos service principal.
    pub fn host(&self) -> Option<&str> {
        self.server_url.host_str()
    }
}

/// Parse a CA address.
///
/// A bare host name (`ca.example.com`) is taken to mean the plain-HTTP
/// enrollment site on that host.
pub fn parse_server_url(server: &str) -> std::result::Result<Url, url::ParseError> {
    if server.contains("://") {
        Url::parse(server)
    } else {
        Url::parse(&format!("http://{}", server))
    }
}

/// Builder for [`CertsrvClientConfig`].
#[derive(Default)]
pub struct CertsrvClientConfigBuilder {
    server_url: Option<Url>,
    auth: Option<AuthMethod>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    trust_anchors: Option<TrustAnchors>,
}

impl CertsrvClientConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CA address, either a URL or a bare host name.
    pub fn server_url(mut self, server: impl AsRef<str>) -> std::result::Result<Self, url::ParseError> {
        self.server_url = Some(parse_server_url(server.as_ref())?);
        Ok(self)
    }

    /// Set the CA address from a pre-parsed URL.
    pub fn server_url_parsed(mut self, url: Url) -> Self {
        self.server_url = Some(url);
        self
    }

    /// Authenticate with Kerberos/SPNEGO using a username and password.
    ///
    /// The realm configuration is resolved when the client is built; see
    /// [`crate::krb5::Krb5ConfigSource`].
    pub fn kerberos(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(AuthMethod::Kerberos(KerberosAuth::new(username, password)));
        self
    }

    /// Set inline krb5.conf text for Kerberos authentication.
    ///
    /// Has no effect unless Kerberos authentication was selected first.
    pub fn krb5_conf(mut self, conf: impl Into<String>) -> Self {
        if let Some(AuthMethod::Kerberos(ref mut auth)) = self.auth {
            auth.krb5_conf = Some(conf.into());
        }
        self
    }

    /// Authenticate with NTLM using a username and password.
    ///
    /// A `DOMAIN\user` username is split into its domain and user parts.
    pub fn ntlm(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(AuthMethod::Ntlm(NtlmAuth::new(username, password)));
        self
    }

    /// Set the authentication method directly.
    pub fn auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Override the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use Mozilla's root CA store for https CA endpoints.
    pub fn trust_webpki_roots(mut self) -> Self {
        self.trust_anchors = Some(TrustAnchors::WebPki);
        self
    }

    /// Use explicit CA certificates (PEM) for https CA endpoints.
    pub fn trust_explicit(mut self, ca_certs: Vec<Vec<u8>>) -> Self {
        self.trust_anchors = Some(TrustAnchors::Explicit(ca_certs));
        self
    }

    /// Accept any server certificate (insecure, for testing only).
    pub fn trust_any_insecure(mut self) -> Self {
        self.trust_anchors = Some(TrustAnchors::InsecureAcceptAny);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL or the authentication method is
    /// not set, or if the User-Agent is empty.
    pub fn build(self) -> std::result::Result<CertsrvClientConfig, &'static str> {
        let server_url = self.server_url.ok_or("server_url is required")?;
        let auth = self.auth.ok_or("an authentication method is required")?;
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| crate::USER_AGENT.to_string());

        if user_agent.trim().is_empty() {
            return Err("user_agent must not be empty");
        }
        if server_url.host_str().is_none() {
            return Err("server_url must have a host");
        }

        Ok(CertsrvClientConfig {
            server_url,
            auth,
            user_agent,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            trust_anchors: self.trust_anchors.unwrap_or(TrustAnchors::WebPki),
        })
    }
}

/// Authentication method; exactly one is active per client.
#[derive(Clone, Debug)]
pub enum AuthMethod {
    /// Kerberos tickets presented through SPNEGO (`Negotiate`).
    Kerberos(KerberosAuth),

    /// NTLM challenge-response.
    Ntlm(NtlmAuth),
}

impl AuthMethod {
    /// Short mechanism name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kerberos(_) => "kerberos",
            Self::Ntlm(_) => "ntlm",
        }
    }
}

/// Kerberos password credentials.
#[derive(Clone)]
pub struct KerberosAuth {
    /// Client principal name, without the realm.
    pub username: String,

    /// Password.
    pub password: String,

    /// Inline krb5.conf text, preferred over the environment and system file.
    pub krb5_conf: Option<String>,

    /// Timeout for each KDC exchange.
    pub kdc_timeout: Duration,

    /// Requested ticket lifetime.
    pub ticket_lifetime: Duration,
}

impl KerberosAuth {
    /// Create Kerberos credentials with default timeouts.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            krb5_conf: None,
            kdc_timeout: DEFAULT_KDC_TIMEOUT,
            ticket_lifetime: DEFAULT_TICKET_LIFETIME,
        }
    }
}

impl std::fmt::Debug for KerberosAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KerberosAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("krb5_conf", &self.krb5_conf.is_some())
            .field("kdc_timeout", &self.kdc_timeout)
            .field("ticket_lifetime", &self.ticket_lifetime)
            .finish()
    }
}

/// NTLM password credentials.
#[derive(Clone)]
pub struct NtlmAuth {
    /// Username.
    pub username: String,

    /// Password.
    pub password: String,

    /// Domain; may be left empty.
    pub domain: Option<String>,

    /// Workstation name sent in the AUTHENTICATE message.
    pub workstation: Option<String>,
}

impl NtlmAuth {
    /// Create NTLM credentials, splitting `DOMAIN\user` usernames.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        let (domain, username) = match username.split_once('\\') {
            Some((domain, user)) => (Some(domain.to_string()), user.to_string()),
            None => (None, username),
        };
        Self {
            username,
            password: password.into(),
            domain,
            workstation: None,
        }
    }
}

impl std::fmt::Debug for NtlmAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NtlmAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("workstation", &self.workstation)
            .finish()
    }
}

/// Trust anchor configuration for https CA endpoints.
#[derive(Clone)]
pub enum TrustAnchors {
    /// Use Mozilla's root CA store (webpki-roots).
    WebPki,

    /// Use explicit CA certificates (PEM-encoded).
    Explicit(Vec<Vec<u8>>),

    /// Accept any server certificate (insecure, for testing only).
    ///
    /// **WARNING**: This disables all server certificate verification.
    InsecureAcceptAny,
}

impl std::fmt::Debug for TrustAnchors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebPki => write!(f, "WebPki"),
            Self::Explicit(certs) => write!(f, "Explicit({} certs)", certs.len()),
            Self::InsecureAcceptAny => write!(f, "InsecureAcceptAny"),
        }
    }
}

/// Authentication mechanism selector in [`ClientSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// Kerberos/SPNEGO.
    #[default]
    Kerberos,
    /// NTLM.
    Ntlm,
}

/// Client settings file.
///
/// ```toml
/// host = "ca.example.com"
/// auth = "kerberos"
/// username = "svc-enroll"
/// password_env = "CERTSRV_PASSWORD"
/// krb5_conf_path = "/etc/krb5.conf"
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSettings {
    /// CA host name or URL.
    pub host: String,

    /// Authentication mechanism.
    #[serde(default)]
    pub auth: AuthKind,

    /// Username.
    pub username: String,

    /// Environment variable holding the password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// krb5.conf file to use instead of the environment and system default.
    #[serde(default)]
    pub krb5_conf_path: Option<PathBuf>,

    /// User-Agent override.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// PEM file with CA certificates for an https CA endpoint.
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,

    /// Accept any server certificate (testing only).
    #[serde(default)]
    pub insecure: bool,
}

fn default_password_env() -> String {
    DEFAULT_PASSWORD_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl ClientSettings {
    /// Parse settings from TOML text.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| CertsrvError::config(format!("Invalid TOML: {e}")))
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CertsrvError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Build a client configuration, reading the password from the
    /// configured environment variable.
    pub fn into_config(self) -> Result<CertsrvClientConfig> {
        let password = std::env::var(&self.password_env).map_err(|_| {
            CertsrvError::config(format!(
                "password environment variable {} is not set",
                self.password_env
            ))
        })?;
        self.into_config_with_password(password)
    }

    /// Build a client configuration with an explicit password.
    pub fn into_config_with_password(self, password: String) -> Result<CertsrvClientConfig> {
        let auth = match self.auth {
            AuthKind::Kerberos => {
                let mut auth = KerberosAuth::new(self.username, password);
                if let Some(path) = &self.krb5_conf_path {
                    auth.krb5_conf = Some(std::fs::read_to_string(path).map_err(|e| {
                        CertsrvError::config(format!(
                            "could not load krb5.conf from {}: {e}",
                            path.display()
                        ))
                    })?);
                }
                AuthMethod::Kerberos(auth)
            }
            AuthKind::Ntlm => AuthMethod::Ntlm(NtlmAuth::new(self.username, password)),
        };

        let mut builder = CertsrvClientConfig::builder()
            .server_url(&self.host)?
            .auth(auth)
            .timeout(Duration::from_secs(self.timeout_secs));

        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        if let Some(path) = &self.ca_cert_path {
            builder = builder.trust_explicit(vec![std::fs::read(path)?]);
        }
        if self.insecure {
            builder = builder.trust_any_insecure();
        }

        builder.build().map_err(CertsrvError::config)
    }
}
