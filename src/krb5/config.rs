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

//! krb5.conf parsing and realm configuration lookup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CertsrvError, Result};

/// Environment variable holding realm configuration text.
pub const KRB5CONF_ENV: &str = "KRB5CONF";

/// Well-known system configuration path.
pub const SYSTEM_KRB5_CONF: &str = "/etc/krb5.conf";

/// Default KDC port.
pub const KDC_PORT: u16 = 88;

/// The parts of a krb5.conf this client uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Krb5Config {
    default_realm: Option<String>,
    realms: HashMap<String, Vec<String>>,
}

impl Krb5Config {
    /// Parse krb5.conf text.
    ///
    /// Only `[libdefaults] default_realm` and the `kdc` entries of
    /// `[realms]` are read; other sections and relations are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut section = String::new();
        let mut nesting: Vec<String> = Vec::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let name = line
                    .strip_prefix('[')
                    .and_then(|l| l.strip_suffix(']'))
                    .ok_or_else(|| {
                        CertsrvError::config(format!(
                            "krb5.conf line {}: malformed section header",
                            lineno + 1
                        ))
                    })?;
                section = name.trim().to_string();
                nesting.clear();
                continue;
            }

            if line == "}" {
                if nesting.pop().is_none() {
                    return Err(CertsrvError::config(format!(
                        "krb5.conf line {}: unbalanced '}}'",
                        lineno + 1
                    )));
                }
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::debug!(line = lineno + 1, "Skipping unrecognized krb5.conf line");
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            if value == "{" {
                nesting.push(key.to_string());
                continue;
            }

            match (section.as_str(), nesting.as_slice()) {
                ("libdefaults", []) if key == "default_realm" => {
                    config.default_realm.get_or_insert_with(|| value.to_string());
                }
                ("realms", [realm]) if key == "kdc" => {
                    config
                        .realms
                        .entry(realm.clone())
                        .or_default()
                        .push(value.to_string());
                }
                ("realms", [realm]) => {
                    config.realms.entry(realm.clone()).or_default();
                }
                _ => {}
            }
        }

        if !nesting.is_empty() {
            return Err(CertsrvError::config("krb5.conf has an unterminated '{' block"));
        }
        Ok(config)
    }

    /// Read and parse a krb5.conf file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CertsrvError::config(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// The configured default realm, which must be non-empty.
    pub fn default_realm(&self) -> Result<&str> {
        match self.default_realm.as_deref() {
            Some(realm) if !realm.is_empty() => Ok(realm),
            _ => Err(CertsrvError::config("krb5.conf has no default_realm")),
        }
    }

    /// KDC addresses for a realm, each with a port.
    pub fn kdcs(&self, realm: &str) -> Result<Vec<String>> {
        let kdcs = self
            .realms
            .get(realm)
            .or_else(|| {
                self.realms
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(realm))
                    .map(|(_, kdcs)| kdcs)
            })
            .filter(|kdcs| !kdcs.is_empty())
            .ok_or_else(|| {
                CertsrvError::config(format!("no kdc configured for realm {}", realm))
            })?;
        Ok(kdcs.iter().map(|kdc| with_default_port(kdc)).collect())
    }
}

fn with_default_port(kdc: &str) -> String {
    let kdc = kdc
        .strip_prefix("tcp/")
        .or_else(|| kdc.strip_prefix("udp/"))
        .unwrap_or(kdc);
    let has_port = match kdc.rsplit_once(':') {
        Some((host, port)) => {
            port.parse::<u16>().is_ok() && (!host.contains(':') || host.ends_with(']'))
        }
        None => false,
    };
    if has_port {
        kdc.to_string()
    } else if kdc.contains(':') && !kdc.starts_with('[') {
        format!("[{}]:{}", kdc, KDC_PORT)
    } else {
        format!("{}:{}", kdc, KDC_PORT)
    }
}

/// Where the realm configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Krb5ConfigSource {
    /// Configuration text supplied by the caller.
    Inline(String),
    /// Configuration text taken from the `KRB5CONF` environment variable.
    Environment(String),
    /// A configuration file.
    File(PathBuf),
}

impl Krb5ConfigSource {
    /// Resolve in priority order: explicit text, then `KRB5CONF`, then
    /// `/etc/krb5.conf`.
    pub fn resolve(explicit: Option<&str>) -> Self {
        Self::resolve_with(
            explicit,
            std::env::var(KRB5CONF_ENV).ok(),
            Path::new(SYSTEM_KRB5_CONF),
        )
    }

    /// Resolve against an explicit environment value and fallback path.
    pub fn resolve_with(explicit: Option<&str>, env_value: Option<String>, path: &Path) -> Self {
        if let Some(text) = explicit.filter(|t| !t.trim().is_empty()) {
            return Self::Inline(text.to_string());
        }
        if let Some(text) = env_value.filter(|t| !t.trim().is_empty()) {
            return Self::Environment(text);
        }
        Self::File(path.to_path_buf())
    }

    /// Parse the configuration.
    pub fn load(&self) -> Result<Krb5Config> {
        match self {
            Self::Inline(text) => Krb5Config::parse(text).map_err(|e| {
                CertsrvError::config(format!("could not load krb5.conf: {}", detail(e)))
            }),
            Self::Environment(text) => Krb5Config::parse(text).map_err(|e| {
                CertsrvError::config(format!(
                    "could not load krb5.conf from {} environment variable: {}",
                    KRB5CONF_ENV,
                    detail(e)
                ))
            }),
            Self::File(path) => Krb5Config::load(path).map_err(|e| {
                CertsrvError::config(format!(
                    "could not load krb5.conf from {}: {}",
                    path.display(),
                    detail(e)
                ))
            }),
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Inline(_) => "inline configuration".to_string(),
            Self::Environment(_) => format!("{} environment variable", KRB5CONF_ENV),
            Self::File(path) => path.display().to_string(),
        }
    }
}

fn detail(err: CertsrvError) -> String {
    match err {
        CertsrvError::Config(msg) => msg,
        other => other.to_string(),
    }
}
