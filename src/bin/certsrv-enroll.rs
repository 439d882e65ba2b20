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

//! certsrv Enrollment Command-Line Tool
//!
//! Submits a PEM CSR to the web enrollment pages of a Microsoft CA and
//! saves the issued certificate and chain.
//!
//! # Usage
//!
//! ```text
//! certsrv-enroll [OPTIONS] --template <NAME> --csr <PATH>
//!
//! Options:
//!   -c, --config <PATH>        Settings file (TOML)
//!       --host <HOST>          CA host name or URL
//!   -u, --username <USER>      Account used to authenticate
//!       --password-env <VAR>   Environment variable holding the password
//!       --ntlm                 Authenticate with NTLM instead of Kerberos
//!       --krb5-conf <PATH>     krb5.conf to use for the realm
//!   -t, --template <NAME>      Certificate template
//!   -a, --attributes <ATTR>    Extra request attribute line (repeatable)
//!       --csr <PATH>           PEM certificate request
//!   -o, --output <DIR>         Write <id>.cer and <id>.p7b into DIR
//!   -v, --verbose              Enable verbose output
//!   -q, --quiet                Suppress non-error output
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Kerberos, password from $CERTSRV_PASSWORD, JSON to stdout
//! certsrv-enroll --host ca.example.com -u svc-enroll -t WebServer --csr server.csr
//!
//! # Settings file, files written to ./certs
//! certsrv-enroll -c certsrv.toml -t WebServer --csr server.csr -o certs
//! ```

use certsrv_client::config::{AuthKind, DEFAULT_PASSWORD_ENV, DEFAULT_TIMEOUT};
use certsrv_client::{CertificateArtifacts, CertsrvClient, ClientSettings};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// certsrv Enrollment Command-Line Tool
#[derive(Parser)]
#[command(name = "certsrv-enroll")]
#[command(author = "U.S. Federal Government")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Certificate enrollment through Microsoft certsrv web enrollment", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// CA host name or URL (overrides config)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Account used to authenticate (overrides config)
    #[arg(short, long, value_name = "USER")]
    username: Option<String>,

    /// Environment variable holding the password
    #[arg(long, value_name = "VAR")]
    password_env: Option<String>,

    /// Authenticate with NTLM instead of Kerberos
    #[arg(long)]
    ntlm: bool,

    /// krb5.conf to use for the realm
    #[arg(long, value_name = "PATH")]
    krb5_conf: Option<PathBuf>,

    /// PEM file with CA certificates for an https endpoint
    #[arg(long, value_name = "PATH")]
    ca_cert: Option<PathBuf>,

    /// Certificate template
    #[arg(short, long, value_name = "NAME")]
    template: String,

    /// Extra request attribute line, e.g. `SAN:dns=www.example.com`
    #[arg(short, long = "attributes", value_name = "ATTR")]
    attributes: Vec<String>,

    /// PEM certificate request
    #[arg(long, value_name = "PATH")]
    csr: PathBuf,

    /// Write `<id>.cer` and `<id>.p7b` into this directory instead of
    /// printing JSON
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings_from_cli(&cli)?;
    let config = settings.into_config()?;

    let csr = std::fs::read_to_string(&cli.csr)
        .map_err(|e| format!("Failed to read CSR {}: {}", cli.csr.display(), e))?;
    let attributes = cli.attributes.join("\r\n");

    let client = CertsrvClient::new(config).await?;
    let artifacts = client.enroll(&csr, &cli.template, &attributes).await?;

    match &cli.output {
        Some(dir) => write_artifacts(dir, &artifacts)?,
        None => println!("{}", serde_json::to_string_pretty(&artifacts)?),
    }

    Ok(())
}

/// Merge the settings file (if any) with command-line overrides.
fn settings_from_cli(cli: &Cli) -> Result<ClientSettings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => ClientSettings::load(path)?,
        None => {
            let host = cli.host.clone().ok_or("--host is required without --config")?;
            let username = cli
                .username
                .clone()
                .ok_or("--username is required without --config")?;
            ClientSettings {
                host,
                auth: AuthKind::default(),
                username,
                password_env: DEFAULT_PASSWORD_ENV.to_string(),
                krb5_conf_path: None,
                user_agent: None,
                timeout_secs: DEFAULT_TIMEOUT.as_secs(),
                ca_cert_path: None,
                insecure: false,
            }
        }
    };

    if let Some(host) = &cli.host {
        settings.host = host.clone();
    }
    if let Some(username) = &cli.username {
        settings.username = username.clone();
    }
    if let Some(var) = &cli.password_env {
        settings.password_env = var.clone();
    }
    if cli.ntlm {
        settings.auth = AuthKind::Ntlm;
    }
    if let Some(path) = &cli.krb5_conf {
        settings.krb5_conf_path = Some(path.clone());
    }
    if let Some(path) = &cli.ca_cert {
        settings.ca_cert_path = Some(path.clone());
    }

    Ok(settings)
}

fn write_artifacts(
    dir: &Path,
    artifacts: &CertificateArtifacts,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;

    let cert_path = dir.join(format!("{}.cer", artifacts.id()));
    let chain_path = dir.join(format!("{}.p7b", artifacts.id()));
    std::fs::write(&cert_path, artifacts.certificate_base64())?;
    std::fs::write(&chain_path, artifacts.certificate_chain_base64())?;

    tracing::info!(
        certificate = %cert_path.display(),
        chain = %chain_path.display(),
        "Wrote certificate and chain"
    );
    Ok(())
}
