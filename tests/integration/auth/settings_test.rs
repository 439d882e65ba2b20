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


//! Integration tests for settings files

use crate::integration::*;
use certsrv_client::{AuthMethod, CertsrvClient, ClientSettings};
use std::io::Write;
use std::time::Duration;

#[tokio::test]
async fn test_enroll_with_settings_file() {
    let mock = MockCertsrv::start().await;
    mock.mock_submit(issued_page(31)).await;
    mock.mock_issued_artifacts(31).await;

    std::env::set_var("CERTSRV_TEST_SETTINGS_PASSWORD", PASSWORD);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "host = \"{}\"\n\
         auth = \"ntlm\"\n\
         username = 'EXAMPLE\\svc-enroll'\n\
         password_env = \"CERTSRV_TEST_SETTINGS_PASSWORD\"\n\
         timeout_secs = 10\n",
        mock.url()
    )
    .unwrap();

    let settings = ClientSettings::load(file.path()).unwrap();
    let config = settings.into_config().unwrap();
    assert_eq!(config.timeout, Duration::from_secs(10));
    match &config.auth {
        AuthMethod::Ntlm(auth) => assert_eq!(auth.domain.as_deref(), Some("EXAMPLE")),
        AuthMethod::Kerberos(_) => panic!("expected ntlm"),
    }

    let client = CertsrvClient::new(config).await.unwrap();
    let artifacts = client.enroll(CSR, "WebServer", "").await.unwrap();
    assert_eq!(artifacts.id().as_str(), "31");
}

#[test]
fn test_missing_password_variable() {
    let settings = ClientSettings::from_toml(
        r#"
        host = "ca.example.com"
        username = "svc-enroll"
        password_env = "CERTSRV_TEST_UNSET_PASSWORD_VARIABLE"
        "#,
    )
    .unwrap();

    let err = settings.into_config().unwrap_err();
    assert!(err.to_string().contains("CERTSRV_TEST_UNSET_PASSWORD_VARIABLE"));
}

#[test]
fn test_krb5_conf_path_is_read() {
    let mut krb5 = tempfile::NamedTempFile::new().unwrap();
    writeln!(krb5, "[libdefaults]\n  default_realm = EXAMPLE.COM").unwrap();

    let settings = ClientSettings::from_toml(&format!(
        "host = \"ca.example.com\"\nusername = \"svc\"\nkrb5_conf_path = '{}'\n",
        krb5.path().display()
    ))
    .unwrap();

    let config = settings
        .into_config_with_password("secret".to_string())
        .unwrap();
    match config.auth {
        AuthMethod::Kerberos(auth) => {
            assert!(auth.krb5_conf.unwrap().contains("default_realm = EXAMPLE.COM"));
        }
        AuthMethod::Ntlm(_) => panic!("expected kerberos"),
    }
}

#[test]
fn test_missing_krb5_conf_path() {
    let settings = ClientSettings::from_toml(
        "host = \"ca.example.com\"\nusername = \"svc\"\nkrb5_conf_path = \"/nonexistent/krb5.conf\"\n",
    )
    .unwrap();

    let err = settings
        .into_config_with_password("secret".to_string())
        .unwrap_err();
    assert!(matches!(err, certsrv_client::CertsrvError::Config(_)));
}
