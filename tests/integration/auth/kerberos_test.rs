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


//! Integration tests for Kerberos client setup

use certsrv_client::{CertsrvClient, CertsrvClientConfig, CertsrvError};
use std::time::Duration;

fn kerberos_config(krb5_conf: &str) -> CertsrvClientConfig {
    let mut config = CertsrvClientConfig::builder()
        .server_url("ca.example.com")
        .unwrap()
        .kerberos("svc-enroll", "password")
        .krb5_conf(krb5_conf)
        .build()
        .unwrap();
    if let certsrv_client::AuthMethod::Kerberos(auth) = &mut config.auth {
        auth.kdc_timeout = Duration::from_secs(2);
    }
    config
}

#[tokio::test]
async fn test_unreachable_kdc_is_login_error() {
    let config = kerberos_config(
        "[libdefaults]\n  default_realm = EXAMPLE.COM\n\n\
         [realms]\n  EXAMPLE.COM = {\n    kdc = 127.0.0.1:9\n  }\n",
    );

    let err = CertsrvClient::new(config).await.unwrap_err();

    assert!(matches!(err, CertsrvError::KerberosLogin(_)), "got {:?}", err);
    assert!(err
        .to_string()
        .starts_with("could not login client with kerberos authentication"));
}

#[tokio::test]
async fn test_missing_default_realm_is_config_error() {
    let config = kerberos_config("[realms]\n  EXAMPLE.COM = {\n    kdc = 127.0.0.1:9\n  }\n");

    let err = CertsrvClient::new(config).await.unwrap_err();

    assert!(matches!(err, CertsrvError::Config(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_realm_without_kdc_is_config_error() {
    let config = kerberos_config("[libdefaults]\n  default_realm = EXAMPLE.COM\n");

    let err = CertsrvClient::new(config).await.unwrap_err();

    assert!(matches!(err, CertsrvError::Config(_)), "got {:?}", err);
}
