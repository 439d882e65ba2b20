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

//! Password-backed Kerberos session.
//!
//! A session logs in once (AS exchange) when it is created, caches the TGT
//! and any service tickets, and logs in again transparently once the TGT has
//! expired. The locks guarding the caches are never held across an await.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info};

use super::config::Krb5Config;
use super::crypto::{etype, key_usage, EncryptionKey};
use super::kdc::KdcClient;
use super::messages::{
    self, error_code, kdc_options, msg_type, pa_type, parse_enc_kdc_rep_part,
    parse_kdc_response, preferred_etype_info, Authenticator, Checksum, ETypeInfo2Entry,
    EncryptedData, KdcReply, KdcReqBody, KdcResponse, PaData, PrincipalName,
};
use super::spnego::{self, gss_flags, GSS_CHECKSUM_TYPE};
use crate::config::KerberosAuth;
use crate::error::{CertsrvError, Result};

/// Tickets this close to expiry are treated as expired.
const EXPIRY_MARGIN: time::Duration = time::Duration::seconds(60);

/// A ticket and the session key that goes with it.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Client realm.
    pub crealm: String,
    /// Client principal as named by the KDC.
    pub client: PrincipalName,
    /// The ticket, as complete DER.
    pub ticket: Vec<u8>,
    /// Session key shared with the ticket's service.
    pub session_key: EncryptionKey,
    /// Ticket expiry.
    pub end_time: OffsetDateTime,
}

impl Credential {
    fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() + EXPIRY_MARGIN >= self.end_time
    }
}

/// A logged-in Kerberos client.
pub struct KerberosSession {
    client: PrincipalName,
    realm: String,
    password: String,
    kdc: KdcClient,
    ticket_lifetime: Duration,
    tgt: Mutex<Option<Credential>>,
    service_tickets: Mutex<HashMap<String, Credential>>,
}

impl std::fmt::Debug for KerberosSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KerberosSession")
            .field("client", &self.client.to_string())
            .field("realm", &self.realm)
            .field("kdc", &self.kdc)
            .finish_non_exhaustive()
    }
}

impl KerberosSession {
    /// Log in with a password against the default realm of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CertsrvError::Config`] if the realm configuration is
    /// unusable and [`CertsrvError::KerberosLogin`] if the AS exchange fails.
    pub async fn login(auth: &KerberosAuth, config: &Krb5Config) -> Result<Self> {
        let realm = config.default_realm()?.to_string();
        let kdc = KdcClient::new(config.kdcs(&realm)?, auth.kdc_timeout);
        let username = strip_realm(&auth.username);
        if username.is_empty() {
            return Err(CertsrvError::kerberos_login("username is empty"));
        }

        let session = Self {
            client: PrincipalName::principal(username),
            realm,
            password: auth.password.clone(),
            kdc,
            ticket_lifetime: auth.ticket_lifetime,
            tgt: Mutex::new(None),
            service_tickets: Mutex::new(HashMap::new()),
        };

        let credential = session.as_exchange().await.map_err(login_error)?;
        info!(
            principal = %credential.client,
            realm = %credential.crealm,
            expires = %credential.end_time,
            "Kerberos login succeeded"
        );
        *session.lock_tgt() = Some(credential);
        Ok(session)
    }

    /// The realm the session logged in to.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// The client principal name.
    pub fn principal(&self) -> &PrincipalName {
        &self.client
    }

    /// Produce a SPNEGO token for an HTTP `Authorization: Negotiate` header.
    pub async fn negotiate_token(&self, service: &PrincipalName) -> Result<Vec<u8>> {
        let credential = self.service_ticket(service).await?;

        let authenticator = Authenticator {
            crealm: credential.crealm.clone(),
            cname: credential.client.clone(),
            cksum: Some(Checksum {
                cksum_type: GSS_CHECKSUM_TYPE,
                value: spnego::gss_checksum(gss_flags::INTEG | gss_flags::CONF),
            }),
            ctime: OffsetDateTime::now_utc(),
            seq_number: Some(rand::random::<u32>() & 0x3fff_ffff),
        };
        let cipher = credential
            .session_key
            .encrypt(key_usage::AP_REQ_AUTHENTICATOR, &authenticator.encode())?;
        let ap_req = messages::ap_req(
            &credential.ticket,
            &EncryptedData::new(credential.session_key.etype(), cipher),
            0,
        );

        Ok(spnego::neg_token_init(&spnego::initial_context_token(&ap_req)))
    }

    /// Get a service ticket, from the cache when still valid.
    pub async fn service_ticket(&self, service: &PrincipalName) -> Result<Credential> {
        let key = service.to_string();
        let cached = self
            .lock_service_tickets()
            .get(&key)
            .filter(|c| !c.is_expired())
            .cloned();
        if let Some(credential) = cached {
            return Ok(credential);
        }

        let tgt = self.tgt().await?;
        let credential = self.tgs_exchange(&tgt, service).await?;
        debug!(service = %key, expires = %credential.end_time, "Obtained service ticket");
        self.lock_service_tickets().insert(key, credential.clone());
        Ok(credential)
    }

    async fn tgt(&self) -> Result<Credential> {
        let current = self.lock_tgt().clone();
        if let Some(credential) = current.filter(|c| !c.is_expired()) {
            return Ok(credential);
        }

        info!(principal = %self.client, "TGT expired, logging in again");
        let credential = self.as_exchange().await.map_err(login_error)?;
        *self.lock_tgt() = Some(credential.clone());
        Ok(credential)
    }

    fn lock_tgt(&self) -> MutexGuard<'_, Option<Credential>> {
        self.tgt.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_service_tickets(&self) -> MutexGuard<'_, HashMap<String, Credential>> {
        self.service_tickets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn request_body(&self, cname: Option<PrincipalName>, sname: PrincipalName) -> KdcReqBody {
        KdcReqBody {
            options: kdc_options::DEFAULT,
            cname,
            realm: self.realm.clone(),
            sname,
            till: OffsetDateTime::now_utc() + self.ticket_lifetime,
            nonce: rand::random::<u32>() & 0x7fff_ffff,
            etypes: etype::SUPPORTED.to_vec(),
        }
    }

    async fn as_exchange(&self) -> Result<Credential> {
        let body = self.request_body(
            Some(self.client.clone()),
            PrincipalName::krbtgt(&self.realm),
        );
        let mut padata = vec![PaData::pac_request()];

        let (reply, key) = match self.send_as_req(&body, &padata).await? {
            KdcResponse::Reply(reply) => (reply, None),
            KdcResponse::Error(err) if err.error_code == error_code::PREAUTH_REQUIRED => {
                let info = preferred_etype_info(&err.method_data()?)?.ok_or_else(|| {
                    CertsrvError::kerberos("KDC offered no supported encryption type")
                })?;
                let key = self.client_key(&info)?;
                debug!(etype = key.etype(), "KDC requires pre-authentication");

                padata.push(PaData::enc_timestamp(&key, OffsetDateTime::now_utc())?);
                match self.send_as_req(&body, &padata).await? {
                    KdcResponse::Reply(reply) => (reply, Some(key)),
                    KdcResponse::Error(err) => return Err(CertsrvError::kerberos(err.to_string())),
                }
            }
            KdcResponse::Error(err) => return Err(CertsrvError::kerberos(err.to_string())),
        };

        let key = match key.filter(|k| k.etype() == reply.enc_part.etype) {
            Some(key) => key,
            None => {
                let info = preferred_etype_info(&reply.padata)?
                    .filter(|i| i.etype == reply.enc_part.etype)
                    .unwrap_or(ETypeInfo2Entry {
                        etype: reply.enc_part.etype,
                        salt: None,
                        s2kparams: None,
                    });
                self.client_key(&info)?
            }
        };

        let plain = key.decrypt(key_usage::AS_REP_ENC_PART, &reply.enc_part.cipher)?;
        self.credential(reply, &plain, body.nonce)
    }

    async fn send_as_req(&self, body: &KdcReqBody, padata: &[PaData]) -> Result<KdcResponse> {
        let reply = self.kdc.exchange(&messages::as_req(body, padata)).await?;
        parse_kdc_response(&reply, msg_type::AS_REP)
    }

    fn client_key(&self, info: &ETypeInfo2Entry) -> Result<EncryptionKey> {
        let salt = info
            .salt
            .clone()
            .unwrap_or_else(|| self.client.salt(&self.realm));
        EncryptionKey::from_password(
            info.etype,
            &self.password,
            salt.as_bytes(),
            info.s2kparams.as_deref(),
        )
    }

    async fn tgs_exchange(&self, tgt: &Credential, service: &PrincipalName) -> Result<Credential> {
        let body = self.request_body(None, service.clone());
        let nonce = body.nonce;
        let body = body.encode();

        let authenticator = Authenticator {
            crealm: tgt.crealm.clone(),
            cname: tgt.client.clone(),
            cksum: Some(Checksum {
                cksum_type: tgt.session_key.checksum_type(),
                value: tgt
                    .session_key
                    .checksum(key_usage::TGS_REQ_AUTH_CKSUM, &body)?,
            }),
            ctime: OffsetDateTime::now_utc(),
            seq_number: None,
        };
        let cipher = tgt
            .session_key
            .encrypt(key_usage::TGS_REQ_AUTHENTICATOR, &authenticator.encode())?;
        let ap_req = messages::ap_req(
            &tgt.ticket,
            &EncryptedData::new(tgt.session_key.etype(), cipher),
            0,
        );

        let request = messages::tgs_req(
            body,
            &[PaData {
                pa_type: pa_type::TGS_REQ,
                value: ap_req,
            }],
        );
        let reply = match parse_kdc_response(&self.kdc.exchange(&request).await?, msg_type::TGS_REP)? {
            KdcResponse::Reply(reply) => reply,
            KdcResponse::Error(err) => {
                return Err(CertsrvError::kerberos(format!(
                    "could not get service ticket for {}: {}",
                    service, err
                )))
            }
        };

        let plain = tgt
            .session_key
            .decrypt(key_usage::TGS_REP_ENC_PART, &reply.enc_part.cipher)?;
        self.credential(reply, &plain, nonce)
    }

    fn credential(&self, reply: KdcReply, plain: &[u8], nonce: u32) -> Result<Credential> {
        let part = parse_enc_kdc_rep_part(plain)?;
        if part.nonce != nonce as i64 {
            return Err(CertsrvError::kerberos("KDC reply nonce does not match request"));
        }
        Ok(Credential {
            crealm: reply.crealm,
            client: reply.cname,
            ticket: reply.ticket,
            session_key: part.key,
            end_time: part.end_time,
        })
    }
}

fn strip_realm(username: &str) -> &str {
    match username.rsplit_once('@') {
        Some((user, _realm)) => user,
        None => username,
    }
}

fn login_error(err: CertsrvError) -> CertsrvError {
    match err {
        CertsrvError::Kerberos(msg) => CertsrvError::kerberos_login(msg),
        CertsrvError::KerberosLogin(msg) => CertsrvError::kerberos_login(msg),
        other => CertsrvError::kerberos_login(other.to_string()),
    }
}
