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

//! Kerberos protocol messages (RFC 4120 section 5).

use std::fmt;

use time::OffsetDateTime;

use super::asn1::{self, Fields, Tlv};
use super::crypto::{self, EncryptionKey};
use crate::error::{CertsrvError, Result};

const PVNO: i64 = 5;

/// Message type numbers.
pub mod msg_type {
    /// AS-REQ
    pub const AS_REQ: i64 = 10;
    /// AS-REP
    pub const AS_REP: i64 = 11;
    /// TGS-REQ
    pub const TGS_REQ: i64 = 12;
    /// TGS-REP
    pub const TGS_REP: i64 = 13;
    /// AP-REQ
    pub const AP_REQ: i64 = 14;
    /// KRB-ERROR
    pub const KRB_ERROR: i64 = 30;
}

/// Pre-authentication data types.
pub mod pa_type {
    /// PA-TGS-REQ (carries the AP-REQ for the TGT).
    pub const TGS_REQ: i32 = 1;
    /// PA-ENC-TIMESTAMP
    pub const ENC_TIMESTAMP: i32 = 2;
    /// PA-ETYPE-INFO2
    pub const ETYPE_INFO2: i32 = 19;
    /// PA-PAC-REQUEST (MS-KILE)
    pub const PAC_REQUEST: i32 = 128;
}

/// Principal name types.
pub mod name_type {
    /// NT-PRINCIPAL
    pub const PRINCIPAL: i32 = 1;
    /// NT-SRV-INST
    pub const SRV_INST: i32 = 2;
    /// NT-SRV-HST
    pub const SRV_HST: i32 = 3;
}

/// KDC option bits.
pub mod kdc_options {
    /// forwardable
    pub const FORWARDABLE: u32 = 0x4000_0000;
    /// renewable
    pub const RENEWABLE: u32 = 0x0080_0000;
    /// canonicalize
    pub const CANONICALIZE: u32 = 0x0001_0000;
    /// renewable-ok
    pub const RENEWABLE_OK: u32 = 0x0000_0010;

    /// Options sent with every AS-REQ and TGS-REQ.
    pub const DEFAULT: u32 = FORWARDABLE | RENEWABLE | CANONICALIZE | RENEWABLE_OK;
}

/// KRB-ERROR codes that get special handling or a readable name.
pub mod error_code {
    /// KDC_ERR_C_PRINCIPAL_UNKNOWN
    pub const C_PRINCIPAL_UNKNOWN: i32 = 6;
    /// KDC_ERR_S_PRINCIPAL_UNKNOWN
    pub const S_PRINCIPAL_UNKNOWN: i32 = 7;
    /// KDC_ERR_ETYPE_NOSUPP
    pub const ETYPE_NOSUPP: i32 = 14;
    /// KDC_ERR_CLIENT_REVOKED
    pub const CLIENT_REVOKED: i32 = 18;
    /// KDC_ERR_KEY_EXPIRED
    pub const KEY_EXPIRED: i32 = 23;
    /// KDC_ERR_PREAUTH_FAILED
    pub const PREAUTH_FAILED: i32 = 24;
    /// KDC_ERR_PREAUTH_REQUIRED
    pub const PREAUTH_REQUIRED: i32 = 25;
    /// KRB_AP_ERR_SKEW
    pub const SKEW: i32 = 37;
    /// KDC_ERR_WRONG_REALM
    pub const WRONG_REALM: i32 = 68;
}

/// A principal name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalName {
    /// Name type.
    pub name_type: i32,
    /// Name components.
    pub components: Vec<String>,
}

impl PrincipalName {
    /// A user principal.
    pub fn principal(user: &str) -> Self {
        Self {
            name_type: name_type::PRINCIPAL,
            components: vec![user.to_string()],
        }
    }

    /// A host-based service principal such as `HTTP/ca.example.com`.
    pub fn service(service: &str, host: &str) -> Self {
        Self {
            name_type: name_type::SRV_HST,
            components: vec![service.to_string(), host.to_string()],
        }
    }

    /// The ticket-granting service principal for a realm.
    pub fn krbtgt(realm: &str) -> Self {
        Self {
            name_type: name_type::SRV_INST,
            components: vec!["krbtgt".to_string(), realm.to_string()],
        }
    }

    /// DER encoding.
    pub fn encode(&self) -> Vec<u8> {
        let components: Vec<Vec<u8>> = self
            .components
            .iter()
            .map(|c| asn1::general_string(c))
            .collect();
        asn1::sequence(&[
            asn1::explicit(0, asn1::integer(self.name_type as i64)),
            asn1::explicit(1, asn1::sequence(&components)),
        ])
    }

    fn parse(value: Tlv<'_>) -> Result<Self> {
        let fields = Fields::parse(value)?;
        let name_type = fields.require(0, "name-type")?.integer()? as i32;
        let components = fields
            .require(1, "name-string")?
            .expect(asn1::tag::SEQUENCE)?
            .children()?
            .iter()
            .map(|c| c.string())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name_type,
            components,
        })
    }

    /// The default password salt for this principal in `realm`.
    pub fn salt(&self, realm: &str) -> String {
        let mut salt = realm.to_string();
        for component in &self.components {
            salt.push_str(component);
        }
        salt
    }
}

impl fmt::Display for PrincipalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.components.join("/"))
    }
}

/// A PA-DATA element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaData {
    /// padata-type
    pub pa_type: i32,
    /// padata-value
    pub value: Vec<u8>,
}

impl PaData {
    fn encode(&self) -> Vec<u8> {
        asn1::sequence(&[
            asn1::explicit(1, asn1::integer(self.pa_type as i64)),
            asn1::explicit(2, asn1::octet_string(&self.value)),
        ])
    }

    fn parse(value: Tlv<'_>) -> Result<Self> {
        let fields = Fields::parse(value)?;
        Ok(Self {
            pa_type: fields.require(1, "padata-type")?.integer()? as i32,
            value: fields.require(2, "padata-value")?.octets()?.to_vec(),
        })
    }

    /// PA-PAC-REQUEST asking the KDC to include a PAC.
    pub fn pac_request() -> Self {
        Self {
            pa_type: pa_type::PAC_REQUEST,
            value: asn1::sequence(&[asn1::explicit(0, asn1::boolean(true))]),
        }
    }

    /// PA-ENC-TIMESTAMP proving knowledge of the client key.
    pub fn enc_timestamp(key: &EncryptionKey, now: OffsetDateTime) -> Result<Self> {
        let timestamp = asn1::sequence(&[
            asn1::explicit(0, asn1::kerberos_time(now)),
            asn1::explicit(1, asn1::integer(now.microsecond() as i64)),
        ]);
        let cipher = key.encrypt(crypto::key_usage::PA_ENC_TIMESTAMP, &timestamp)?;
        Ok(Self {
            pa_type: pa_type::ENC_TIMESTAMP,
            value: EncryptedData::new(key.etype(), cipher).encode(),
        })
    }
}

fn parse_padata_sequence(value: Tlv<'_>) -> Result<Vec<PaData>> {
    value
        .expect(asn1::tag::SEQUENCE)?
        .children()?
        .into_iter()
        .map(PaData::parse)
        .collect()
}

/// An ETYPE-INFO2 entry describing how to derive the client key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETypeInfo2Entry {
    /// Encryption type.
    pub etype: i32,
    /// Salt, when it differs from the principal's default salt.
    pub salt: Option<String>,
    /// string-to-key parameters.
    pub s2kparams: Option<Vec<u8>>,
}

/// Decode a PA-ETYPE-INFO2 value.
pub fn parse_etype_info2(value: &[u8]) -> Result<Vec<ETypeInfo2Entry>> {
    asn1::read_single(value)?
        .expect(asn1::tag::SEQUENCE)?
        .children()?
        .into_iter()
        .map(|entry| {
            let fields = Fields::parse(entry)?;
            Ok(ETypeInfo2Entry {
                etype: fields.require(0, "etype")?.integer()? as i32,
                salt: fields.get(1)?.map(|s| s.string()).transpose()?,
                s2kparams: fields
                    .get(2)?
                    .map(|p| p.octets().map(<[u8]>::to_vec))
                    .transpose()?,
            })
        })
        .collect()
}

/// Pick the first supported ETYPE-INFO2 entry from a list of PA-DATA.
pub fn preferred_etype_info(padata: &[PaData]) -> Result<Option<ETypeInfo2Entry>> {
    for pa in padata.iter().filter(|pa| pa.pa_type == pa_type::ETYPE_INFO2) {
        let entries = parse_etype_info2(&pa.value)?;
        if let Some(entry) = entries
            .into_iter()
            .find(|e| crypto::key_length(e.etype).is_some())
        {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

/// EncryptedData.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Encryption type.
    pub etype: i32,
    /// Key version number.
    pub kvno: Option<i64>,
    /// Ciphertext.
    pub cipher: Vec<u8>,
}

impl EncryptedData {
    /// EncryptedData without a key version number.
    pub fn new(etype: i32, cipher: Vec<u8>) -> Self {
        Self {
            etype,
            kvno: None,
            cipher,
        }
    }

    /// DER encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = vec![asn1::explicit(0, asn1::integer(self.etype as i64))];
        if let Some(kvno) = self.kvno {
            fields.push(asn1::explicit(1, asn1::integer(kvno)));
        }
        fields.push(asn1::explicit(2, asn1::octet_string(&self.cipher)));
        asn1::sequence(&fields)
    }

    fn parse(value: Tlv<'_>) -> Result<Self> {
        let fields = Fields::parse(value)?;
        Ok(Self {
            etype: fields.require(0, "etype")?.integer()? as i32,
            kvno: fields.get(1)?.map(|k| k.integer()).transpose()?,
            cipher: fields.require(2, "cipher")?.octets()?.to_vec(),
        })
    }
}

/// KDC-REQ-BODY.
#[derive(Debug, Clone)]
pub struct KdcReqBody {
    /// KDC options.
    pub options: u32,
    /// Client name (AS-REQ only).
    pub cname: Option<PrincipalName>,
    /// Realm of the requested service.
    pub realm: String,
    /// Requested service.
    pub sname: PrincipalName,
    /// Requested end time.
    pub till: OffsetDateTime,
    /// Nonce echoed in the encrypted reply.
    pub nonce: u32,
    /// Acceptable encryption types, in preference order.
    pub etypes: Vec<i32>,
}

impl KdcReqBody {
    /// DER encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = vec![asn1::explicit(0, asn1::kerberos_flags(self.options))];
        if let Some(cname) = &self.cname {
            fields.push(asn1::explicit(1, cname.encode()));
        }
        fields.push(asn1::explicit(2, asn1::general_string(&self.realm)));
        fields.push(asn1::explicit(3, self.sname.encode()));
        fields.push(asn1::explicit(5, asn1::kerberos_time(self.till)));
        fields.push(asn1::explicit(7, asn1::integer(self.nonce as i64)));
        let etypes: Vec<Vec<u8>> = self
            .etypes
            .iter()
            .map(|e| asn1::integer(*e as i64))
            .collect();
        fields.push(asn1::explicit(8, asn1::sequence(&etypes)));
        asn1::sequence(&fields)
    }
}

fn kdc_req(msg_type: i64, padata: &[PaData], body: Vec<u8>) -> Vec<u8> {
    let mut fields = vec![
        asn1::explicit(1, asn1::integer(PVNO)),
        asn1::explicit(2, asn1::integer(msg_type)),
    ];
    if !padata.is_empty() {
        let padata: Vec<Vec<u8>> = padata.iter().map(PaData::encode).collect();
        fields.push(asn1::explicit(3, asn1::sequence(&padata)));
    }
    fields.push(asn1::explicit(4, body));
    asn1::application(msg_type as u8, asn1::sequence(&fields))
}

/// Encode an AS-REQ.
pub fn as_req(body: &KdcReqBody, padata: &[PaData]) -> Vec<u8> {
    kdc_req(msg_type::AS_REQ, padata, body.encode())
}

/// Encode a TGS-REQ around an already encoded body, which the
/// authenticator checksum covers.
pub fn tgs_req(body: Vec<u8>, padata: &[PaData]) -> Vec<u8> {
    kdc_req(msg_type::TGS_REQ, padata, body)
}

/// A keyed checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    /// Checksum type.
    pub cksum_type: i32,
    /// Checksum value.
    pub value: Vec<u8>,
}

/// An authenticator, encrypted into an AP-REQ.
#[derive(Debug, Clone)]
pub struct Authenticator {
    /// Client realm.
    pub crealm: String,
    /// Client principal.
    pub cname: PrincipalName,
    /// Optional checksum.
    pub cksum: Option<Checksum>,
    /// Client time.
    pub ctime: OffsetDateTime,
    /// Initial sequence number.
    pub seq_number: Option<u32>,
}

impl Authenticator {
    /// DER encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = vec![
            asn1::explicit(0, asn1::integer(PVNO)),
            asn1::explicit(1, asn1::general_string(&self.crealm)),
            asn1::explicit(2, self.cname.encode()),
        ];
        if let Some(cksum) = &self.cksum {
            fields.push(asn1::explicit(
                3,
                asn1::sequence(&[
                    asn1::explicit(0, asn1::integer(cksum.cksum_type as i64)),
                    asn1::explicit(1, asn1::octet_string(&cksum.value)),
                ]),
            ));
        }
        fields.push(asn1::explicit(4, asn1::integer(self.ctime.microsecond() as i64)));
        fields.push(asn1::explicit(5, asn1::kerberos_time(self.ctime)));
        if let Some(seq) = self.seq_number {
            fields.push(asn1::explicit(7, asn1::integer(seq as i64)));
        }
        asn1::application(2, asn1::sequence(&fields))
    }
}

/// Encode an AP-REQ from a ticket (complete DER) and an encrypted
/// authenticator.
pub fn ap_req(ticket: &[u8], authenticator: &EncryptedData, ap_options: u32) -> Vec<u8> {
    asn1::application(
        msg_type::AP_REQ as u8,
        asn1::sequence(&[
            asn1::explicit(0, asn1::integer(PVNO)),
            asn1::explicit(1, asn1::integer(msg_type::AP_REQ)),
            asn1::explicit(2, asn1::kerberos_flags(ap_options)),
            asn1::explicit(3, ticket.to_vec()),
            asn1::explicit(4, authenticator.encode()),
        ]),
    )
}

/// An AS-REP or TGS-REP.
#[derive(Debug, Clone)]
pub struct KdcReply {
    /// Reply PA-DATA.
    pub padata: Vec<PaData>,
    /// Client realm.
    pub crealm: String,
    /// Client principal (possibly canonicalized).
    pub cname: PrincipalName,
    /// The ticket, as complete DER.
    pub ticket: Vec<u8>,
    /// Encrypted reply part.
    pub enc_part: EncryptedData,
}

/// A KRB-ERROR.
#[derive(Debug, Clone)]
pub struct KrbError {
    /// Error code.
    pub error_code: i32,
    /// Optional error text.
    pub e_text: Option<String>,
    /// Optional error data.
    pub e_data: Option<Vec<u8>>,
}

impl KrbError {
    fn parse(value: Tlv<'_>) -> Result<Self> {
        let fields = Fields::parse(value)?;
        Ok(Self {
            error_code: fields.require(6, "error-code")?.integer()? as i32,
            e_text: fields.get(11)?.map(|t| t.string()).transpose()?,
            e_data: fields
                .get(12)?
                .map(|d| d.octets().map(<[u8]>::to_vec))
                .transpose()?,
        })
    }

    /// The METHOD-DATA carried in `e-data`, if any.
    pub fn method_data(&self) -> Result<Vec<PaData>> {
        match &self.e_data {
            Some(data) => parse_padata_sequence(asn1::read_single(data)?),
            None => Ok(Vec::new()),
        }
    }

    /// Symbolic name of the error code.
    pub fn name(&self) -> &'static str {
        match self.error_code {
            error_code::C_PRINCIPAL_UNKNOWN => "KDC_ERR_C_PRINCIPAL_UNKNOWN",
            error_code::S_PRINCIPAL_UNKNOWN => "KDC_ERR_S_PRINCIPAL_UNKNOWN",
            error_code::ETYPE_NOSUPP => "KDC_ERR_ETYPE_NOSUPP",
            error_code::CLIENT_REVOKED => "KDC_ERR_CLIENT_REVOKED",
            error_code::KEY_EXPIRED => "KDC_ERR_KEY_EXPIRED",
            error_code::PREAUTH_FAILED => "KDC_ERR_PREAUTH_FAILED",
            error_code::PREAUTH_REQUIRED => "KDC_ERR_PREAUTH_REQUIRED",
            error_code::SKEW => "KRB_AP_ERR_SKEW",
            error_code::WRONG_REALM => "KDC_ERR_WRONG_REALM",
            _ => "KRB_ERROR",
        }
    }
}

impl fmt::Display for KrbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.error_code)?;
        if let Some(text) = &self.e_text {
            write!(f, ": {}", text)?;
        }
        Ok(())
    }
}

/// A KDC response: either the expected reply or an error.
#[derive(Debug, Clone)]
pub enum KdcResponse {
    /// AS-REP or TGS-REP.
    Reply(KdcReply),
    /// KRB-ERROR.
    Error(KrbError),
}

/// Decode a KDC response expected to be of `expected` message type
/// (AS-REP or TGS-REP), or a KRB-ERROR.
pub fn parse_kdc_response(data: &[u8], expected: i64) -> Result<KdcResponse> {
    let outer = asn1::read_single(data)?;
    if outer.tag == 0x60 | msg_type::KRB_ERROR as u8 {
        let body = outer.application(msg_type::KRB_ERROR as u8)?;
        return Ok(KdcResponse::Error(KrbError::parse(body)?));
    }

    let fields = Fields::parse(outer.application(expected as u8)?)?;
    let msg = fields.require(1, "msg-type")?.integer()?;
    if msg != expected {
        return Err(CertsrvError::kerberos(format!(
            "unexpected message type {} (expected {})",
            msg, expected
        )));
    }

    Ok(KdcResponse::Reply(KdcReply {
        padata: fields
            .get(2)?
            .map(parse_padata_sequence)
            .transpose()?
            .unwrap_or_default(),
        crealm: fields.require(3, "crealm")?.string()?,
        cname: PrincipalName::parse(fields.require(4, "cname")?)?,
        ticket: fields.require(5, "ticket")?.raw.to_vec(),
        enc_part: EncryptedData::parse(fields.require(6, "enc-part")?)?,
    }))
}

/// The decrypted part of a KDC reply.
#[derive(Debug, Clone)]
pub struct EncKdcRepPart {
    /// Session key for the issued ticket.
    pub key: EncryptionKey,
    /// Nonce from the request.
    pub nonce: i64,
    /// Ticket expiry.
    pub end_time: OffsetDateTime,
    /// Realm of the ticket's service.
    pub srealm: String,
    /// The ticket's service.
    pub sname: PrincipalName,
}

/// Decode EncASRepPart or EncTGSRepPart.
///
/// Some KDCs wrap an AS reply part in the TGS application tag, so both
/// tags are accepted for either reply.
pub fn parse_enc_kdc_rep_part(data: &[u8]) -> Result<EncKdcRepPart> {
    let outer = asn1::read_single(data)?;
    let sequence = match outer.tag {
        0x79 => outer.application(25)?,
        0x7a => outer.application(26)?,
        other => {
            return Err(CertsrvError::kerberos(format!(
                "unexpected encrypted reply tag 0x{:02x}",
                other
            )))
        }
    };
    let fields = Fields::parse(sequence)?;

    let key_fields = Fields::parse(fields.require(0, "key")?)?;
    let key = EncryptionKey::new(
        key_fields.require(0, "keytype")?.integer()? as i32,
        key_fields.require(1, "keyvalue")?.octets()?.to_vec(),
    )?;

    Ok(EncKdcRepPart {
        key,
        nonce: fields.require(2, "nonce")?.integer()?,
        end_time: fields.require(7, "endtime")?.kerberos_time()?,
        srealm: fields.require(9, "srealm")?.string()?,
        sname: PrincipalName::parse(fields.require(10, "sname")?)?,
    })
}
