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

//! NTLMv2 message codec.
//!
//! Produces the NEGOTIATE and AUTHENTICATE messages and parses the server's
//! CHALLENGE message, as carried in `Authorization: NTLM ...` and
//! `WWW-Authenticate: NTLM ...` headers. Only the NTLMv2 response with
//! extended session security is generated; no session key is exchanged, since
//! HTTP authentication needs neither signing nor sealing.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
use rand::RngCore;

use crate::config::NtlmAuth;
use crate::error::{CertsrvError, Result};

type HmacMd5 = Hmac<Md5>;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_MESSAGE: u32 = 1;
const CHALLENGE_MESSAGE: u32 = 2;
const AUTHENTICATE_MESSAGE: u32 = 3;

const AUTHENTICATE_HEADER_LEN: usize = 64;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: u64 = 11_644_473_600;

/// Negotiate flags.
pub mod flags {
    /// Unicode strings.
    pub const UNICODE: u32 = 0x0000_0001;
    /// OEM strings.
    pub const OEM: u32 = 0x0000_0002;
    /// Ask the server for its target name.
    pub const REQUEST_TARGET: u32 = 0x0000_0004;
    /// NTLM session security.
    pub const NTLM: u32 = 0x0000_0200;
    /// Always sign.
    pub const ALWAYS_SIGN: u32 = 0x0000_8000;
    /// Extended session security (NTLM2).
    pub const EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
    /// Target info present in the challenge.
    pub const TARGET_INFO: u32 = 0x0080_0000;
    /// 128-bit session keys.
    pub const NEGOTIATE_128: u32 = 0x2000_0000;
    /// 56-bit session keys.
    pub const NEGOTIATE_56: u32 = 0x8000_0000;
}

const CLIENT_FLAGS: u32 = flags::UNICODE
    | flags::OEM
    | flags::REQUEST_TARGET
    | flags::NTLM
    | flags::ALWAYS_SIGN
    | flags::EXTENDED_SESSIONSECURITY
    | flags::NEGOTIATE_128
    | flags::NEGOTIATE_56;

/// AV pair identifiers in the challenge target info.
mod av_id {
    pub const EOL: u16 = 0;
    pub const TIMESTAMP: u16 = 7;
}

/// Build the NEGOTIATE message (type 1).
pub fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&NEGOTIATE_MESSAGE.to_le_bytes());
    msg.extend_from_slice(&CLIENT_FLAGS.to_le_bytes());
    // Empty domain and workstation fields.
    msg.extend_from_slice(&[0u8; 16]);
    msg
}

/// A parsed CHALLENGE message (type 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    /// Flags the server agreed to.
    pub flags: u32,
    /// Server challenge nonce.
    pub server_challenge: [u8; 8],
    /// Raw AV pairs describing the target.
    pub target_info: Vec<u8>,
}

impl ChallengeMessage {
    /// Parse a CHALLENGE message.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 32 {
            return Err(CertsrvError::ntlm("challenge message is truncated"));
        }
        if &data[..8] != SIGNATURE {
            return Err(CertsrvError::ntlm("challenge message has a bad signature"));
        }
        if read_u32(data, 8) != CHALLENGE_MESSAGE {
            return Err(CertsrvError::ntlm("expected an NTLM challenge message"));
        }

        let flags = read_u32(data, 20);
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&data[24..32]);

        let target_info = if data.len() >= 48 {
            let len = read_u16(data, 40) as usize;
            let offset = read_u32(data, 44) as usize;
            data.get(offset..offset + len)
                .ok_or_else(|| CertsrvError::ntlm("challenge target info out of bounds"))?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            flags,
            server_challenge,
            target_info,
        })
    }

    /// The server's MsvAvTimestamp, as a FILETIME, if present.
    pub fn timestamp(&self) -> Option<u64> {
        let mut rest = self.target_info.as_slice();
        while rest.len() >= 4 {
            let id = u16::from_le_bytes([rest[0], rest[1]]);
            let len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
            let value = rest.get(4..4 + len)?;
            match id {
                av_id::EOL => return None,
                av_id::TIMESTAMP if len == 8 => {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(value);
                    return Some(u64::from_le_bytes(bytes));
                }
                _ => rest = &rest[4 + len..],
            }
        }
        None
    }
}

/// Build the AUTHENTICATE message (type 3) answering `challenge`.
pub fn authenticate_message(auth: &NtlmAuth, challenge: &ChallengeMessage) -> Vec<u8> {
    let mut client_challenge = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut client_challenge);
    let timestamp = challenge.timestamp().unwrap_or_else(filetime_now);
    build_authenticate(auth, challenge, client_challenge, timestamp)
}

fn build_authenticate(
    auth: &NtlmAuth,
    challenge: &ChallengeMessage,
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Vec<u8> {
    let domain = auth.domain.as_deref().unwrap_or("");
    let workstation = auth.workstation.as_deref().unwrap_or("");
    let key = ntowf_v2(&auth.password, &auth.username, domain);

    let temp = ntlmv2_client_blob(client_challenge, timestamp, &challenge.target_info);
    let nt_proof = hmac_md5(&key, &[&challenge.server_challenge, &temp]);

    let mut nt_response = nt_proof.to_vec();
    nt_response.extend_from_slice(&temp);

    // With a server timestamp the LMv2 response must be zeroed.
    let lm_response = if challenge.timestamp().is_some() {
        vec![0u8; 24]
    } else {
        lmv2_response(&key, &challenge.server_challenge, &client_challenge)
    };

    let domain = utf16le(domain);
    let user = utf16le(&auth.username);
    let workstation = utf16le(workstation);
    let negotiated = (challenge.flags & CLIENT_FLAGS) | flags::UNICODE;

    let mut msg = Vec::with_capacity(
        AUTHENTICATE_HEADER_LEN
            + lm_response.len()
            + nt_response.len()
            + domain.len()
            + user.len()
            + workstation.len(),
    );
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&AUTHENTICATE_MESSAGE.to_le_bytes());

    let mut payload = Vec::new();
    for field in [
        &lm_response,
        &nt_response,
        &domain,
        &user,
        &workstation,
        &Vec::new(),
    ] {
        let offset = AUTHENTICATE_HEADER_LEN + payload.len();
        write_field(&mut msg, field.len(), offset);
        payload.extend_from_slice(field);
    }
    msg.extend_from_slice(&negotiated.to_le_bytes());
    msg.extend_from_slice(&payload);
    msg
}

/// NTOWFv2: HMAC-MD5 keyed with the NT hash over the upper-cased user
/// name and the domain.
fn ntowf_v2(password: &str, user: &str, domain: &str) -> [u8; 16] {
    let nt_hash = Md4::digest(utf16le(password));
    let identity = utf16le(&format!("{}{}", user.to_uppercase(), domain));
    hmac_md5(&nt_hash, &[&identity])
}

fn lmv2_response(key: &[u8], server_challenge: &[u8; 8], client_challenge: &[u8; 8]) -> Vec<u8> {
    let mut response = hmac_md5(key, &[server_challenge, client_challenge]).to_vec();
    response.extend_from_slice(client_challenge);
    response
}

fn ntlmv2_client_blob(client_challenge: [u8; 8], timestamp: u64, target_info: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(32 + target_info.len());
    blob.extend_from_slice(&[0x01, 0x01]);
    blob.extend_from_slice(&[0u8; 6]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0u8; 4]);
    blob
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> [u8; 16] {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key).expect("HMAC takes any key length");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn filetime_now() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since_epoch.as_secs() + FILETIME_EPOCH_OFFSET) * 10_000_000
        + u64::from(since_epoch.subsec_nanos() / 100)
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn write_field(msg: &mut Vec<u8>, len: usize, offset: usize) {
    msg.extend_from_slice(&(len as u16).to_le_bytes());
    msg.extend_from_slice(&(len as u16).to_le_bytes());
    msg.extend_from_slice(&(offset as u32).to_le_bytes());
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
