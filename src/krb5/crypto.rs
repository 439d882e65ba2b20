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

//! AES-CTS-HMAC-SHA1-96 encryption types (RFC 3962).
//!
//! This is the only encryption profile requested from the KDC. RC4 and DES
//! are deliberately absent; an Active Directory domain that only offers
//! those fails at login with an unsupported encryption type error.

use std::fmt;

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;

use crate::error::{CertsrvError, Result};

type HmacSha1 = Hmac<Sha1>;

const BLOCK_SIZE: usize = 16;
const CONFOUNDER_SIZE: usize = 16;
const MAC_SIZE: usize = 12;
const DEFAULT_ITERATIONS: u32 = 4096;

/// Encryption type numbers.
pub mod etype {
    /// aes128-cts-hmac-sha1-96
    pub const AES128_CTS_HMAC_SHA1_96: i32 = 17;
    /// aes256-cts-hmac-sha1-96
    pub const AES256_CTS_HMAC_SHA1_96: i32 = 18;

    /// Encryption types offered to the KDC, strongest first.
    pub const SUPPORTED: [i32; 2] = [AES256_CTS_HMAC_SHA1_96, AES128_CTS_HMAC_SHA1_96];
}

/// Checksum type numbers.
pub mod checksum_type {
    /// hmac-sha1-96-aes128
    pub const HMAC_SHA1_96_AES128: i32 = 15;
    /// hmac-sha1-96-aes256
    pub const HMAC_SHA1_96_AES256: i32 = 16;
}

/// Key usage numbers (RFC 4120 section 7.5.1).
pub mod key_usage {
    /// PA-ENC-TIMESTAMP padata.
    pub const PA_ENC_TIMESTAMP: i32 = 1;
    /// AS-REP encrypted part.
    pub const AS_REP_ENC_PART: i32 = 3;
    /// Checksum over the TGS-REQ body in the authenticator.
    pub const TGS_REQ_AUTH_CKSUM: i32 = 6;
    /// Authenticator in the TGS-REQ padata.
    pub const TGS_REQ_AUTHENTICATOR: i32 = 7;
    /// TGS-REP encrypted part, session key.
    pub const TGS_REP_ENC_PART: i32 = 8;
    /// Authenticator in an application AP-REQ.
    pub const AP_REQ_AUTHENTICATOR: i32 = 11;
}

/// Key length in bytes for a supported encryption type.
pub fn key_length(etype: i32) -> Option<usize> {
    match etype {
        etype::AES128_CTS_HMAC_SHA1_96 => Some(16),
        etype::AES256_CTS_HMAC_SHA1_96 => Some(32),
        _ => None,
    }
}

/// A Kerberos key for one of the supported encryption types.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    etype: i32,
    value: Vec<u8>,
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("etype", &self.etype)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl EncryptionKey {
    /// Wrap raw key material.
    pub fn new(etype: i32, value: Vec<u8>) -> Result<Self> {
        let expected = key_length(etype).ok_or_else(|| {
            CertsrvError::kerberos(format!("unsupported encryption type {}", etype))
        })?;
        if value.len() != expected {
            return Err(CertsrvError::kerberos(format!(
                "key for encryption type {} must be {} bytes, got {}",
                etype,
                expected,
                value.len()
            )));
        }
        Ok(Self { etype, value })
    }

    /// Derive the long-term key from a password (string-to-key).
    ///
    /// `s2kparams` carries the PBKDF2 iteration count as a 4-byte big-endian
    /// integer; 4096 is used when absent.
    pub fn from_password(
        etype: i32,
        password: &str,
        salt: &[u8],
        s2kparams: Option<&[u8]>,
    ) -> Result<Self> {
        let len = key_length(etype).ok_or_else(|| {
            CertsrvError::kerberos(format!("unsupported encryption type {}", etype))
        })?;
        let iterations = match s2kparams {
            None => DEFAULT_ITERATIONS,
            Some(params) => {
                let bytes: [u8; 4] = params.try_into().map_err(|_| {
                    CertsrvError::kerberos("s2kparams must be four bytes")
                })?;
                u32::from_be_bytes(bytes)
            }
        };
        if iterations == 0 {
            return Err(CertsrvError::kerberos("s2kparams iteration count is zero"));
        }

        let mut tkey = vec![0u8; len];
        pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut tkey);
        let value = derive_key(&tkey, b"kerberos")?;
        Self::new(etype, value)
    }

    /// The encryption type number.
    pub fn etype(&self) -> i32 {
        self.etype
    }

    /// The raw key material.
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    /// The keyed checksum type paired with this key's encryption type.
    pub fn checksum_type(&self) -> i32 {
        match self.etype {
            etype::AES128_CTS_HMAC_SHA1_96 => checksum_type::HMAC_SHA1_96_AES128,
            _ => checksum_type::HMAC_SHA1_96_AES256,
        }
    }

    /// Encrypt `plaintext` for the given key usage.
    pub fn encrypt(&self, usage: i32, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut confounder = [0u8; CONFOUNDER_SIZE];
        rand::thread_rng().fill_bytes(&mut confounder);
        self.encrypt_with_confounder(usage, plaintext, &confounder)
    }

    fn encrypt_with_confounder(
        &self,
        usage: i32,
        plaintext: &[u8],
        confounder: &[u8; CONFOUNDER_SIZE],
    ) -> Result<Vec<u8>> {
        let ke = derive_key(&self.value, &usage_constant(usage, 0xaa))?;
        let ki = derive_key(&self.value, &usage_constant(usage, 0x55))?;

        let mut data = Vec::with_capacity(CONFOUNDER_SIZE + plaintext.len());
        data.extend_from_slice(confounder);
        data.extend_from_slice(plaintext);

        let mut out = cts_encrypt(&ke, &data)?;
        out.extend_from_slice(&hmac_sha1(&ki, &data)[..MAC_SIZE]);
        Ok(out)
    }

    /// Decrypt and verify `ciphertext` for the given key usage.
    pub fn decrypt(&self, usage: i32, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < CONFOUNDER_SIZE + MAC_SIZE {
            return Err(CertsrvError::kerberos("ciphertext is too short"));
        }
        let ke = derive_key(&self.value, &usage_constant(usage, 0xaa))?;
        let ki = derive_key(&self.value, &usage_constant(usage, 0x55))?;

        let (body, mac) = ciphertext.split_at(ciphertext.len() - MAC_SIZE);
        let data = cts_decrypt(&ke, body)?;
        let expected = hmac_sha1(&ki, &data);

        let diff = expected[..MAC_SIZE]
            .iter()
            .zip(mac)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            return Err(CertsrvError::kerberos(
                "integrity check failed (wrong password or key)",
            ));
        }
        Ok(data[CONFOUNDER_SIZE..].to_vec())
    }

    /// Keyed checksum over `data` for the given key usage.
    pub fn checksum(&self, usage: i32, data: &[u8]) -> Result<Vec<u8>> {
        let kc = derive_key(&self.value, &usage_constant(usage, 0x99))?;
        Ok(hmac_sha1(&kc, data)[..MAC_SIZE].to_vec())
    }
}

fn usage_constant(usage: i32, suffix: u8) -> [u8; 5] {
    let b = usage.to_be_bytes();
    [b[0], b[1], b[2], b[3], suffix]
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; 20] {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key).expect("HMAC takes any key length");
    mac.update(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Fold `input` to `out_len` bytes (RFC 3961 section 5.1).
pub fn n_fold(input: &[u8], out_len: usize) -> Vec<u8> {
    let in_len = input.len();
    let lcm = lcm(in_len, out_len);
    let copies = lcm / in_len;
    let in_bits = in_len * 8;

    let mut buf = Vec::with_capacity(lcm);
    for i in 0..copies {
        let rotation = 13 * i % in_bits;
        buf.extend(rotate_right(input, rotation));
    }

    let mut out = vec![0u8; out_len];
    for chunk in buf.chunks(out_len) {
        add_ones_complement(&mut out, chunk);
    }
    out
}

fn rotate_right(input: &[u8], bits: usize) -> Vec<u8> {
    let len = input.len();
    let total = len * 8;
    let mut out = vec![0u8; len];
    for i in 0..total {
        let source = (i + total - bits % total) % total;
        if input[source / 8] & (0x80 >> (source % 8)) != 0 {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

fn add_ones_complement(acc: &mut [u8], value: &[u8]) {
    let mut carry = 0u16;
    for i in (0..acc.len()).rev() {
        let sum = acc[i] as u16 + value[i] as u16 + carry;
        acc[i] = sum as u8;
        carry = sum >> 8;
    }
    while carry != 0 {
        for i in (0..acc.len()).rev() {
            let sum = acc[i] as u16 + carry;
            acc[i] = sum as u8;
            carry = sum >> 8;
            if carry == 0 {
                break;
            }
        }
    }
}

fn lcm(a: usize, b: usize) -> usize {
    let (mut x, mut y) = (a, b);
    while y != 0 {
        (x, y) = (y, x % y);
    }
    a / x * b
}

/// DK(base, constant): the derived key is the derived random bytes, as
/// random-to-key is the identity for AES.
fn derive_key(base: &[u8], constant: &[u8]) -> Result<Vec<u8>> {
    let cipher = BlockCipher::new(base)?;
    let mut block = [0u8; BLOCK_SIZE];
    block.copy_from_slice(&n_fold(constant, BLOCK_SIZE));

    let mut out = Vec::with_capacity(base.len() + BLOCK_SIZE);
    while out.len() < base.len() {
        cipher.encrypt_block(&mut block);
        out.extend_from_slice(&block);
    }
    out.truncate(base.len());
    Ok(out)
}

enum BlockCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl BlockCipher {
    fn new(key: &[u8]) -> Result<Self> {
        let invalid = |_| CertsrvError::kerberos("invalid AES key length");
        match key.len() {
            16 => Ok(Self::Aes128(Aes128::new_from_slice(key).map_err(invalid)?)),
            32 => Ok(Self::Aes256(Aes256::new_from_slice(key).map_err(invalid)?)),
            n => Err(CertsrvError::kerberos(format!(
                "invalid AES key length {}",
                n
            ))),
        }
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let block = aes::Block::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let block = aes::Block::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

fn xor_into(target: &mut [u8; BLOCK_SIZE], other: &[u8]) {
    for (t, o) in target.iter_mut().zip(other) {
        *t ^= o;
    }
}

fn block_at(data: &[u8], index: usize) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block.copy_from_slice(&data[index * BLOCK_SIZE..(index + 1) * BLOCK_SIZE]);
    block
}

/// AES in CBC mode with ciphertext stealing and a zero IV; the last two
/// blocks are swapped even when the input is block aligned.
pub fn cts_encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = BlockCipher::new(key)?;
    let len = plaintext.len();
    if len < BLOCK_SIZE {
        return Err(CertsrvError::kerberos("CTS input shorter than one block"));
    }
    if len == BLOCK_SIZE {
        let mut block = block_at(plaintext, 0);
        cipher.encrypt_block(&mut block);
        return Ok(block.to_vec());
    }

    let blocks = len.div_ceil(BLOCK_SIZE);
    let last_len = len - BLOCK_SIZE * (blocks - 1);
    let mut padded = plaintext.to_vec();
    padded.resize(blocks * BLOCK_SIZE, 0);

    let mut encrypted = Vec::with_capacity(blocks);
    let mut prev = [0u8; BLOCK_SIZE];
    for i in 0..blocks {
        let mut block = block_at(&padded, i);
        xor_into(&mut block, &prev);
        cipher.encrypt_block(&mut block);
        encrypted.push(block);
        prev = block;
    }

    let mut out = Vec::with_capacity(len);
    for block in &encrypted[..blocks - 2] {
        out.extend_from_slice(block);
    }
    out.extend_from_slice(&encrypted[blocks - 1]);
    out.extend_from_slice(&encrypted[blocks - 2][..last_len]);
    Ok(out)
}

/// Inverse of [`cts_encrypt`].
pub fn cts_decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = BlockCipher::new(key)?;
    let len = ciphertext.len();
    if len < BLOCK_SIZE {
        return Err(CertsrvError::kerberos("CTS input shorter than one block"));
    }
    if len == BLOCK_SIZE {
        let mut block = block_at(ciphertext, 0);
        cipher.decrypt_block(&mut block);
        return Ok(block.to_vec());
    }

    let blocks = len.div_ceil(BLOCK_SIZE);
    let last_len = len - BLOCK_SIZE * (blocks - 1);
    let mut out = Vec::with_capacity(len);

    let mut prev = [0u8; BLOCK_SIZE];
    for i in 0..blocks - 2 {
        let cipher_block = block_at(ciphertext, i);
        let mut block = cipher_block;
        cipher.decrypt_block(&mut block);
        xor_into(&mut block, &prev);
        out.extend_from_slice(&block);
        prev = cipher_block;
    }

    // The full block at position n-2 is the final CBC block; the partial
    // tail is a prefix of the block before it.
    let mut tail = block_at(ciphertext, blocks - 2);
    cipher.decrypt_block(&mut tail);

    let partial = &ciphertext[BLOCK_SIZE * (blocks - 1)..];
    let mut stolen = tail;
    stolen[..last_len].copy_from_slice(partial);

    let last: Vec<u8> = (0..last_len).map(|i| tail[i] ^ partial[i]).collect();

    cipher.decrypt_block(&mut stolen);
    xor_into(&mut stolen, &prev);
    out.extend_from_slice(&stolen);
    out.extend_from_slice(&last);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_fold_vectors() {
        assert_eq!(hex::encode(n_fold(b"012345", 8)), "be072631276b1955");
        assert_eq!(
            hex::encode(n_fold(b"kerberos", 16)),
            "6b65726265726f737b9b5b2b93132b93"
        );
        assert_eq!(hex::encode(n_fold(b"password", 7)), "78a07b6caf85fa");
    }

    #[test]
    fn test_cts_vectors() {
        let key = b"chicken teriyaki";
        let input = b"I would like the General Gau's Chicken, please, and wonton soup.";

        let out = cts_encrypt(key, &input[..17]).unwrap();
        assert_eq!(hex::encode(&out), "c6353568f2bf8cb4d8a580362da7ff7f97");

        let out = cts_encrypt(key, &input[..32]).unwrap();
        assert_eq!(
            hex::encode(&out),
            "39312523a78662d5be7fcbcc98ebf5a897687268d6ecccc0c07b25e25ecfe584"
        );
    }

    #[test]
    fn test_cts_decrypt_inverts_encrypt() {
        let key = [7u8; 32];
        for len in [16usize, 17, 31, 32, 33, 47, 64, 100] {
            let input: Vec<u8> = (0..len as u8).collect();
            let encrypted = cts_encrypt(&key, &input).unwrap();
            assert_eq!(encrypted.len(), len);
            assert_eq!(cts_decrypt(&key, &encrypted).unwrap(), input);
        }
    }

    #[test]
    fn test_string_to_key_aes128() {
        // RFC 3962 appendix B, iteration count 1.
        let key = EncryptionKey::from_password(
            etype::AES128_CTS_HMAC_SHA1_96,
            "password",
            b"ATHENA.MIT.EDUraeburn",
            Some(&[0, 0, 0, 1]),
        )
        .unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "42263c6e89f4fc28b8df68ee09799f15"
        );
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::new(etype::AES256_CTS_HMAC_SHA1_96, vec![3u8; 32]).unwrap();
        let encrypted = key.encrypt(key_usage::AS_REP_ENC_PART, b"short").unwrap();
        assert_eq!(encrypted.len(), CONFOUNDER_SIZE + 5 + MAC_SIZE);

        let decrypted = key.decrypt(key_usage::AS_REP_ENC_PART, &encrypted).unwrap();
        assert_eq!(decrypted, b"short");

        assert!(key.decrypt(key_usage::TGS_REP_ENC_PART, &encrypted).is_err());
    }

    #[test]
    fn test_decrypt_detects_tampering() {
        let key = EncryptionKey::new(etype::AES128_CTS_HMAC_SHA1_96, vec![9u8; 16]).unwrap();
        let mut encrypted = key
            .encrypt(key_usage::PA_ENC_TIMESTAMP, b"20240101000000Z")
            .unwrap();
        encrypted[3] ^= 0x01;
        assert!(key.decrypt(key_usage::PA_ENC_TIMESTAMP, &encrypted).is_err());
    }

    #[test]
    fn test_checksum_length_and_type() {
        let key = EncryptionKey::new(etype::AES128_CTS_HMAC_SHA1_96, vec![1u8; 16]).unwrap();
        assert_eq!(key.checksum(key_usage::TGS_REQ_AUTH_CKSUM, b"body").unwrap().len(), 12);
        assert_eq!(key.checksum_type(), checksum_type::HMAC_SHA1_96_AES128);
    }

    #[test]
    fn test_rejects_unsupported_etype() {
        assert!(EncryptionKey::new(23, vec![0u8; 16]).is_err());
        assert!(EncryptionKey::new(etype::AES128_CTS_HMAC_SHA1_96, vec![0u8; 32]).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = EncryptionKey::new(etype::AES128_CTS_HMAC_SHA1_96, vec![0xab; 16]).unwrap();
        assert!(!format!("{:?}", key).contains("171"));
    }
}
