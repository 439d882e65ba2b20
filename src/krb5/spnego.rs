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

//! GSS-API and SPNEGO framing for HTTP Negotiate (RFC 4121, RFC 4178).

use super::asn1;

/// 1.2.840.113554.1.2.2 (Kerberos V5).
pub const KRB5_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x12, 0x01, 0x02, 0x02];

/// 1.3.6.1.5.5.2 (SPNEGO).
pub const SPNEGO_OID: &[u8] = &[0x2b, 0x06, 0x01, 0x05, 0x05, 0x02];

/// Checksum type of the GSS authenticator checksum.
pub const GSS_CHECKSUM_TYPE: i32 = 0x8003;

const TOK_ID_AP_REQ: [u8; 2] = [0x01, 0x00];

/// GSS context flags.
pub mod gss_flags {
    /// Mutual authentication.
    pub const MUTUAL: u32 = 0x02;
    /// Replay detection.
    pub const REPLAY: u32 = 0x04;
    /// Sequencing.
    pub const SEQUENCE: u32 = 0x08;
    /// Confidentiality.
    pub const CONF: u32 = 0x10;
    /// Integrity.
    pub const INTEG: u32 = 0x20;
}

/// The authenticator checksum: an empty channel binding and the context
/// flags.
pub fn gss_checksum(flags: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&flags.to_le_bytes());
    out
}

/// Wrap an AP-REQ in a GSS InitialContextToken.
pub fn initial_context_token(ap_req: &[u8]) -> Vec<u8> {
    let mut inner = asn1::oid(KRB5_OID);
    inner.extend_from_slice(&TOK_ID_AP_REQ);
    inner.extend_from_slice(ap_req);
    asn1::application(0, inner)
}

/// Wrap a Kerberos mechanism token in a SPNEGO NegTokenInit.
pub fn neg_token_init(mech_token: &[u8]) -> Vec<u8> {
    let neg_token_init = asn1::sequence(&[
        asn1::explicit(0, asn1::sequence(&[asn1::oid(KRB5_OID)])),
        asn1::explicit(2, asn1::octet_string(mech_token)),
    ]);
    let mut inner = asn1::oid(SPNEGO_OID);
    inner.extend(asn1::explicit(0, neg_token_init));
    asn1::application(0, inner)
}
