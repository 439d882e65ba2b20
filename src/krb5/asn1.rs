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

//! Minimal DER encoding and decoding for Kerberos messages.
//!
//! Kerberos messages are APPLICATION-tagged SEQUENCEs whose fields carry
//! explicit context tags. Only the single-byte tags and universal types that
//! RFC 4120 uses are supported.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::error::{CertsrvError, Result};

/// Universal tags.
pub mod tag {
    /// BOOLEAN.
    pub const BOOLEAN: u8 = 0x01;
    /// INTEGER.
    pub const INTEGER: u8 = 0x02;
    /// BIT STRING.
    pub const BIT_STRING: u8 = 0x03;
    /// OCTET STRING.
    pub const OCTET_STRING: u8 = 0x04;
    /// OBJECT IDENTIFIER.
    pub const OID: u8 = 0x06;
    /// GeneralizedTime.
    pub const GENERALIZED_TIME: u8 = 0x18;
    /// GeneralString.
    pub const GENERAL_STRING: u8 = 0x1b;
    /// SEQUENCE (constructed).
    pub const SEQUENCE: u8 = 0x30;
}

/// Encode a TLV.
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 6);
    out.push(tag);
    encode_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u32).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (4 - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// Encode a SEQUENCE from already-encoded elements.
pub fn sequence(elements: &[Vec<u8>]) -> Vec<u8> {
    tlv(tag::SEQUENCE, &elements.concat())
}

/// Wrap an encoded value in an explicit context tag `[n]`.
pub fn explicit(n: u8, inner: Vec<u8>) -> Vec<u8> {
    tlv(0xa0 | n, &inner)
}

/// Wrap an encoded value in a constructed APPLICATION tag.
pub fn application(n: u8, inner: Vec<u8>) -> Vec<u8> {
    tlv(0x60 | n, &inner)
}

/// Encode an INTEGER.
pub fn integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    tlv(tag::INTEGER, &bytes[start..])
}

/// Encode a BOOLEAN.
pub fn boolean(value: bool) -> Vec<u8> {
    tlv(tag::BOOLEAN, &[if value { 0xff } else { 0x00 }])
}

/// Encode a GeneralString.
pub fn general_string(value: &str) -> Vec<u8> {
    tlv(tag::GENERAL_STRING, value.as_bytes())
}

/// Encode an OCTET STRING.
pub fn octet_string(value: &[u8]) -> Vec<u8> {
    tlv(tag::OCTET_STRING, value)
}

/// Encode an OBJECT IDENTIFIER from its encoded arcs.
pub fn oid(encoded: &[u8]) -> Vec<u8> {
    tlv(tag::OID, encoded)
}

/// Encode 32 Kerberos flag bits (bit 0 is the most significant).
pub fn kerberos_flags(bits: u32) -> Vec<u8> {
    let mut content = vec![0u8];
    content.extend_from_slice(&bits.to_be_bytes());
    tlv(tag::BIT_STRING, &content)
}

/// Encode a KerberosTime (GeneralizedTime without fractional seconds).
pub fn kerberos_time(time: OffsetDateTime) -> Vec<u8> {
    let time = time.to_offset(time::UtcOffset::UTC);
    let text = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}Z",
        time.year(),
        u8::from(time.month()),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    );
    tlv(tag::GENERALIZED_TIME, text.as_bytes())
}

fn malformed(what: &str) -> CertsrvError {
    CertsrvError::kerberos(format!("malformed DER: {}", what))
}

/// A decoded TLV borrowing from its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Identifier octet.
    pub tag: u8,
    /// Content octets.
    pub content: &'a [u8],
    /// The complete encoding, including tag and length.
    pub raw: &'a [u8],
}

/// Decode one TLV, returning it and the remaining input.
pub fn read_tlv(data: &[u8]) -> Result<(Tlv<'_>, &[u8])> {
    let (&tag, rest) = data.split_first().ok_or_else(|| malformed("empty input"))?;
    if tag & 0x1f == 0x1f {
        return Err(malformed("high tag numbers are not supported"));
    }
    let (&first, rest) = rest.split_first().ok_or_else(|| malformed("missing length"))?;

    let (len, rest) = if first & 0x80 == 0 {
        (first as usize, rest)
    } else {
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 || rest.len() < count {
            return Err(malformed("invalid length"));
        }
        let len = rest[..count]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, &rest[count..])
    };

    if rest.len() < len {
        return Err(malformed("truncated value"));
    }
    let header_len = data.len() - rest.len();
    Ok((
        Tlv {
            tag,
            content: &rest[..len],
            raw: &data[..header_len + len],
        },
        &rest[len..],
    ))
}

/// Decode a complete input holding exactly one TLV.
pub fn read_single(data: &[u8]) -> Result<Tlv<'_>> {
    let (value, rest) = read_tlv(data)?;
    if !rest.is_empty() {
        return Err(malformed("trailing data"));
    }
    Ok(value)
}

impl<'a> Tlv<'a> {
    /// Fail unless the tag matches.
    pub fn expect(self, tag: u8) -> Result<Self> {
        if self.tag != tag {
            return Err(malformed(&format!(
                "expected tag 0x{:02x}, found 0x{:02x}",
                tag, self.tag
            )));
        }
        Ok(self)
    }

    /// Decode the content as a series of TLVs.
    pub fn children(&self) -> Result<Vec<Tlv<'a>>> {
        let mut children = Vec::new();
        let mut rest = self.content;
        while !rest.is_empty() {
            let (child, next) = read_tlv(rest)?;
            children.push(child);
            rest = next;
        }
        Ok(children)
    }

    /// Unwrap a constructed APPLICATION tag and return the SEQUENCE inside.
    pub fn application(self, n: u8) -> Result<Tlv<'a>> {
        self.expect(0x60 | n)?;
        read_single(self.content)?.expect(tag::SEQUENCE)
    }

    /// Decode an INTEGER.
    pub fn integer(&self) -> Result<i64> {
        self.expect(tag::INTEGER)?;
        if self.content.is_empty() || self.content.len() > 8 {
            return Err(malformed("integer length"));
        }
        let mut value: i64 = if self.content[0] & 0x80 != 0 { -1 } else { 0 };
        for b in self.content {
            value = (value << 8) | *b as i64;
        }
        Ok(value)
    }

    /// Decode a GeneralString (or any other string type) as UTF-8.
    pub fn string(&self) -> Result<String> {
        String::from_utf8(self.content.to_vec()).map_err(|_| malformed("string is not UTF-8"))
    }

    /// Decode an OCTET STRING.
    pub fn octets(&self) -> Result<&'a [u8]> {
        self.expect(tag::OCTET_STRING)?;
        Ok(self.content)
    }

    /// Decode a KerberosTime.
    pub fn kerberos_time(&self) -> Result<OffsetDateTime> {
        self.expect(tag::GENERALIZED_TIME)?;
        parse_kerberos_time(self.content).ok_or_else(|| malformed("invalid KerberosTime"))
    }
}

fn parse_kerberos_time(text: &[u8]) -> Option<OffsetDateTime> {
    let text = std::str::from_utf8(text).ok()?;
    let digits = text.strip_suffix('Z')?;
    if digits.len() != 14 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| digits[range].parse::<u32>().ok();

    let date = Date::from_calendar_date(
        field(0..4)? as i32,
        Month::try_from(field(4..6)? as u8).ok()?,
        field(6..8)? as u8,
    )
    .ok()?;
    let time = Time::from_hms(
        field(8..10)? as u8,
        field(10..12)? as u8,
        field(12..14)? as u8,
    )
    .ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc())
}

/// The explicitly tagged fields of a Kerberos SEQUENCE.
#[derive(Debug)]
pub struct Fields<'a> {
    fields: Vec<Tlv<'a>>,
}

impl<'a> Fields<'a> {
    /// Read the context-tagged fields of a SEQUENCE.
    pub fn parse(sequence: Tlv<'a>) -> Result<Self> {
        sequence.expect(tag::SEQUENCE)?;
        Ok(Self {
            fields: sequence.children()?,
        })
    }

    /// The value inside field `[n]`, if present.
    pub fn get(&self, n: u8) -> Result<Option<Tlv<'a>>> {
        match self.fields.iter().find(|f| f.tag == 0xa0 | n) {
            Some(field) => Ok(Some(read_single(field.content)?)),
            None => Ok(None),
        }
    }

    /// The value inside field `[n]`, which must be present.
    pub fn require(&self, n: u8, name: &str) -> Result<Tlv<'a>> {
        self.get(n)?
            .ok_or_else(|| malformed(&format!("missing field {}", name)))
    }
}
