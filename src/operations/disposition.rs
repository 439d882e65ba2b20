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

//! Classification of certsrv HTML pages.
//!
//! The CA only ever answers with HTML, so the outcome of a submission (or
//! the reason a retrieval failed) has to be recovered from the markup. The
//! rules below are tried in order and the first one that recognizes the
//! page wins; a page no rule recognizes is [`DispositionOutcome::Malformed`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{DispositionOutcome, RequestId};

/// Link to the issued certificate, e.g. `certnew.cer?ReqID=42&Enc=b64`.
static ISSUED_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"certnew.*\?ReqID=(\d+)&").expect("valid regex"));

/// Marker phrase on the pending page.
pub const PENDING_MARKER: &str = "Certificate Pending";

/// Request ID on the pending page.
static PENDING_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Your Request Id is (\d+).").expect("valid regex"));

/// Disposition message on denial pages.
static DISPOSITION_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"The disposition message is "([^"]+)"#).expect("valid regex"));

/// Number of disposition markers on a denial page: the CA prints the message
/// once in the status summary and once in the detail section.
pub const DENIAL_MARKER_COUNT: usize = 2;

struct Rule {
    name: &'static str,
    apply: fn(&str) -> Option<DispositionOutcome>,
}

static RULES: &[Rule] = &[
    Rule {
        name: "issued",
        apply: issued,
    },
    Rule {
        name: "pending",
        apply: pending,
    },
    Rule {
        name: "denied",
        apply: denied,
    },
];

/// Classify a CA response body.
pub fn classify(body: &str) -> DispositionOutcome {
    RULES
        .iter()
        .find_map(|rule| {
            let outcome = (rule.apply)(body)?;
            tracing::trace!(rule = rule.name, "CA page recognized");
            Some(outcome)
        })
        .unwrap_or(DispositionOutcome::Malformed)
}

fn issued(body: &str) -> Option<DispositionOutcome> {
    let id = ISSUED_LINK.captures(body)?.get(1)?.as_str();
    RequestId::parse(id).ok().map(DispositionOutcome::Issued)
}

fn pending(body: &str) -> Option<DispositionOutcome> {
    if !body.contains(PENDING_MARKER) {
        return None;
    }
    let request_id = PENDING_ID
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| RequestId::parse(m.as_str()).ok());
    if request_id.is_none() {
        tracing::warn!("Pending page without a request id");
    }
    Some(DispositionOutcome::Pending { request_id })
}

fn denied(body: &str) -> Option<DispositionOutcome> {
    let messages: Vec<&str> = DISPOSITION_MESSAGE
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if messages.len() != DENIAL_MARKER_COUNT {
        if !messages.is_empty() {
            tracing::warn!(
                count = messages.len(),
                expected = DENIAL_MARKER_COUNT,
                "Unexpected number of disposition messages; treating page as unrecognized"
            );
        }
        return None;
    }

    Some(DispositionOutcome::Denied {
        message: messages[0].to_string(),
    })
}
