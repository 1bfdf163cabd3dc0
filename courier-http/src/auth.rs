//! Authentication schemes configured on the pipeline builder.

use base64::Engine;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::warn;

/// Authentication applied by the transport.
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    /// `Authorization: Basic base64(user:password)` on every request.
    Basic { username: String, password: String },
    /// Challenge/response after a `401` carrying a Digest challenge.
    Digest { username: String, password: String },
    /// `Authorization: Bearer <token>` on every request.
    Bearer(String),
}

impl Authentication {
    /// Header value sent up front, if the scheme has one.
    pub fn preemptive_header(&self) -> Option<String> {
        match self {
            Authentication::Basic { username, password } => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                Some(format!("Basic {}", credentials))
            }
            Authentication::Bearer(token) => Some(format!("Bearer {}", token)),
            Authentication::Digest { .. } => None,
        }
    }
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authentication::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Authentication::Digest { username, .. } => f
                .debug_struct("Digest")
                .field("username", username)
                .finish_non_exhaustive(),
            Authentication::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

/// Parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    algorithm: String,
    qop: Option<String>,
}

impl DigestChallenge {
    /// Parse a challenge header value, `None` when it is not a Digest
    /// challenge or lacks realm or nonce.
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.trim();
        let (scheme, params) = rest.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let params = parse_params(params);
        let qop = params.get("qop").and_then(|qop| {
            qop.split(',')
                .map(str::trim)
                .find(|q| q.eq_ignore_ascii_case("auth"))
                .map(str::to_string)
        });

        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            opaque: params.get("opaque").cloned(),
            algorithm: params
                .get("algorithm")
                .cloned()
                .unwrap_or_else(|| "MD5".to_string()),
            qop,
        })
    }

    /// Challenge realm.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Challenge algorithm, `MD5` when the server named none.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Whether the challenge can be answered.
    pub fn is_supported(&self) -> bool {
        self.hash().is_some()
    }

    /// Hash function and session flag for the challenge algorithm.
    fn hash(&self) -> Option<(fn(&str) -> String, bool)> {
        let algorithm = self.algorithm.to_ascii_uppercase();
        let (name, session) = match algorithm.strip_suffix("-SESS") {
            Some(name) => (name.to_string(), true),
            None => (algorithm, false),
        };
        let hash: fn(&str) -> String = match name.as_str() {
            "MD5" => md5_hex,
            "SHA-256" => sha256_hex,
            _ => return None,
        };
        Some((hash, session))
    }

    /// Build the `Authorization` header answering this challenge.
    ///
    /// `uri` is the request target (path and query).
    pub fn respond(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> Option<String> {
        let Some((hash, session)) = self.hash() else {
            warn!(algorithm = %self.algorithm, "Unsupported digest algorithm");
            return None;
        };

        let nc = "00000001";
        let mut ha1 = hash(&format!("{}:{}:{}", username, self.realm, password));
        if session {
            ha1 = hash(&format!("{}:{}:{}", ha1, self.nonce, cnonce));
        }
        let ha2 = hash(&format!("{}:{}", method, uri));
        let response = match &self.qop {
            Some(qop) => hash(&format!(
                "{}:{}:{}:{}:{}:{}",
                ha1, self.nonce, nc, cnonce, qop, ha2
            )),
            None => hash(&format!("{}:{}:{}", ha1, self.nonce, ha2)),
        };

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
            username, self.realm, self.nonce, uri, self.algorithm, response
        );
        if let Some(qop) = &self.qop {
            header.push_str(&format!(", qop={}, nc={}, cnonce=\"{}\"", qop, nc, cnonce));
        } else if session {
            header.push_str(&format!(", cnonce=\"{}\"", cnonce));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        Some(header)
    }
}

/// Random client nonce.
pub(crate) fn new_cnonce() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_ascii_lowercase();
        let after = after.trim_start();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim(), &after[end..]),
                None => (after.trim(), ""),
            }
        };

        params.insert(key, value.to_string());
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    params
}
