//! HTTP Digest authentication (RFC 7616) for YaCy, with Basic fallback.
//!
//! Supports `qop=auth` with `MD5`, `MD5-sess`, and `SHA-256` algorithms.
//! MD5 is required here only for compatibility with legacy Digest
//! servers; it carries no cryptographic weight in this context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use md5::Md5;
use sha2::{Digest as Sha2Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Md5Sess,
    Sha256,
}

impl DigestAlgorithm {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "MD5-SESS" => DigestAlgorithm::Md5Sess,
            "SHA-256" => DigestAlgorithm::Sha256,
            _ => DigestAlgorithm::Md5,
        }
    }

    fn hash_hex(self, input: &str) -> String {
        match self {
            DigestAlgorithm::Md5 | DigestAlgorithm::Md5Sess => {
                let mut h = Md5::new();
                h.update(input.as_bytes());
                hex::encode(h.finalize())
            }
            DigestAlgorithm::Sha256 => {
                let mut h = Sha256::new();
                h.update(input.as_bytes());
                hex::encode(h.finalize())
            }
        }
    }
}

/// Parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub algorithm: DigestAlgorithm,
}

impl DigestChallenge {
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.trim_start().strip_prefix("Digest")?.trim_start();
        let mut fields: HashMap<String, String> = HashMap::new();
        for part in split_header_params(rest) {
            if let Some((k, v)) = part.split_once('=') {
                let v = v.trim().trim_matches('"').to_string();
                fields.insert(k.trim().to_ascii_lowercase(), v);
            }
        }
        Some(Self {
            realm: fields.get("realm").cloned().unwrap_or_default(),
            nonce: fields.get("nonce").cloned()?,
            opaque: fields.get("opaque").cloned(),
            qop: fields.get("qop").cloned(),
            algorithm: fields
                .get("algorithm")
                .map(|a| DigestAlgorithm::parse(a))
                .unwrap_or(DigestAlgorithm::Md5),
        })
    }
}

fn split_header_params(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                out.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

/// Per-request nonce counter; a fresh `cnonce` is generated on each call.
pub struct DigestAuthenticator {
    username: String,
    password: String,
    nc: AtomicU32,
}

impl DigestAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            nc: AtomicU32::new(0),
        }
    }

    /// Builds the `Authorization: Digest ...` header value for one
    /// request. `body` is the replayable request body (empty for GET),
    /// preserved so the request can be retried without consuming it.
    pub fn authorization_header(
        &self,
        challenge: &DigestChallenge,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        let nc = self.nc.fetch_add(1, Ordering::SeqCst) + 1;
        let nc_hex = format!("{nc:08x}");

        let ha1_base = format!("{}:{}:{}", self.username, challenge.realm, self.password);
        let ha1 = match challenge.algorithm {
            DigestAlgorithm::Md5Sess => {
                let base = challenge.algorithm.hash_hex(&ha1_base);
                challenge
                    .algorithm
                    .hash_hex(&format!("{base}:{}:{cnonce}", challenge.nonce))
            }
            _ => challenge.algorithm.hash_hex(&ha1_base),
        };

        let ha2 = challenge.algorithm.hash_hex(&format!("{method}:{uri}"));

        let response = if challenge.qop.is_some() {
            challenge.algorithm.hash_hex(&format!(
                "{ha1}:{}:{nc_hex}:{cnonce}:auth:{ha2}",
                challenge.nonce
            ))
        } else {
            challenge
                .algorithm
                .hash_hex(&format!("{ha1}:{}:{ha2}", challenge.nonce))
        };

        let algorithm_label = match challenge.algorithm {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Md5Sess => "MD5-sess",
            DigestAlgorithm::Sha256 => "SHA-256",
        };

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
            self.username, challenge.realm, challenge.nonce, uri, algorithm_label, response
        );
        if challenge.qop.is_some() {
            header.push_str(&format!(", qop=auth, nc={nc_hex}, cnonce=\"{cnonce}\""));
        }
        if let Some(opaque) = &challenge.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        header
    }

    pub fn basic_header(&self) -> String {
        use base64::Engine;
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_digest_challenge() {
        let header = r#"Digest realm="yacy", qop="auth", algorithm=SHA-256, nonce="abc123", opaque="xyz""#;
        let challenge = DigestChallenge::parse(header).unwrap();
        assert_eq!(challenge.realm, "yacy");
        assert_eq!(challenge.nonce, "abc123");
        assert_eq!(challenge.qop.as_deref(), Some("auth"));
        assert_eq!(challenge.algorithm, DigestAlgorithm::Sha256);
        assert_eq!(challenge.opaque.as_deref(), Some("xyz"));
    }

    #[test]
    fn defaults_to_md5_when_algorithm_absent() {
        let header = r#"Digest realm="yacy", nonce="n1""#;
        let challenge = DigestChallenge::parse(header).unwrap();
        assert_eq!(challenge.algorithm, DigestAlgorithm::Md5);
    }

    #[test]
    fn builds_deterministic_response_for_fixed_inputs() {
        let auth = DigestAuthenticator::new("user", "pass");
        let challenge = DigestChallenge {
            realm: "yacy".into(),
            nonce: "abc".into(),
            opaque: None,
            qop: Some("auth".into()),
            algorithm: DigestAlgorithm::Md5,
        };
        let header = auth.authorization_header(&challenge, "GET", "/yacysearch.json", "cnonce1");
        assert!(header.contains("username=\"user\""));
        assert!(header.contains("qop=auth"));
        assert!(header.contains("nc=00000001"));
    }

    #[test]
    fn nonce_counter_increments_across_calls() {
        let auth = DigestAuthenticator::new("u", "p");
        let challenge = DigestChallenge {
            realm: "r".into(),
            nonce: "n".into(),
            opaque: None,
            qop: Some("auth".into()),
            algorithm: DigestAlgorithm::Md5,
        };
        let h1 = auth.authorization_header(&challenge, "GET", "/", "c1");
        let h2 = auth.authorization_header(&challenge, "GET", "/", "c2");
        assert!(h1.contains("nc=00000001"));
        assert!(h2.contains("nc=00000002"));
    }
}
