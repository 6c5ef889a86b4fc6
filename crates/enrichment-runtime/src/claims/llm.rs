//! LLM-backed claim extraction: prompts the completion collaborator
//! for a JSON array of `{text, entities}`, with jittered-backoff retry
//! and a bracket-matching parser tolerant of chatty wrapping text.

use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::llm::{LlmCompletion, LlmError};
use crate::types::{ClaimError, Entity, EntityType};

const MAX_PROMPT_CHARS: usize = 5_000;
const LLM_TIMEOUT: Duration = Duration::from_secs(45);
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

const SYSTEM_PROMPT: &str = "\
Extract factual claims from the article text. \
Respond with a JSON array of objects: {\"text\": string, \"entities\": [{\"text\": string, \"type\": \"PERSON\"|\"ORG\"|\"LOC\"|\"MONEY\"|\"PERCENT\"}]}. \
Return only the JSON array, no prose.";

#[derive(Deserialize)]
struct RawClaim {
    text: String,
    #[serde(default)]
    entities: Vec<RawEntity>,
}

#[derive(Deserialize)]
struct RawEntity {
    text: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct LlmClaimExtractor<'a> {
    completion: &'a dyn LlmCompletion,
}

impl<'a> LlmClaimExtractor<'a> {
    pub fn new(completion: &'a dyn LlmCompletion) -> Self {
        Self { completion }
    }

    /// Runs up to `MAX_RETRIES + 1` attempts, retrying only on
    /// `ClaimError::is_retryable()` errors. Cancellation propagates
    /// immediately without consuming a retry.
    pub async fn extract(
        &self,
        ctx: CancellationToken,
        text: &str,
    ) -> Result<Vec<super::heuristic::Candidate>, ClaimError> {
        let truncated: String = text.chars().take(MAX_PROMPT_CHARS).collect();
        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = ClaimError::Provider("no attempts made".into());

        for attempt in 0..=MAX_RETRIES {
            if ctx.is_cancelled() {
                return Err(ClaimError::Cancelled);
            }

            let call = self.completion.complete_text(SYSTEM_PROMPT, &truncated);
            let timeout = tokio::time::sleep(LLM_TIMEOUT);

            let result = tokio::select! {
                _ = ctx.cancelled() => return Err(ClaimError::Cancelled),
                _ = timeout => Err(ClaimError::Timeout(LLM_TIMEOUT)),
                r = call => r.map_err(map_llm_error),
            };

            match result {
                Ok(raw) => match parse_claims_json(&raw) {
                    Ok(claims) => return Ok(claims),
                    Err(parse_err) => return Err(parse_err),
                },
                Err(err) => {
                    last_err = err;
                    if attempt == MAX_RETRIES || !last_err.is_retryable() {
                        return Err(last_err);
                    }
                    let jitter = backoff.mul_f64(1.0 + rand::random::<f64>() * 0.3);
                    let sleep = tokio::time::sleep(jitter);
                    tokio::select! {
                        _ = ctx.cancelled() => return Err(ClaimError::Cancelled),
                        _ = sleep => {}
                    }
                    backoff *= 2;
                }
            }
        }

        Err(last_err)
    }
}

fn map_llm_error(err: LlmError) -> ClaimError {
    match err {
        LlmError::Timeout => ClaimError::Timeout(LLM_TIMEOUT),
        LlmError::RateLimited => ClaimError::Provider("rate limited".into()),
        LlmError::Status { status, body } => {
            ClaimError::Provider(format!("status {status}: {body}"))
        }
        LlmError::Request(msg) => ClaimError::Provider(msg),
        LlmError::NoContent => ClaimError::InvalidJson("empty completion".into()),
    }
}

/// Tries every `[`-started, bracket-balanced substring in document
/// order until one deserialises as a claim array. An empty array is a
/// valid "no claims" result.
fn parse_claims_json(raw: &str) -> Result<Vec<super::heuristic::Candidate>, ClaimError> {
    let bytes = raw.as_bytes();
    let starts: Vec<usize> = bytes
        .iter()
        .enumerate()
        .filter_map(|(i, &b)| (b == b'[').then_some(i))
        .collect();
    if starts.is_empty() {
        return Err(ClaimError::InvalidJson(head(raw)));
    }

    for start in starts {
        let mut depth = 0i32;
        for (offset, &b) in bytes[start..].iter().enumerate() {
            match b {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &raw[start..=start + offset];
                        if let Ok(parsed) = serde_json::from_str::<Vec<RawClaim>>(candidate) {
                            return Ok(parsed.into_iter().map(to_candidate).collect());
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    Err(ClaimError::InvalidJson(head(raw)))
}

fn to_candidate(raw: RawClaim) -> super::heuristic::Candidate {
    let entities = raw
        .entities
        .into_iter()
        .filter_map(|e| {
            let kind = match e.kind.as_str() {
                "PERSON" => EntityType::Person,
                "ORG" => EntityType::Org,
                "LOC" => EntityType::Loc,
                "MONEY" => EntityType::Money,
                "PERCENT" => EntityType::Percent,
                _ => return None,
            };
            Some(Entity { text: e.text, kind })
        })
        .collect();
    super::heuristic::Candidate {
        text: raw.text,
        entities,
    }
}

fn head(s: &str) -> String {
    s.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_array() {
        let raw = r#"Sure, here you go: [{"text":"Sales rose 15%","entities":[{"text":"Apple","type":"ORG"}]}]"#;
        let claims = parse_claims_json(raw).expect("parse");
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].entities[0].kind, EntityType::Org);
    }

    #[test]
    fn empty_array_is_valid() {
        let claims = parse_claims_json("[]").expect("parse");
        assert!(claims.is_empty());
    }

    #[test]
    fn rejects_non_json_text() {
        assert!(parse_claims_json("I could not find any claims.").is_err());
    }

    #[test]
    fn skips_unmatched_bracket_before_finding_valid_array() {
        let raw = r#"note: [unbalanced then [{"text":"ok claim text here","entities":[]}]"#;
        let claims = parse_claims_json(raw).expect("parse");
        assert_eq!(claims.len(), 1);
    }
}
