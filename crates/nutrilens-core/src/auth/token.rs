//! Bearer token payload decoding.
//!
//! Trust boundary: tokens are decoded WITHOUT verifying their signature.
//! The claims are only used locally (display identity, expiry hints); the
//! backend verifies every token it receives, so nothing here is an
//! authorization decision.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is not a three-part JWT")]
    Malformed,

    #[error("Token payload is not valid base64url: {0}")]
    Encoding(String),

    #[error("Token payload is not valid claims JSON: {0}")]
    Payload(String),

    #[error("Token has no subject claim")]
    MissingSubject,
}

/// Claims we read from the token payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Numeric subjects are accepted and kept as their decimal text.
    #[serde(default, deserialize_with = "subject_claim")]
    pub sub: Option<String>,
    /// Expiry in seconds since the Unix epoch; fractional values are floored.
    #[serde(default, deserialize_with = "seconds_claim")]
    pub exp: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSubject {
    Text(String),
    Number(serde_json::Number),
}

fn subject_claim<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawSubject>::deserialize(d)?.map(|sub| match sub {
        RawSubject::Text(text) => text,
        RawSubject::Number(n) => n.to_string(),
    }))
}

fn seconds_claim<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let secs: Option<f64> = Option::deserialize(d)?;
    Ok(secs.filter(|s| s.is_finite()).map(|s| s.floor() as i64))
}

impl Claims {
    /// Subject claim, required for a usable session.
    pub fn subject(&self) -> Result<&str, TokenError> {
        match self.sub.as_deref() {
            Some(sub) if !sub.is_empty() => Ok(sub),
            _ => Err(TokenError::MissingSubject),
        }
    }

    /// Expiry as a timestamp. `None` when the token carries no `exp`.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// A token without `exp` never expires locally.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => now.timestamp() >= exp,
            None => false,
        }
    }
}

/// Decode the payload segment of a JWT without checking the signature.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(TokenError::Malformed),
    };

    // Some issuers pad the segments; base64url-no-pad rejects that.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned token around an arbitrary payload.
    pub(crate) fn make_token(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_decode_claims() {
        let token = make_token(serde_json::json!({"sub": "a@b.com", "exp": 1_900_000_000}));
        let claims = decode_claims(&token).expect("decodes");
        assert_eq!(claims.subject(), Ok("a@b.com"));
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert_eq!(
            claims.expires_at().map(|t| t.timestamp()),
            Some(1_900_000_000)
        );
    }

    #[test]
    fn test_numeric_subject_and_fractional_expiry() {
        let token = make_token(serde_json::json!({"sub": 42, "exp": 1_900_000_000.75}));
        let claims = decode_claims(&token).expect("decodes");
        assert_eq!(claims.subject(), Ok("42"));
        assert_eq!(claims.exp, Some(1_900_000_000));

        let token = make_token(serde_json::json!({"sub": "a@b.com", "exp": null}));
        let claims = decode_claims(&token).expect("null exp");
        assert_eq!(claims.exp, None);

        let token = make_token(serde_json::json!({"sub": ["a"]}));
        assert!(matches!(decode_claims(&token), Err(TokenError::Payload(_))));
    }

    #[test]
    fn test_decode_padded_payload() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let body = base64::engine::general_purpose::URL_SAFE.encode(br#"{"sub":"pad@x.io"}"#);
        let token = format!("{}.{}.sig", header, body);
        let claims = decode_claims(&token).expect("padding tolerated");
        assert_eq!(claims.subject(), Ok("pad@x.io"));
    }

    #[test]
    fn test_malformed_tokens() {
        assert_eq!(decode_claims(""), Err(TokenError::Malformed));
        assert_eq!(decode_claims("validtoken"), Err(TokenError::Malformed));
        assert_eq!(decode_claims("a..c"), Err(TokenError::Malformed));
        assert_eq!(decode_claims("a.b.c.d"), Err(TokenError::Malformed));
        assert!(matches!(decode_claims("a.!!!.c"), Err(TokenError::Encoding(_))));

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"not json"));
        assert!(matches!(decode_claims(&not_json), Err(TokenError::Payload(_))));
    }

    #[test]
    fn test_missing_subject() {
        let token = make_token(serde_json::json!({"exp": 10}));
        let claims = decode_claims(&token).expect("decodes");
        assert_eq!(claims.subject(), Err(TokenError::MissingSubject));

        let token = make_token(serde_json::json!({"sub": ""}));
        let claims = decode_claims(&token).expect("decodes");
        assert_eq!(claims.subject(), Err(TokenError::MissingSubject));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let claims = Claims {
            sub: Some("a@b.com".into()),
            exp: Some(now.timestamp()),
        };
        // Expired at exactly `exp`.
        assert!(claims.is_expired_at(now));

        let claims = Claims {
            sub: Some("a@b.com".into()),
            exp: Some(now.timestamp() + 1),
        };
        assert!(!claims.is_expired_at(now));

        let claims = Claims {
            sub: Some("a@b.com".into()),
            exp: None,
        };
        assert!(!claims.is_expired_at(now));
    }
}
