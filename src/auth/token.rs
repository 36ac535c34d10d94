/// Token Codec
///
/// Issues and verifies the stateless HS512 bearer tokens that carry a user's
/// internal id between requests. Nothing about an issued token is stored on
/// the server; a token lives until it expires or the client discards it.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::config::AuthConfig;
use super::error::{AuthError, TokenError};

/// Issuer written into every token and required on verification.
pub const DEFAULT_ISSUER: &str = "demo app";

/// Default validity window: one day.
pub const DEFAULT_VALIDITY_SECS: u64 = 24 * 60 * 60;

/// The only signing algorithm accepted. Never taken from the token header.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Internal user identifier
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (seconds since the epoch)
    pub iat: u64,
    /// Expiration (seconds since the epoch)
    pub exp: u64,
}

/// Source of the current time for issuing and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn unix_seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

/// Signs and verifies bearer tokens with a process-wide symmetric secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    validity: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("validity", &self.validity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], issuer: impl Into<String>, validity_secs: u64) -> Self {
        let validity_secs = i64::try_from(validity_secs).unwrap_or(i64::MAX / 1000);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            validity: Duration::seconds(validity_secs),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build a codec from validated authentication settings.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.issuer.clone(),
            config.token_validity_secs,
        )
    }

    /// Replace the clock, mainly to test the validity window.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Create a signed token for `subject`, valid from now until now + validity.
    pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
        if subject.is_empty() {
            return Err(AuthError::TokenIssue("subject cannot be empty".to_string()));
        }

        let issued_at = self.clock.now();
        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: unix_seconds(issued_at),
            exp: unix_seconds(issued_at + self.validity),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Check a token's structure, signature, issuer and expiry and return its subject.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(TokenError::Malformed(
                "expected three dot-separated segments".to_string(),
            ));
        }

        decode_header(token)
            .map_err(|e| TokenError::Malformed(format!("unreadable header: {}", e)))?;

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map_err(classify)?
            .claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Malformed("empty subject".to_string()));
        }

        if claims.exp <= claims.iat {
            return Err(TokenError::Malformed(
                "expiration is not after issue time".to_string(),
            ));
        }

        if unix_seconds(self.clock.now()) > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims.sub)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        // Expiry is checked against the codec clock with no leeway.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation
    }
}

/// Map a decoding failure onto the token error taxonomy.
///
/// The header has already been decoded when this runs, and the signature is
/// checked before the payload is decoded, so base64 failures here come from a
/// tampered signature segment.
fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidIssuer
        | ErrorKind::Base64(_) => TokenError::Invalid,
        ErrorKind::MissingRequiredClaim(claim) => {
            TokenError::Malformed(format!("missing claim: {}", claim))
        }
        ErrorKind::Json(_) => TokenError::Malformed("payload is not valid claims JSON".to_string()),
        other => TokenError::Malformed(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::TimeZone;

    const SECRET: &[u8] =
        b"test-secret-that-is-long-enough-for-hs512-signing-0123456789abcdef";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn codec_at(at: DateTime<Utc>) -> TokenCodec {
        TokenCodec::new(SECRET, DEFAULT_ISSUER, DEFAULT_VALIDITY_SECS)
            .with_clock(Arc::new(FixedClock(at)))
    }

    fn flip_low_bit(token: &str, index: usize) -> String {
        let mut bytes = token.as_bytes().to_vec();
        bytes[index] ^= 0x01;
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = TokenCodec::new(SECRET, DEFAULT_ISSUER, DEFAULT_VALIDITY_SECS);
        for subject in ["42", "u-7", "351341d31341c13414t1244", "ユーザー"] {
            let token = codec.issue(subject).unwrap();
            assert_eq!(codec.verify(&token).unwrap(), subject);
        }
    }

    #[test]
    fn test_token_layout() {
        let token = codec_at(t0()).issue("42").unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS512");

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[1]).unwrap()).unwrap();
        assert_eq!(payload["sub"], "42");
        assert_eq!(payload["iss"], "demo app");
        let iat = payload["iat"].as_u64().unwrap();
        let exp = payload["exp"].as_u64().unwrap();
        assert_eq!(iat, unix_seconds(t0()));
        assert_eq!(exp - iat, DEFAULT_VALIDITY_SECS);
    }

    #[test]
    fn test_validity_window() {
        let token = codec_at(t0()).issue("42").unwrap();

        let almost_a_day = t0() + Duration::hours(23) + Duration::minutes(59);
        assert_eq!(codec_at(almost_a_day).verify(&token).unwrap(), "42");

        let just_over_a_day = t0() + Duration::hours(24) + Duration::minutes(1);
        assert_eq!(
            codec_at(just_over_a_day).verify(&token),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_any_bit_flip_in_payload_or_signature_is_invalid() {
        let codec = codec_at(t0());
        let token = codec.issue("42").unwrap();
        let payload_start = token.find('.').unwrap() + 1;

        for index in payload_start..token.len() {
            if token.as_bytes()[index] == b'.' {
                continue;
            }
            let tampered = flip_low_bit(&token, index);
            assert_eq!(
                codec.verify(&tampered),
                Err(TokenError::Invalid),
                "bit flip at {} was not rejected as invalid",
                index
            );
        }
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = codec_at(t0()).issue("42").unwrap();
        let other = TokenCodec::new(
            b"a-completely-different-secret-that-is-also-long-enough-for-hs512!!",
            DEFAULT_ISSUER,
            DEFAULT_VALIDITY_SECS,
        )
        .with_clock(Arc::new(FixedClock(t0())));

        assert_eq!(other.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_algorithm_is_not_attacker_selectable() {
        let claims = Claims {
            sub: "admin".to_string(),
            iss: DEFAULT_ISSUER.to_string(),
            iat: unix_seconds(t0()),
            exp: unix_seconds(t0()) + 60,
        };

        // Same secret, weaker algorithm.
        let hs256 = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(codec_at(t0()).verify(&hs256), Err(TokenError::Invalid));

        // Unsigned token with "alg": "none".
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let unsigned = format!("{}.{}.{}", header, payload, "AAAA");
        assert!(codec_at(t0()).verify(&unsigned).is_err());
    }

    #[test]
    fn test_foreign_issuer_is_invalid() {
        let foreign = TokenCodec::new(SECRET, "someone else", DEFAULT_VALIDITY_SECS)
            .with_clock(Arc::new(FixedClock(t0())));
        let token = foreign.issue("42").unwrap();

        assert_eq!(codec_at(t0()).verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec_at(t0());
        for input in ["", "abc", "a.b", "a.b.c.d", "..", "null", "Bearer x.y.z", "!!!.###.$$$"] {
            assert!(
                matches!(codec.verify(input), Err(TokenError::Malformed(_))),
                "{:?} should be malformed",
                input
            );
        }
    }

    #[test]
    fn test_missing_subject_is_malformed() {
        #[derive(Serialize)]
        struct NoSubject<'a> {
            iss: &'a str,
            iat: u64,
            exp: u64,
        }

        let token = encode(
            &Header::new(Algorithm::HS512),
            &NoSubject {
                iss: DEFAULT_ISSUER,
                iat: unix_seconds(t0()),
                exp: unix_seconds(t0()) + 60,
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(matches!(
            codec_at(t0()).verify(&token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_subject_cannot_be_issued() {
        assert!(matches!(
            codec_at(t0()).issue(""),
            Err(AuthError::TokenIssue(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", codec_at(t0()));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("test-secret"));
    }
}
