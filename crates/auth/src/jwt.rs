//! HS256 bearer-token validation.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Turns a raw bearer token into verified claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// Shared-secret (HS256) validator.
///
/// The signature is checked by `jsonwebtoken`; the time window is checked by
/// [`validate_claims`] against the caller's clock, since the claims carry
/// RFC 3339 timestamps rather than the registered numeric `exp`/`iat`.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            TokenValidationError::Malformed
        })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    use edufin_core::{TenantId, UserId};

    use crate::Role;

    fn mint(secret: &str, issued_at: DateTime<Utc>) -> String {
        let claims = JwtClaims {
            sub: UserId::new("bursar").unwrap(),
            tenant_id: TenantId::new("school-1").unwrap(),
            roles: vec![Role::new("bursar")],
            issued_at,
            expires_at: issued_at + Duration::minutes(10),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_its_claims() {
        let now = Utc::now();
        let validator = Hs256JwtValidator::new("test-secret");
        let claims = validator.validate(&mint("test-secret", now), now).unwrap();
        assert_eq!(claims.tenant_id.as_str(), "school-1");
        assert_eq!(claims.sub.as_str(), "bursar");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let validator = Hs256JwtValidator::new("test-secret");
        assert_eq!(
            validator.validate(&mint("other-secret", now), now),
            Err(TokenValidationError::Malformed)
        );
        assert_eq!(
            validator.validate("not-a-token", now),
            Err(TokenValidationError::Malformed)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - Duration::hours(1);
        let validator = Hs256JwtValidator::new("test-secret");
        assert_eq!(
            validator.validate(&mint("test-secret", issued), Utc::now()),
            Err(TokenValidationError::Expired)
        );
    }
}
