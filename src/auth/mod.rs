//! Identity boundary of the order workflow.
//!
//! OTP login and token issuance live in the authentication service. This module
//! only verifies the bearer token it hands out and turns the referenced buyer
//! account into a [`BuyerPrincipal`].

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entities::{buyer, BuyerStatus, ShippingAddress};
use crate::errors::ServiceError;

/// JWT claims carried by buyer session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Buyer ID
    pub iss: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Already-verified corporate buyer acting on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerPrincipal {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub company_name: String,
    pub status: BuyerStatus,
    pub default_address: Option<ShippingAddress>,
}

impl From<buyer::Model> for BuyerPrincipal {
    fn from(model: buyer::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            phone: model.phone,
            company_name: model.company_name,
            status: model.status,
            default_address: model.default_address,
        }
    }
}

impl BuyerPrincipal {
    /// Every workflow entry point requires an active account.
    pub fn ensure_active(&self) -> Result<(), ServiceError> {
        match self.status {
            BuyerStatus::Active => Ok(()),
            other => {
                warn!(buyer_id = %self.id, status = %other, "inactive buyer rejected");
                Err(ServiceError::Forbidden(format!(
                    "buyer account is {}",
                    other
                )))
            }
        }
    }
}

/// Verifies HS256 buyer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: String,
    issuer: String,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
        }
    }

    /// Validate a token and return the buyer id it was issued for
    pub fn verify(&self, token: &str) -> Result<Uuid, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("token expired".to_string())
            }
            _ => ServiceError::Unauthorized("invalid token".to_string()),
        })?
        .claims;

        Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("invalid token subject".to_string()))
    }

    /// Mint a token the way the authentication service does. Used by
    /// operational tooling and tests.
    pub fn issue(&self, buyer_id: Uuid, ttl: Duration) -> Result<String, ServiceError> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|e| ServiceError::InternalError(format!("invalid token ttl: {}", e)))?;
        let claims = Claims {
            sub: buyer_id.to_string(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token creation failed: {}", e)))
    }
}

/// Load the buyer behind a verified token.
pub async fn load_principal<C>(db: &C, buyer_id: Uuid) -> Result<BuyerPrincipal, ServiceError>
where
    C: ConnectionTrait,
{
    let buyer = buyer::Entity::find_by_id(buyer_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            debug!(%buyer_id, "token references unknown buyer");
            ServiceError::Unauthorized("unknown buyer".to_string())
        })?;

    Ok(buyer.into())
}
