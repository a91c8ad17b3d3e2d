use anyhow::{Context, Result, bail};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use super::model::{Caller, Claims};
use crate::config::Config;

/// Turns bearer tokens minted by the auth service into a [`Caller`].
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_rsa_pem(public_key: &str) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(public_key.replace("\\n", "\n").as_bytes())
            .context("Invalid public key")?;
        Ok(Self {
            key,
            validation: Validation::new(Algorithm::RS256),
        })
    }

    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        match (&config.jwt_public_key, &config.jwt_secret) {
            (Some(pem), _) => Self::from_rsa_pem(pem),
            (None, Some(secret)) => Ok(Self::from_secret(secret)),
            (None, None) => bail!("JWT_PUBLIC_KEY or JWT_SECRET must be set"),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Caller> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .context("Failed to verify the JWT")?;
        let account_id = data
            .claims
            .sub
            .parse::<i64>()
            .context("Subject is not an account id")?;
        Ok(Caller {
            account_id,
            role: data.claims.role,
        })
    }
}
