use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
struct JwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// How the REST backend authenticates.
pub enum Credentials {
    /// A ready-made token (`GH_TOKEN`, a PAT, or an installation token).
    Token(String),
    /// GitHub App: signed JWTs exchanged for installation tokens.
    App { app_id: u64, key_pem: Vec<u8> },
}

impl Credentials {
    /// App credentials win over a plain token when both are configured.
    pub fn from_config(config: &GitHubConfig) -> Result<Self> {
        if let Some(app_id) = config.app_id {
            let key_pem = match (&config.private_key, &config.private_key_path) {
                (Some(pem), _) => pem.clone().into_bytes(),
                (None, Some(path)) => std::fs::read(path).map_err(|e| {
                    AppError::Config(format!(
                        "Failed to read private key at {}: {e}",
                        path.display()
                    ))
                })?,
                (None, None) => {
                    return Err(AppError::Config(
                        "github.app_id is set but no private key was provided".to_string(),
                    ))
                }
            };
            return Ok(Credentials::App { app_id, key_pem });
        }

        match &config.token {
            Some(token) => Ok(Credentials::Token(token.clone())),
            None => Err(AppError::Config(
                "API backend needs github.token or GitHub App credentials".to_string(),
            )),
        }
    }
}

/// Generate a JWT for GitHub App authentication.
pub fn generate_app_jwt(app_id: u64, key_pem: &[u8]) -> Result<String> {
    let encoding_key = EncodingKey::from_rsa_pem(key_pem)
        .map_err(|e| AppError::Config(format!("Invalid RSA private key: {e}")))?;

    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        iat: now - 60,      // 60 seconds in the past to account for clock drift
        exp: now + 10 * 60, // 10 minute maximum
        iss: app_id.to_string(),
    };

    let header = Header::new(Algorithm::RS256);
    encode(&header, &claims, &encoding_key)
        .map_err(|e| AppError::Config(format!("Failed to generate JWT: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_credentials() {
        let config = GitHubConfig {
            token: Some("ghs_x".into()),
            ..GitHubConfig::default()
        };
        assert!(matches!(
            Credentials::from_config(&config).unwrap(),
            Credentials::Token(t) if t == "ghs_x"
        ));
    }

    #[test]
    fn test_app_credentials_preferred() {
        let config = GitHubConfig {
            app_id: Some(1),
            private_key: Some("pem".into()),
            token: Some("ghs_x".into()),
            ..GitHubConfig::default()
        };
        assert!(matches!(
            Credentials::from_config(&config).unwrap(),
            Credentials::App { app_id: 1, .. }
        ));
    }

    #[test]
    fn test_no_credentials_is_config_error() {
        let err = Credentials::from_config(&GitHubConfig::default()).err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_app_without_key_is_config_error() {
        let config = GitHubConfig {
            app_id: Some(1),
            ..GitHubConfig::default()
        };
        assert!(Credentials::from_config(&config).is_err());
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let err = generate_app_jwt(1, b"not a key").unwrap_err();
        assert!(err.to_string().contains("Invalid RSA private key"));
    }
}
