use crate::model::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Scopes this engine is willing to request. Anything else is refused before
/// a token exchange is attempted.
const ALLOWED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// Access tokens nominally last 3600 seconds; reuse them a bit short of that.
pub const TOKEN_REUSE_WINDOW: Duration = Duration::from_secs(3000);

/// A Google service-account key, as downloaded from the cloud console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    exp: u64,
    iat: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange a service-account key for an OAuth access token using an RS256
/// JWT assertion.
pub async fn generate_token(
    http: &reqwest::Client,
    key: &GoogleServiceAccountKey,
    scopes: &[&str],
) -> Result<String, EngineError> {
    for scope in scopes {
        if !ALLOWED_SCOPES.contains(scope) {
            return Err(EngineError::validation(format!(
                "Scope not allowed: {}",
                scope
            )));
        }
    }

    let now = chrono::Utc::now().timestamp() as u64;
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: scopes.join(" "),
        aud: GOOGLE_TOKEN_ENDPOINT,
        exp: now + 3600,
        iat: now,
    };

    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| EngineError::validation(format!("Invalid service account key: {}", e)))?;
    let assertion = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
        &claims,
        &encoding_key,
    )
    .map_err(|e| EngineError::internal(format!("Failed to sign JWT assertion: {}", e)))?;

    let response = http
        .post(GOOGLE_TOKEN_ENDPOINT)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await
        .map_err(|e| EngineError::upstream(format!("Token exchange failed: {}", e), None))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::upstream(
            format!("Token exchange returned status {}", status),
            Some(status.as_u16()),
        ));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| EngineError::upstream(format!("Invalid token response: {}", e), None))?;

    Ok(token.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> GoogleServiceAccountKey {
        GoogleServiceAccountKey {
            key_type: "service_account".to_string(),
            project_id: "proj".to_string(),
            private_key: "not a pem".to_string(),
            client_email: "svc@proj.iam.gserviceaccount.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_disallowed_scope_is_refused_before_any_exchange() {
        let error = generate_token(
            &reqwest::Client::new(),
            &key(),
            &["https://www.googleapis.com/auth/gmail.readonly"],
        )
        .await
        .unwrap_err();
        assert_eq!(error.code, "invalid_type");
    }

    #[tokio::test]
    async fn test_malformed_private_key_is_a_validation_error() {
        let error = generate_token(
            &reqwest::Client::new(),
            &key(),
            &["https://www.googleapis.com/auth/spreadsheets.readonly"],
        )
        .await
        .unwrap_err();
        assert!(error.message.contains("Invalid service account key"));
    }
}
