/// Social login token verification
///
/// Verifies an identity provider's ID token by calling the provider's
/// token-info endpoint over HTTPS. The outbound call carries a bounded
/// timeout; a timeout is reported as its own error variant so the API can
/// return 408 and the user can retry, never a silent success.

use serde::Deserialize;
use std::time::Duration;

/// Bounded timeout for the outbound verification call.
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for social login verification
#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    /// The identity provider did not answer within the timeout
    #[error("Identity provider timed out")]
    UpstreamTimeout,

    /// The provider rejected the token
    #[error("Identity provider rejected the token: {0}")]
    InvalidToken(String),

    /// Transport-level failure talking to the provider
    #[error("Identity provider request failed: {0}")]
    Http(String),

    /// The provider's response was missing required fields
    #[error("Malformed identity provider response: {0}")]
    MalformedResponse(String),
}

/// Identity attested by the provider for a verified token
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Verified email address
    pub email: String,

    /// Display name, if the provider supplies one
    pub name: Option<String>,

    /// Avatar URL, if the provider supplies one
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Verifies an ID token against the provider's token-info endpoint
///
/// # Arguments
///
/// * `client` - Shared reqwest client (connection pooling)
/// * `token_info_url` - Provider endpoint, e.g. Google's tokeninfo URL
/// * `id_token` - The opaque ID token supplied by the client
///
/// # Errors
///
/// - [`SocialError::UpstreamTimeout`] when the provider does not answer in time
/// - [`SocialError::InvalidToken`] when the provider returns a non-success status
/// - [`SocialError::MalformedResponse`] when the attested email is missing
pub async fn verify_id_token(
    client: &reqwest::Client,
    token_info_url: &str,
    id_token: &str,
) -> Result<VerifiedIdentity, SocialError> {
    let response = client
        .get(token_info_url)
        .query(&[("id_token", id_token)])
        .timeout(VERIFY_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                SocialError::UpstreamTimeout
            } else {
                SocialError::Http(e.to_string())
            }
        })?;

    if !response.status().is_success() {
        return Err(SocialError::InvalidToken(format!(
            "provider returned {}",
            response.status()
        )));
    }

    let info: TokenInfoResponse = response
        .json()
        .await
        .map_err(|e| SocialError::MalformedResponse(e.to_string()))?;

    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| SocialError::MalformedResponse("missing email claim".to_string()))?;

    Ok(VerifiedIdentity {
        email,
        name: info.name,
        avatar_url: info.picture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_info_deserialization() {
        let info: TokenInfoResponse = serde_json::from_str(
            r#"{"email":"user@example.com","name":"Jo Smith","picture":"https://example.com/p.png","aud":"x"}"#,
        )
        .unwrap();

        assert_eq!(info.email.as_deref(), Some("user@example.com"));
        assert_eq!(info.name.as_deref(), Some("Jo Smith"));
        assert_eq!(info.picture.as_deref(), Some("https://example.com/p.png"));
    }

    #[test]
    fn test_verify_timeout_is_bounded() {
        assert_eq!(VERIFY_TIMEOUT, Duration::from_secs(10));
    }
}
