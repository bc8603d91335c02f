//! Provider authentication variants.
//!
//! Each provider auth scheme is a tagged variant carrying only the fields it
//! needs; the serialized form is what gets sealed into a connection's
//! credential envelope.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(String),
    #[error("Invalid header value for header '{0}'")]
    InvalidHeaderValue(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderAuth {
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    CustomHeader {
        header_name: String,
        header_value: String,
    },
}

impl ProviderAuth {
    /// Scheme tag stored alongside the connection for display purposes.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderAuth::Bearer { .. } => "bearer",
            ProviderAuth::Basic { .. } => "basic",
            ProviderAuth::CustomHeader { .. } => "custom_header",
        }
    }

    /// Builds the outbound request headers for this auth scheme. Values are
    /// marked sensitive so they are redacted from any header debug output.
    pub fn build_auth_headers(&self) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();

        match self {
            ProviderAuth::Bearer { token } => {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| AuthError::InvalidHeaderValue("authorization".into()))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            ProviderAuth::Basic { username, password } => {
                let encoded = BASE64.encode(format!("{username}:{password}"));
                let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
                    .map_err(|_| AuthError::InvalidHeaderValue("authorization".into()))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            ProviderAuth::CustomHeader {
                header_name,
                header_value,
            } => {
                let name = HeaderName::from_bytes(header_name.as_bytes())
                    .map_err(|e| AuthError::InvalidHeaderName(e.to_string()))?;
                let mut value = HeaderValue::from_str(header_value)
                    .map_err(|_| AuthError::InvalidHeaderValue(header_name.clone()))?;
                value.set_sensitive(true);
                headers.insert(name, value);
            }
        }

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_headers() {
        let auth = ProviderAuth::Bearer {
            token: "sk-test-token".to_string(),
        };
        let headers = auth.build_auth_headers().unwrap();
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer sk-test-token"
        );
    }

    #[test]
    fn test_basic_headers() {
        let auth = ProviderAuth::Basic {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        let headers = auth.build_auth_headers().unwrap();
        // base64("user:pass")
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Basic dXNlcjpwYXNz"
        );
    }

    #[test]
    fn test_custom_headers() {
        let auth = ProviderAuth::CustomHeader {
            header_name: "x-api-key".to_string(),
            header_value: "secret".to_string(),
        };
        let headers = auth.build_auth_headers().unwrap();
        assert_eq!(headers.get("x-api-key").unwrap().to_str().unwrap(), "secret");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let auth = ProviderAuth::CustomHeader {
            header_name: "not a header\n".to_string(),
            header_value: "v".to_string(),
        };
        assert!(matches!(
            auth.build_auth_headers(),
            Err(AuthError::InvalidHeaderName(_))
        ));
    }

    #[test]
    fn test_tagged_serialization_roundtrip() {
        let auth = ProviderAuth::Bearer {
            token: "tok".to_string(),
        };
        let json = serde_json::to_string(&auth).unwrap();
        assert!(json.contains(r#""type":"bearer""#));

        let back: ProviderAuth = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), "bearer");
    }
}
