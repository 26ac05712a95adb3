use async_trait::async_trait;
use crate::error::Result;

/// Produces the authentication header for endpoint requests
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `(header_name, header_value)`, or `None` when no header is needed
    async fn get_auth_header(&self) -> Result<Option<(String, String)>>;
}

/// OpenAI-style API key, sent as a bearer token
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    api_key: String,
}

impl ApiKeyAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuth {
    async fn get_auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(Some((
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )))
    }
}

/// Pre-issued bearer token
#[derive(Debug, Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authenticator for BearerAuth {
    async fn get_auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(Some((
            "Authorization".to_string(),
            format!("Bearer {}", self.token),
        )))
    }
}

#[derive(Debug, Clone)]
pub struct NoAuth;

#[async_trait]
impl Authenticator for NoAuth {
    async fn get_auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_api_key_header() {
        let header = ApiKeyAuth::new("mcp").get_auth_header().await.unwrap();
        assert_eq!(
            header,
            Some(("Authorization".to_string(), "Bearer mcp".to_string()))
        );
    }

    #[tokio::test]
    async fn test_no_auth() {
        assert!(NoAuth.get_auth_header().await.unwrap().is_none());
    }
}
