// Caller identity extractor
// Decision: Identity arrives in the x-user-id header; session handling lives in front of this service

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user id. Returns 401 when the header is missing or not a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
        let raw = value
            .to_str()
            .map_err(|_| ApiError::unauthorized("Invalid x-user-id header"))?;
        Uuid::parse_str(raw.trim())
            .map(UserId)
            .map_err(|_| ApiError::unauthorized("Invalid x-user-id header"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract(header: Option<&str>) -> Result<UserId, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        UserId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_header() {
        let id = Uuid::now_v7();
        assert_eq!(extract(Some(&id.to_string())).await.unwrap(), UserId(id));
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header() {
        assert_eq!(
            extract(None).await.unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            extract(Some("not-a-uuid")).await.unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );
    }
}
