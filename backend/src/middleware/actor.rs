//! Acting user extraction
//!
//! Requests may name the user on whose behalf they run with an `X-User-Id`
//! header. The id only fills audit columns such as `created_by`; it is not
//! checked against anything.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// User id for audit columns, `None` when the header is absent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Actor(pub Option<i64>);

impl Actor {
    pub fn id(&self) -> Option<i64> {
        self.0
    }

    fn parse(value: Option<&str>) -> Result<Self, AppError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Actor(None)),
            Some(raw) => raw
                .parse::<i64>()
                .map(|id| Actor(Some(id)))
                .map_err(|_| AppError::validation(USER_ID_HEADER, "User id must be an integer")),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(USER_ID_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| {
                AppError::validation(USER_ID_HEADER, "User id header is not valid text")
            })?),
            None => None,
        };
        Actor::parse(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_is_anonymous() {
        assert_eq!(Actor::parse(None).unwrap(), Actor(None));
        assert_eq!(Actor::parse(Some("  ")).unwrap(), Actor(None));
    }

    #[test]
    fn numeric_header_is_parsed() {
        assert_eq!(Actor::parse(Some("42")).unwrap().id(), Some(42));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Actor::parse(Some("alice")).is_err());
    }
}
