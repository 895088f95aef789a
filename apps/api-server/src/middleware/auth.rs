//! Authentication extractors.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header};
use std::future::{Ready, ready};
use std::sync::Arc;

use folio_core::ports::{AuthError, TokenClaims, TokenService};
use folio_shared::ErrorResponse;

/// Authenticated caller, taken from a `Bearer` token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: uuid::Uuid,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
        }
    }
}

/// Error type for authentication failures.
#[derive(Debug)]
pub struct AuthenticationError(pub AuthError);

impl std::fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl actix_web::ResponseError for AuthenticationError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        let error = match &self.0 {
            AuthError::TokenExpired => ErrorResponse::new(401, "Token Expired")
                .with_detail("Your authentication token has expired. Please login again."),
            AuthError::InvalidToken(msg) => {
                ErrorResponse::new(401, "Invalid Token").with_detail(msg.clone())
            }
            AuthError::MissingAuth => ErrorResponse::new(401, "Authentication Required")
                .with_detail("Please provide a valid Bearer token in the Authorization header."),
        };

        actix_web::HttpResponse::build(self.status_code()).json(error)
    }
}

fn authenticate(req: &HttpRequest) -> Result<Identity, AuthenticationError> {
    let Some(token_service) = req.app_data::<actix_web::web::Data<Arc<dyn TokenService>>>()
    else {
        tracing::debug!("no TokenService registered, rejecting authenticated route");
        return Err(AuthenticationError(AuthError::InvalidToken(
            "Authentication is not enabled on this server".to_string(),
        )));
    };

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthenticationError(AuthError::MissingAuth))?;

    let auth_str = auth_header.to_str().map_err(|_| {
        AuthenticationError(AuthError::InvalidToken(
            "Invalid authorization header".to_string(),
        ))
    })?;

    let token = auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        AuthenticationError(AuthError::InvalidToken(
            "Expected Bearer token".to_string(),
        ))
    })?;

    token_service
        .validate_token(token)
        .map(Identity::from)
        .map_err(AuthenticationError)
}

impl FromRequest for Identity {
    type Error = AuthenticationError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

/// Optional identity extractor - doesn't fail if not authenticated.
pub struct OptionalIdentity(pub Option<Identity>);

impl FromRequest for OptionalIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(OptionalIdentity(authenticate(req).ok())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use actix_web::web;
    use uuid::Uuid;

    struct FixedTokens(Uuid);

    impl TokenService for FixedTokens {
        fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
            if token == "good" {
                Ok(TokenClaims {
                    user_id: self.0,
                    username: "alice".to_string(),
                    exp: i64::MAX,
                })
            } else {
                Err(AuthError::InvalidToken("bad token".to_string()))
            }
        }
    }

    fn tokens(user_id: Uuid) -> web::Data<Arc<dyn TokenService>> {
        web::Data::new(Arc::new(FixedTokens(user_id)) as Arc<dyn TokenService>)
    }

    #[test]
    fn test_bearer_token_resolves_identity() {
        let user_id = Uuid::new_v4();
        let req = TestRequest::default()
            .app_data(tokens(user_id))
            .insert_header((header::AUTHORIZATION, "Bearer good"))
            .to_http_request();

        let identity = authenticate(&req).unwrap();

        assert_eq!(identity.user_id, user_id);
    }

    #[test]
    fn test_missing_header_rejected() {
        let req = TestRequest::default()
            .app_data(tokens(Uuid::new_v4()))
            .to_http_request();

        let err = authenticate(&req).unwrap_err();

        assert!(matches!(err.0, AuthError::MissingAuth));
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let req = TestRequest::default()
            .app_data(tokens(Uuid::new_v4()))
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();

        assert!(matches!(
            authenticate(&req).unwrap_err().0,
            AuthError::InvalidToken(_)
        ));
    }

    #[test]
    fn test_no_token_service_rejects() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer good"))
            .to_http_request();

        assert!(authenticate(&req).is_err());
    }
}
