use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::templates::{ErrorTemplate, Nav};

#[derive(Debug)]
pub enum WebError {
    AuthError(String),
    ClientError(String),
    Conflict(String),
    NotFound(String),
    UpstreamError(String),
    ServerError(String),
}

pub type WebResponse<T> = Result<T, WebError>;

impl WebError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            WebError::AuthError(_) => StatusCode::UNAUTHORIZED,
            WebError::ClientError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WebError::Conflict(_) => StatusCode::CONFLICT,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            WebError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self) -> String {
        match self {
            WebError::AuthError(message)
            | WebError::ClientError(message)
            | WebError::Conflict(message)
            | WebError::NotFound(message)
            | WebError::UpstreamError(message)
            | WebError::ServerError(message) => message,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        let template = ErrorTemplate {
            nav: Nav::default(),
            status: status.as_u16(),
            message: self.message(),
        };

        (status, render(template)).into_response()
    }
}

impl From<blog::Error> for WebError {
    fn from(e: blog::Error) -> Self {
        let message = e.to_string();
        match e {
            blog::Error::Auth(_) | blog::Error::NotPrivileged => {
                WebError::AuthError(message)
            }
            blog::Error::Validation(_) => WebError::ClientError(message),
            blog::Error::Busy | blog::Error::NoPendingDelete => {
                WebError::Conflict(message)
            }
            blog::Error::NotFound => WebError::NotFound(message),
            blog::Error::Network(_) | blog::Error::Storage(_) => {
                WebError::UpstreamError(message)
            }
        }
    }
}

/// Renders a page; a template failure becomes a plain 500.
pub fn render<T: Template>(template: T) -> Response {
    match template.render() {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            error!(task = "render template", error = e.to_string());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Template error: {e}"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod test {
    use blog::ValidationError;

    use super::*;

    #[test]
    fn test_blog_errors_map_to_status() {
        let cases = [
            (blog::Error::NotFound, StatusCode::NOT_FOUND),
            (blog::Error::Busy, StatusCode::CONFLICT),
            (blog::Error::NotPrivileged, StatusCode::UNAUTHORIZED),
            (
                blog::Error::Validation(ValidationError::EmptyTitle),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                blog::Error::Storage("bucket".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(WebError::from(error).into_response().status(), status);
        }
    }
}
