use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method, RequestBuilder, StatusCode,
};

use crate::{
    response::{error_message, IntoResponse, Response},
    RepositoryError,
};

#[derive(Clone, Debug)]
pub struct Client {
    base_url: String,
    anon_key: String,
    headers: HeaderMap,
    http: reqwest::Client,
}

impl Client {
    pub fn new(
        base_url: &str,
        anon_key: &str,
        timeout: Duration,
    ) -> Response<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("apikey", HeaderValue::from_str(anon_key)?);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .into_response("failed to build http client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            headers,
            http,
        })
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn request(
        &self,
        method: Method,
        path: &str,
        bearer: &str,
    ) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.base_url, path))
            .headers(self.headers.clone())
            .bearer_auth(bearer)
    }

    /// Sends the request and returns the body of a successful response.
    pub async fn send(
        &self,
        request: RequestBuilder,
        task: &str,
    ) -> Response<String> {
        let response = request.send().await.into_response(task)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .into_response("failed to get text")?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        Ok(text)
    }
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> RepositoryError {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RepositoryError::Auth(message)
        }
        // GoTrue answers bad credentials with 400 invalid_grant.
        StatusCode::BAD_REQUEST if body.contains("invalid_grant") => {
            RepositoryError::Auth(message)
        }
        _ => RepositoryError::Status {
            status: status.as_u16(),
            message,
        },
    }
}
