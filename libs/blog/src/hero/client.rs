use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};

use super::{
    response::{ArtObject, QuoteResponse, SearchResponse},
    ArtSource, HeroError, Quote, QuoteSource,
};

const USER_AGENT: &str = "Sanat-Atilim-Kutuphane";

/// Plain JSON GET client shared by the hero sources.
#[derive(Clone, Debug)]
struct Client {
    base_url: String,
    headers: HeaderMap,
    http: reqwest::Client,
}

impl Client {
    fn new(base_url: &str, timeout: Duration) -> Result<Self, HeroError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeroError::Request {
                message: "failed to build client".to_string(),
                source: e,
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            http,
        })
    }

    async fn get<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, HeroError> {
        let url = if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        };

        let response = self
            .http
            .get(url)
            .headers(self.headers.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| HeroError::Request {
                message: format!("failed to send {path}"),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HeroError::Status {
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| HeroError::Request {
            message: format!("failed to decode {path}"),
            source: e,
        })
    }
}

/// The Metropolitan Museum collection API.
#[derive(Clone, Debug)]
pub struct MetMuseum {
    client: Client,
}

impl MetMuseum {
    pub const BASE_URL: &'static str =
        "https://collectionapi.metmuseum.org/public/collection/v1";

    /// European Paintings.
    pub const DEPARTMENT_ID: u32 = 11;

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HeroError> {
        Ok(Self {
            client: Client::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl ArtSource for MetMuseum {
    async fn search(&self) -> Result<Vec<u64>, HeroError> {
        let response: SearchResponse = self
            .client
            .get(
                "search",
                &[
                    ("hasImages", "true".to_string()),
                    ("departmentId", Self::DEPARTMENT_ID.to_string()),
                    ("q", "painting".to_string()),
                ],
            )
            .await?;

        Ok(response.object_ids.unwrap_or_default())
    }

    async fn object(&self, id: u64) -> Result<ArtObject, HeroError> {
        self.client
            .get(&format!("objects/{id}"), &[] as &[(&str, &str)])
            .await
    }
}

/// quotable.io random quote endpoint.
#[derive(Clone, Debug)]
pub struct Quotable {
    client: Client,
}

impl Quotable {
    pub const URL: &'static str = "https://api.quotable.io/random";

    pub const TAGS: &'static str = "art|philosophy|wisdom";

    pub fn new(url: &str, timeout: Duration) -> Result<Self, HeroError> {
        Ok(Self {
            client: Client::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl QuoteSource for Quotable {
    async fn random(&self) -> Result<Quote, HeroError> {
        let response: QuoteResponse =
            self.client.get("", &[("tags", Self::TAGS)]).await?;

        Ok(Quote {
            content: response.content,
            author: response.author,
        })
    }
}
