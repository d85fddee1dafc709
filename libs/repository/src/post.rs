use std::sync::Arc;

use async_trait::async_trait;
use entity::prelude::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Method, StatusCode,
};

use crate::{
    auth::SupabaseAuth,
    client::Client,
    response::{IntoResponse, Response},
    RepositoryError,
};

const POSTS_PATH: &str = "rest/v1/posts";

/// Asks PostgREST for one JSON object instead of an array. Zero or several
/// matching rows answer 406.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub filter: CategoryFilter,
    pub order: SortOrder,
}

impl PostQuery {
    pub fn new(filter: CategoryFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// PostgREST query string pairs: exact category match, ordered by
    /// creation time.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let direction = match self.order {
            SortOrder::NewestFirst => "desc",
            SortOrder::OldestFirst => "asc",
        };

        let mut params = vec![
            ("select", "*".to_string()),
            ("order", format!("created_at.{direction},id.{direction}")),
        ];
        if let Some(category) = self.filter.category() {
            params.push(("category", format!("eq.{category}")));
        }

        params
    }
}

#[async_trait]
pub trait RowStore: Send + Sync {
    async fn query(&self, query: PostQuery) -> Response<Vec<PostEntity>>;

    /// Exactly one row; zero or several matches are [`RepositoryError::NotFound`].
    async fn get_by_id(&self, id: PostId) -> Response<PostEntity>;

    async fn insert(&self, post: NewPost) -> Response<PostEntity>;

    async fn delete_by_id(&self, id: PostId) -> Response<()>;
}

/// The `posts` table behind PostgREST.
#[derive(Debug)]
pub struct SupabasePosts {
    client: Client,
    auth: Arc<SupabaseAuth>,
}

impl SupabasePosts {
    pub fn new(client: Client, auth: Arc<SupabaseAuth>) -> Self {
        Self { client, auth }
    }

    async fn rows(
        &self,
        method: Method,
        params: &[(&str, String)],
        body: Option<&NewPost>,
        task: &str,
    ) -> Response<Vec<PostEntity>> {
        let bearer = self.auth.bearer().await;
        let mut request = self
            .client
            .request(method, POSTS_PATH, &bearer)
            .query(params)
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(&[body]);
        }

        let text = self.client.send(request, task).await?;

        serde_json::from_str::<Vec<PostEntity>>(&text)
            .into_response("failed to parse posts")
    }
}

#[async_trait]
impl RowStore for SupabasePosts {
    async fn query(&self, query: PostQuery) -> Response<Vec<PostEntity>> {
        self.rows(Method::GET, &query.params(), None, "failed to query posts")
            .await
    }

    async fn get_by_id(&self, id: PostId) -> Response<PostEntity> {
        let params = [("select", "*".to_string()), ("id", format!("eq.{id}"))];
        let mut accept = HeaderMap::new();
        accept.insert(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT));

        let bearer = self.auth.bearer().await;
        let request = self
            .client
            .request(Method::GET, POSTS_PATH, &bearer)
            .query(&params)
            .headers(accept);

        single_object(self.client.send(request, "failed to get post").await)
    }

    async fn insert(&self, post: NewPost) -> Response<PostEntity> {
        let rows = self
            .rows(Method::POST, &[], Some(&post), "failed to insert post")
            .await?;

        rows.into_iter().next().ok_or_else(|| {
            RepositoryError::Unexpected("insert returned no row".to_string())
        })
    }

    async fn delete_by_id(&self, id: PostId) -> Response<()> {
        let params = [("id", format!("eq.{id}"))];
        let rows = self
            .rows(Method::DELETE, &params, None, "failed to delete post")
            .await?;

        // Row level security turns a forbidden delete into zero rows.
        single(rows).map(|_| ())
    }
}

fn single_object(response: Response<String>) -> Response<PostEntity> {
    match response {
        Ok(text) => serde_json::from_str::<PostEntity>(&text)
            .into_response("failed to parse post"),
        Err(RepositoryError::Status { status, .. })
            if status == StatusCode::NOT_ACCEPTABLE.as_u16() =>
        {
            Err(RepositoryError::NotFound)
        }
        Err(e) => Err(e),
    }
}

fn single(rows: Vec<PostEntity>) -> Response<PostEntity> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(post), None) => Ok(post),
        _ => Err(RepositoryError::NotFound),
    }
}
