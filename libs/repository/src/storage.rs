use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::{response::Response, RepositoryError};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Response<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Response<()>;

    /// Inverse of [`ObjectStore::public_url`] for objects of this store.
    fn path_from_public_url(&self, bucket: &str, url: &str) -> Option<String> {
        let prefix = self.public_url(bucket, "");
        url.strip_prefix(prefix.as_str())
            .map(|path| path.split(['?', '#']).next().unwrap_or_default())
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    }
}

/// S3 compatible bucket storage (Supabase storage, R2, ...).
#[derive(Clone, Debug)]
pub struct S3Storage {
    s3: aws_sdk_s3::Client,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(s3: aws_sdk_s3::Client, public_base_url: &str) -> Self {
        Self {
            s3,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Response<()> {
        self.s3
            .put_object()
            .bucket(bucket)
            .content_type(content_type)
            .key(path)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                RepositoryError::Storage(format!("failed to put object: {e}"))
            })?;

        info!(task = "upload object", bucket, path);

        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Response<()> {
        for path in paths {
            self.s3
                .delete_object()
                .bucket(bucket)
                .key(path)
                .send()
                .await
                .map_err(|e| {
                    RepositoryError::Storage(format!(
                        "failed to delete object {path}: {e}"
                    ))
                })?;

            info!(task = "remove object", bucket, path = path.as_str());
        }

        Ok(())
    }
}
