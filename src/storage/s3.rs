//! Amazon S3 object store backed by `aws-sdk-s3`
//!
//! Public blockchain datasets are usually published in requester-pays
//! buckets, so the requester-pays header can be switched on per store.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::RequestPayer;

use super::{
    ListPage, ObjectEntry, ObjectStore, StorageError, StorageResult, dir_prefix, normalize_prefix,
};

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    requester_pays: bool,
}

impl S3ObjectStore {
    /// Wrap an existing S3 client
    pub fn new(client: Client, bucket: impl Into<String>, requester_pays: bool) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            requester_pays,
        }
    }

    /// Build a client from the default AWS credential chain
    pub async fn from_env(
        bucket: impl Into<String>,
        region: Option<String>,
        requester_pays: bool,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), bucket, requester_pays)
    }

    fn request_payer(&self) -> Option<RequestPayer> {
        self.requester_pays.then_some(RequestPayer::Requester)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> StorageResult<ListPage> {
        tracing::debug!("Listing s3://{}/{}", self.bucket, dir_prefix(prefix));

        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(dir_prefix(prefix))
            .delimiter("/")
            .set_continuation_token(continuation)
            .set_request_payer(self.request_payer())
            .send()
            .await
            .map_err(|e| StorageError::ListFailed {
                prefix: prefix.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        let prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(normalize_prefix)
            .collect();

        let objects = output
            .contents()
            .iter()
            .filter_map(|o| {
                o.key().map(|key| ObjectEntry {
                    key: key.to_string(),
                    size: o.size().unwrap_or(0).max(0) as u64,
                })
            })
            .collect();

        let next = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            prefixes,
            objects,
            next,
        })
    }

    async fn get_object(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_request_payer(self.request_payer())
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    key: key.to_string(),
                    reason: DisplayErrorContext(&e).to_string(),
                });
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::ReadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(bytes.into_bytes().to_vec()))
    }
}
