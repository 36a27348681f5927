use super::{ObjectStore, ObjectUpload, StorageError, public_object_url};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::Region,
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
};
use bytes::{Bytes, BytesMut};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Size of each part once an upload outgrows a single request. S3 requires at least 5 MiB for
/// every part but the last.
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// S3 (or S3-compatible) implementation of [`ObjectStore`].
///
/// Objects smaller than [`PART_SIZE`] are written with a single `PutObject`. Larger ones go through
/// a multipart upload, so at most one part is held in memory per upload.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
    public_base_url: Option<Url>,
    part_size: usize,
}

impl S3Store {
    pub async fn new(config: &StorageConfig) -> Self {
        let loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        // Static keys win over the default provider chain (env, profile, instance metadata)
        let sdk_config = if let (Some(access_key), Some(secret_key)) = (&config.access_key_id, &config.secret_access_key) {
            let credentials = Credentials::new(access_key, secret_key, None, None, "docrelay-config");
            loader.credentials_provider(credentials).load().await
        } else {
            loader.load().await
        };

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            info!("Using custom S3 endpoint {}", endpoint);
            // S3-compatible stores generally only support path-style addressing
            builder = builder.endpoint_url(endpoint.as_str()).force_path_style(true);
        }

        info!(bucket = %config.bucket, region = %config.region, "Created S3 client");

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            public_base_url: config.public_base_url.clone(),
            part_size: PART_SIZE,
        }
    }

    #[cfg(test)]
    fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn begin_upload(&self, key: &str, content_type: Option<&str>) -> Result<Box<dyn ObjectUpload>, StorageError> {
        Ok(Box::new(S3Upload {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key: key.to_string(),
            content_type: content_type.map(str::to_string),
            part_size: self.part_size,
            buffer: BytesMut::new(),
            upload_id: None,
            parts: Vec::new(),
        }))
    }

    fn public_url(&self, key: &str) -> Result<Url, StorageError> {
        public_object_url(&self.bucket, &self.region, self.public_base_url.as_ref(), key)
    }
}

struct S3Upload {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    part_size: usize,
    buffer: BytesMut,
    /// Set once the object no longer fits in a single request
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
}

impl S3Upload {
    fn failed(&self, operation: &str, err: impl std::error::Error) -> StorageError {
        let message = DisplayErrorContext(&err).to_string();
        tracing::error!(key = %self.key, operation, error = %message, "S3 upload failed");
        StorageError::Upload {
            key: self.key.clone(),
            message,
        }
    }

    async fn upload_id(&mut self) -> Result<String, StorageError> {
        if let Some(upload_id) = &self.upload_id {
            return Ok(upload_id.clone());
        }

        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .set_content_type(self.content_type.clone())
            .send()
            .await
            .map_err(|e| self.failed("CreateMultipartUpload", e))?;

        let upload_id = output.upload_id().map(str::to_string).ok_or_else(|| StorageError::Upload {
            key: self.key.clone(),
            message: "CreateMultipartUpload returned no upload id".to_string(),
        })?;

        debug!(upload_id = %upload_id, "Started multipart upload");
        self.upload_id = Some(upload_id.clone());
        Ok(upload_id)
    }

    async fn upload_part(&mut self, body: Bytes) -> Result<(), StorageError> {
        let upload_id = self.upload_id().await?;
        let part_number = i32::try_from(self.parts.len() + 1).map_err(|_| StorageError::Upload {
            key: self.key.clone(),
            message: "too many parts".to_string(),
        })?;
        let size = body.len();

        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| self.failed("UploadPart", e))?;

        debug!(part_number, size, "Uploaded part");
        self.parts.push(
            CompletedPart::builder()
                .set_e_tag(output.e_tag().map(str::to_string))
                .part_number(part_number)
                .build(),
        );
        Ok(())
    }
}

#[async_trait]
impl ObjectUpload for S3Upload {
    async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        self.buffer.extend_from_slice(&chunk);
        while self.buffer.len() >= self.part_size {
            let part = self.buffer.split_to(self.part_size).freeze();
            self.upload_part(part).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %self.key, parts = self.parts.len()))]
    async fn finish(&mut self) -> Result<(), StorageError> {
        let Some(upload_id) = self.upload_id.clone() else {
            let body = self.buffer.split().freeze();
            debug!(size = body.len(), "Uploading object to S3");

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .set_content_type(self.content_type.clone())
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| self.failed("PutObject", e))?;

            debug!("Uploaded object to S3");
            return Ok(());
        };

        if !self.buffer.is_empty() {
            let last = self.buffer.split().freeze();
            self.upload_part(last).await?;
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(std::mem::take(&mut self.parts)))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| self.failed("CompleteMultipartUpload", e))?;

        self.upload_id = None;
        debug!("Completed multipart upload");
        Ok(())
    }

    async fn abort(&mut self) {
        self.buffer.clear();
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };

        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .send()
            .await
        {
            warn!(key = %self.key, upload_id = %upload_id, error = %DisplayErrorContext(&e), "Failed to abort multipart upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_BUCKET, TEST_REGION, install_crypto_provider};
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "uploads/abc-report.pdf";
    const OBJECT_PATH: &str = "/test-bucket/uploads/abc-report.pdf";

    async fn store_for(server: &MockServer) -> S3Store {
        install_crypto_provider();
        let config = StorageConfig {
            bucket: TEST_BUCKET.to_string(),
            region: TEST_REGION.to_string(),
            access_key_id: Some("AKIATEST".to_string()),
            secret_access_key: Some("secret".to_string()),
            endpoint: Some(server.uri().parse().unwrap()),
            public_base_url: None,
        };
        S3Store::new(&config).await
    }

    fn xml(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "application/xml")
    }

    #[tokio::test]
    async fn test_small_object_is_put_with_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(OBJECT_PATH))
            .and(header("content-type", "application/pdf"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag-1\""))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let mut upload = store.begin_upload(KEY, Some("application/pdf")).await.unwrap();
        upload.write(Bytes::from_static(b"%PDF-1.4")).await.unwrap();
        upload.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_put_maps_to_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(OBJECT_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_raw(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                "application/xml",
            ))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let mut upload = store.begin_upload(KEY, None).await.unwrap();
        upload.write(Bytes::from_static(b"data")).await.unwrap();
        let err = upload.finish().await.unwrap_err();

        match err {
            StorageError::Upload { key, message } => {
                assert_eq!(key, KEY);
                assert!(!message.is_empty());
            }
            other => panic!("expected upload error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_large_object_goes_through_multipart_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OBJECT_PATH))
            .and(query_param_is_missing("uploadId"))
            .respond_with(xml(
                "<InitiateMultipartUploadResult><Bucket>test-bucket</Bucket><Key>uploads/abc-report.pdf</Key><UploadId>upload-1</UploadId></InitiateMultipartUploadResult>",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(OBJECT_PATH))
            .and(query_param("uploadId", "upload-1"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"part\""))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(OBJECT_PATH))
            .and(query_param("uploadId", "upload-1"))
            .respond_with(xml(
                "<CompleteMultipartUploadResult><Bucket>test-bucket</Bucket><Key>uploads/abc-report.pdf</Key><ETag>\"done\"</ETag></CompleteMultipartUploadResult>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await.with_part_size(4);
        let mut upload = store.begin_upload(KEY, Some("application/pdf")).await.unwrap();
        // 10 bytes in parts of 4: two full parts while writing, the remainder on finish
        upload.write(Bytes::from_static(b"012345")).await.unwrap();
        upload.write(Bytes::from_static(b"6789")).await.unwrap();
        upload.finish().await.unwrap();

        let part_numbers: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.method.as_str() == "PUT")
            .filter_map(|request| {
                request
                    .url
                    .query_pairs()
                    .find(|(name, _)| name == "partNumber")
                    .map(|(_, value)| value.into_owned())
            })
            .collect();
        assert_eq!(part_numbers, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_failed_part_can_be_aborted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OBJECT_PATH))
            .respond_with(xml(
                "<InitiateMultipartUploadResult><Bucket>test-bucket</Bucket><Key>uploads/abc-report.pdf</Key><UploadId>upload-2</UploadId></InitiateMultipartUploadResult>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(OBJECT_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_raw(
                "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                "application/xml",
            ))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(OBJECT_PATH))
            .and(query_param("uploadId", "upload-2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await.with_part_size(4);
        let mut upload = store.begin_upload(KEY, None).await.unwrap();

        let err = upload.write(Bytes::from_static(b"01234567")).await.unwrap_err();
        assert!(matches!(err, StorageError::Upload { .. }));

        upload.abort().await;
    }
}
