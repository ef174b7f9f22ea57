use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rusoto_s3::{DeleteObjectRequest, PutObjectRequest, S3Client, StreamingBody, S3};
use url::{ParseError, Url};

use crate::errors::DirectoryError;

pub mod memory;

pub trait Store: Send + Sync {
    /// Deletes the object at the given path.
    fn delete(&self, path: &str) -> BoxFuture<Result<(), DirectoryError>>;

    /// Gets the public URL for the object at the given path.
    fn get_url(&self, path: &str) -> Result<Url, ParseError>;

    /// Saves the given data at the given path, replacing any existing
    /// object.
    fn save(
        &self,
        path: &str,
        content_type: String,
        raw: Vec<u8>,
    ) -> BoxFuture<Result<(), DirectoryError>>;
}

/// A store that saves its data to an S3 bucket.
pub struct S3Store {
    client: Arc<S3Client>,
    acl: String,
    bucket: String,
    cache_control: String,
    base_url: Url,
}

impl S3Store {
    /// Creates a new instance. `base_url` should include a trailing slash.
    pub fn new(
        client: Arc<S3Client>,
        acl: String,
        bucket: String,
        cache_control: String,
        base_url: Url,
    ) -> Self {
        Self {
            client,
            acl,
            bucket,
            cache_control,
            base_url,
        }
    }

    /// Creates a client from the environment, shared by every bucket.
    pub fn client_from_env() -> Result<Arc<S3Client>, rusoto_core::request::TlsError> {
        use rusoto_core::request::HttpClient;
        use rusoto_core::Region;
        use rusoto_credential::StaticProvider;

        use crate::config::get_variable;

        let access_key = get_variable("S3_ACCESS_KEY");
        let secret_access_key = get_variable("S3_SECRET_ACCESS_KEY");

        let region = Region::Custom {
            name: get_variable("S3_REGION_NAME"),
            endpoint: get_variable("S3_ENDPOINT"),
        };

        Ok(Arc::new(S3Client::new_with(
            HttpClient::new()?,
            StaticProvider::new_minimal(access_key, secret_access_key),
            region,
        )))
    }

    /// Creates a store for the bucket named by `bucket_variable`. Public
    /// URLs are `S3_BASE_URL` followed by the bucket name and the path.
    pub fn from_env(client: Arc<S3Client>, bucket_variable: &str) -> Self {
        use crate::config::get_variable;

        let bucket = get_variable(bucket_variable);
        let acl = get_variable("DIRECTORY_S3_ACL");
        let cache_control = get_variable("DIRECTORY_S3_CACHE_CONTROL");

        let base_url = Url::parse(&get_variable("S3_BASE_URL"))
            .and_then(|url| url.join(&format!("{}/", bucket)))
            .unwrap_or_else(|e| panic!("parse S3_BASE_URL for {}: {}", bucket, e));

        S3Store::new(client, acl, bucket, cache_control, base_url)
    }
}

impl Store for S3Store {
    fn delete(&self, path: &str) -> BoxFuture<Result<(), DirectoryError>> {
        delete(self, path.to_owned()).boxed()
    }

    fn get_url(&self, path: &str) -> Result<Url, ParseError> {
        self.base_url.join(path)
    }

    fn save(
        &self,
        path: &str,
        content_type: String,
        raw: Vec<u8>,
    ) -> BoxFuture<Result<(), DirectoryError>> {
        upload(self, path.to_owned(), content_type, raw).boxed()
    }
}

async fn delete(store: &S3Store, key: String) -> Result<(), DirectoryError> {
    let request = DeleteObjectRequest {
        bucket: store.bucket.clone(),
        key,
        ..Default::default()
    };

    let result = store.client.delete_object(request).await;

    result
        .map(|_| ())
        .map_err(|source| DirectoryError::DeleteFailed { source })
}

async fn upload(
    store: &S3Store,
    key: String,
    content_type: String,
    raw: Vec<u8>,
) -> Result<(), DirectoryError> {
    use std::convert::TryFrom;

    let len = i64::try_from(raw.len()).unwrap_or(i64::MAX);

    let request = PutObjectRequest {
        acl: Some(store.acl.clone()),
        body: Some(StreamingBody::from(raw)),
        bucket: store.bucket.clone(),
        cache_control: Some(store.cache_control.clone()),
        content_length: Some(len),
        content_type: Some(content_type),
        key,
        ..Default::default()
    };

    let result = store.client.put_object(request).await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(DirectoryError::UploadFailed { source: e }),
    }
}

/// Resolves an optional storage path to its public URL.
pub fn public_url(store: &dyn Store, path: Option<&str>) -> Result<Option<Url>, DirectoryError> {
    path.map(|path| store.get_url(path))
        .transpose()
        .map_err(|source| DirectoryError::FailedToGenerateUrl { source })
}
