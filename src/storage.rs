//! Object storage access.
//!
//! The pipeline only ever needs three things from S3: does an object exist,
//! fetch it to a file, fetch it as text. `ObjectStore` captures that so the
//! pipeline can be driven against a local fake in tests.
//!
//! `S3ObjectStore` wraps the async AWS SDK behind an owned tokio runtime and
//! exposes a blocking API; the harness is synchronous end to end.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{HarnessError, Result};
use crate::target::S3Location;

/// Blocking access to objects by bucket/key.
pub trait ObjectStore {
    /// Whether the object exists.
    fn lookup(&self, location: &S3Location) -> Result<bool>;

    /// Download the object to `dest`, replacing any existing file.
    ///
    /// A missing object is `HarnessError::ObjectNotFound`.
    fn download(&self, location: &S3Location, dest: &Path) -> Result<()>;

    /// Fetch the object as UTF-8 text.
    fn get_string(&self, location: &S3Location) -> Result<String>;
}

/// Connection overrides for the S3 client.
#[derive(Debug, Clone, Default)]
pub struct S3StoreConfig {
    /// Region override; otherwise the standard AWS provider chain decides.
    pub region: Option<String>,
    /// Custom endpoint (e.g. a local S3-compatible server).
    pub endpoint: Option<String>,
    /// Force path-style addressing; implied by a custom endpoint.
    pub force_path_style: bool,
}

/// S3-backed object store.
pub struct S3ObjectStore {
    client: Client,
    runtime: tokio::runtime::Runtime,
}

impl S3ObjectStore {
    /// Build a client from the standard AWS environment plus overrides.
    pub fn new(config: &S3StoreConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| HarnessError::storage(format!("failed to start runtime: {}", e)))?;

        let shared_config = runtime.block_on(async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = &config.region {
                loader = loader.region(Region::new(region.clone()));
            }
            if let Some(endpoint) = &config.endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            loader.load().await
        });

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style || config.endpoint.is_some() {
            s3_builder = s3_builder.force_path_style(true);
        }
        debug!(
            "S3 client configured (region={:?}, endpoint={:?})",
            config.region, config.endpoint
        );

        Ok(Self {
            client: Client::from_conf(s3_builder.build()),
            runtime,
        })
    }
}

impl ObjectStore for S3ObjectStore {
    fn lookup(&self, location: &S3Location) -> Result<bool> {
        let client = self.client.clone();
        self.runtime.block_on(async {
            let result = client
                .head_object()
                .bucket(&location.bucket)
                .key(&location.key)
                .send()
                .await;
            match result {
                Ok(_) => Ok(true),
                Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
                Err(err) => Err(HarnessError::storage(format!(
                    "lookup of {} failed: {}",
                    location, err
                ))),
            }
        })
    }

    fn download(&self, location: &S3Location, dest: &Path) -> Result<()> {
        info!("Downloading {} to {}", location, dest.display());
        let client = self.client.clone();
        self.runtime.block_on(async {
            let output = match client
                .get_object()
                .bucket(&location.bucket)
                .key(&location.key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => {
                    return Err(HarnessError::ObjectNotFound {
                        url: location.to_string(),
                    });
                }
                Err(err) => {
                    return Err(HarnessError::storage(format!(
                        "download of {} failed: {}",
                        location, err
                    )));
                }
            };

            let mut file = tokio::fs::File::create(dest).await?;
            let mut body = output.body.into_async_read();
            let bytes = tokio::io::copy(&mut body, &mut file).await?;
            file.flush().await?;
            debug!("Wrote {} bytes to {}", bytes, dest.display());
            Ok(())
        })
    }

    fn get_string(&self, location: &S3Location) -> Result<String> {
        let client = self.client.clone();
        let bytes = self.runtime.block_on(async {
            let output = match client
                .get_object()
                .bucket(&location.bucket)
                .key(&location.key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => {
                    return Err(HarnessError::ObjectNotFound {
                        url: location.to_string(),
                    });
                }
                Err(err) => {
                    return Err(HarnessError::storage(format!(
                        "read of {} failed: {}",
                        location, err
                    )));
                }
            };
            output
                .body
                .collect()
                .await
                .map(|data| data.into_bytes())
                .map_err(|e| HarnessError::storage(format!("read of {} failed: {}", location, e)))
        })?;

        String::from_utf8(bytes.to_vec())
            .map_err(|e| HarnessError::storage(format!("{} is not UTF-8: {}", location, e)))
    }
}
