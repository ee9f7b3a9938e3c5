//! URL targets: local paths and S3 objects.
//!
//! The acceptance config names its inputs and outputs as URLs. Local paths
//! (bare or `file://`) and S3 URLs (`s3://`, `s3n://`, `s3a://`) are
//! supported; anything else is rejected up front.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use url::Url;

use crate::error::{HarnessError, Result};
use crate::storage::ObjectStore;

const S3_SCHEMES: &[&str] = &["s3", "s3n", "s3a"];

/// A bucket/key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse an `s3://bucket/key` style URL.
    pub fn parse(raw: &str) -> Result<Self> {
        match Target::parse(raw)? {
            Target::S3(location) => Ok(location),
            Target::Local(_) => Err(HarnessError::url(raw, "expected an S3 URL")),
        }
    }

    /// Location of `name` under this location treated as a directory.
    pub fn child(&self, name: &str) -> Self {
        let key = if self.key.is_empty() {
            name.trim_start_matches('/').to_string()
        } else {
            url_path_join(&self.key, &[name])
        };
        Self::new(self.bucket.clone(), key)
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Where a URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Local(PathBuf),
    S3(S3Location),
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HarnessError::url(raw, "URL is empty"));
        }
        if !trimmed.contains("://") {
            return Ok(Self::Local(PathBuf::from(trimmed)));
        }

        let parsed = Url::parse(trimmed).map_err(|e| HarnessError::url(raw, e.to_string()))?;
        match parsed.scheme() {
            "file" => parsed
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| HarnessError::url(raw, "not a valid file path")),
            scheme if S3_SCHEMES.contains(&scheme) => {
                let bucket = parsed
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| HarnessError::url(raw, "missing bucket"))?;
                // `Url::path` is percent-encoded; the object key is the raw
                // text after the bucket.
                let key = trimmed
                    .split_once("://")
                    .and_then(|(_, rest)| rest.split_once('/'))
                    .map_or("", |(_, key)| key.trim_start_matches('/'));
                Ok(Self::S3(S3Location::new(bucket, key)))
            }
            other => Err(HarnessError::url(
                raw,
                format!("unsupported scheme '{}'", other),
            )),
        }
    }

    /// Read the whole target as UTF-8 text.
    pub fn read_to_string(&self, store: &dyn ObjectStore) -> Result<String> {
        match self {
            Self::Local(path) => Ok(fs::read_to_string(path)?),
            Self::S3(location) => store.get_string(location),
        }
    }
}

/// Join path segments onto a URL or path.
///
/// Exactly one `/` separates each segment; the scheme and host of `base`
/// are preserved. Empty segments are skipped.
pub fn url_path_join(base: &str, parts: &[&str]) -> String {
    let mut joined = base.trim_end_matches('/').to_string();
    if joined.ends_with(':') {
        // `s3://` style bases collapse to the scheme; put the slashes back.
        joined.push_str("//");
    }
    for part in parts {
        let part = part.trim_matches('/');
        if part.is_empty() {
            continue;
        }
        if !joined.is_empty() && !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(part);
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_s3_url() {
        assert_eq!(
            url_path_join("s3://bucket/out/", &["ident"]),
            "s3://bucket/out/ident"
        );
        assert_eq!(
            url_path_join("s3://bucket/out", &["ident", "intermediate"]),
            "s3://bucket/out/ident/intermediate"
        );
    }

    #[test]
    fn test_join_skips_empty_segments() {
        assert_eq!(url_path_join("/tmp/a", &["", "/b/"]), "/tmp/a/b");
    }

    #[test]
    fn test_parse_local_variants() {
        assert_eq!(
            Target::parse("/etc/creds.json").unwrap(),
            Target::Local(PathBuf::from("/etc/creds.json"))
        );
        assert_eq!(
            Target::parse("file:///etc/creds.json").unwrap(),
            Target::Local(PathBuf::from("/etc/creds.json"))
        );
    }

    #[test]
    fn test_parse_s3() {
        let target = Target::parse("s3://my-bucket/path/to/creds.json").unwrap();
        assert_eq!(
            target,
            Target::S3(S3Location::new("my-bucket", "path/to/creds.json"))
        );
        assert!(matches!(
            Target::parse("s3n://legacy/key").unwrap(),
            Target::S3(_)
        ));
    }

    #[test]
    fn test_parse_s3_key_kept_as_written() {
        let location = S3Location::parse("s3://bucket/my output/Ünïcode file.sql").unwrap();
        assert_eq!(location.bucket, "bucket");
        assert_eq!(location.key, "my output/Ünïcode file.sql");
        assert_eq!(
            location.to_string(),
            "s3://bucket/my output/Ünïcode file.sql"
        );

        let percent = S3Location::parse("s3://bucket/a%20b").unwrap();
        assert_eq!(percent.key, "a%20b");
        assert_eq!(S3Location::parse("s3://bucket").unwrap().key, "");
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let err = Target::parse("hdfs://namenode/path").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'hdfs'"));
        assert!(Target::parse("   ").is_err());
    }

    #[test]
    fn test_location_child_and_display() {
        let root = S3Location::parse("s3://bucket/out/ident").unwrap();
        let child = root.child("file.sql");
        assert_eq!(child.key, "out/ident/file.sql");
        assert_eq!(child.to_string(), "s3://bucket/out/ident/file.sql");

        let bare = S3Location::new("bucket", "");
        assert_eq!(bare.child("x.zip").key, "x.zip");
    }
}
