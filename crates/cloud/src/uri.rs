use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::UriError;

const SCHEME: &str = "gs://";

/// A bucket plus object path, written as `gs://bucket/path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub path: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// Last path segment, i.e. the object's file name.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Same path in another bucket.
    pub fn in_bucket(&self, bucket: impl Into<String>) -> Self {
        Self::new(bucket, self.path.clone())
    }

    pub fn uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.path)
    }
}

impl FromStr for ObjectLocation {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_gcs_uri(s)
    }
}

/// Split a `gs://bucket/path` URI into its bucket and object path.
///
/// ```rust
/// let loc = cloud::parse_gcs_uri("gs://proc/2024/a_page_1.png").unwrap();
/// assert_eq!(loc.bucket, "proc");
/// assert_eq!(loc.path, "2024/a_page_1.png");
/// assert_eq!(loc.file_name(), "a_page_1.png");
/// ```
pub fn parse_gcs_uri(uri: &str) -> Result<ObjectLocation, UriError> {
    let rest = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| UriError::Scheme(uri.to_string()))?;
    let (bucket, path) = rest
        .split_once('/')
        .ok_or_else(|| UriError::MissingPath(uri.to_string()))?;
    if bucket.is_empty() {
        return Err(UriError::MissingBucket(uri.to_string()));
    }
    if path.is_empty() || path.ends_with('/') {
        return Err(UriError::MissingPath(uri.to_string()));
    }
    Ok(ObjectLocation::new(bucket, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_paths() {
        let loc = parse_gcs_uri("gs://in/a/b/c.tif").unwrap();
        assert_eq!(loc, ObjectLocation::new("in", "a/b/c.tif"));
        assert_eq!(loc.file_name(), "c.tif");
        assert_eq!(loc.to_string(), "gs://in/a/b/c.tif");
    }

    #[test]
    fn rejects_malformed_uris() {
        assert!(matches!(parse_gcs_uri("s3://in/a.tif"), Err(UriError::Scheme(_))));
        assert!(matches!(parse_gcs_uri("gs://in"), Err(UriError::MissingPath(_))));
        assert!(matches!(parse_gcs_uri("gs://in/"), Err(UriError::MissingPath(_))));
        assert!(matches!(parse_gcs_uri("gs:///a.tif"), Err(UriError::MissingBucket(_))));
        assert!(matches!(parse_gcs_uri("gs://in/dir/"), Err(UriError::MissingPath(_))));
    }

    #[test]
    fn in_bucket_keeps_relative_path() {
        let loc: ObjectLocation = "gs://in/2024/01/a.tif".parse().unwrap();
        assert_eq!(loc.in_bucket("archive").uri(), "gs://archive/2024/01/a.tif");
    }
}
