//! Location translation between the addressable forms of a stored file
//!
//! A document lives at three addresses:
//! - the storage path on the target filesystem (`/data/cnpc_east/W10/W100/a.pdf`)
//! - the published path recorded in target metadata (`ftp://host/files/cnpc_east/W10/W100/a.pdf`)
//! - the raw source location, turned into a fetch URL by a resolver
//!
//! Every conversion here is pure and fallible. A missing prefix yields
//! `SyncError::Transform`, never a truncated path.

use crate::error::{SyncError, SyncResult};
use crate::WELL_BUCKET_CHARS;

/// Strip `prefix` from `path`, requiring the match to end on a path boundary.
///
/// `/data` matches `/data/x` and `/data` but not `/database/x`.
pub fn strip_anchored<'a>(path: &'a str, prefix: &str, boundary: &[char]) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || prefix.ends_with(boundary) || rest.starts_with(boundary) {
        Some(rest)
    } else {
        None
    }
}

/// Last path element of a location, accepting either separator style.
///
/// For URL-shaped locations the query and fragment are not part of the name.
pub fn base_name(location: &str) -> SyncResult<&str> {
    let path = if location.contains("://") {
        location
            .split(['?', '#'])
            .next()
            .unwrap_or(location)
    } else {
        location
    };

    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| SyncError::transform(format!("no file name in location '{}'", location)))
}

/// Converts between target storage paths and published paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    root: String,
    publish_prefix: String,
    separator: char,
}

impl PathTranslator {
    /// Create a translator for the given target root and publish prefix.
    ///
    /// The publish prefix is aligned with the root: a trailing separator on one
    /// implies a trailing `/` on the other, so that both directions concatenate
    /// the same remainder.
    pub fn new(root: impl Into<String>, publish_prefix: impl Into<String>, separator: char) -> Self {
        let root = root.into();
        let mut publish_prefix = publish_prefix.into();

        if root.ends_with(separator) {
            if !publish_prefix.ends_with('/') {
                publish_prefix.push('/');
            }
        } else {
            let trimmed = publish_prefix.trim_end_matches('/').len();
            publish_prefix.truncate(trimmed);
        }

        Self {
            root,
            publish_prefix,
            separator,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn publish_prefix(&self) -> &str {
        &self.publish_prefix
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// `storagePath -> publishedPath`
    pub fn to_published(&self, storage_path: &str) -> SyncResult<String> {
        let rest = strip_anchored(storage_path, &self.root, &[self.separator]).ok_or_else(|| {
            SyncError::transform(format!(
                "storage path '{}' is outside target root '{}'",
                storage_path, self.root
            ))
        })?;

        let mut published = String::with_capacity(self.publish_prefix.len() + rest.len());
        published.push_str(&self.publish_prefix);
        published.extend(
            rest.chars()
                .map(|c| if c == self.separator { '/' } else { c }),
        );
        Ok(published)
    }

    /// `publishedPath -> storagePath`
    pub fn to_storage(&self, published_path: &str) -> SyncResult<String> {
        let rest = strip_anchored(published_path, &self.publish_prefix, &['/']).ok_or_else(|| {
            SyncError::transform(format!(
                "published path '{}' does not start with '{}'",
                published_path, self.publish_prefix
            ))
        })?;

        let mut storage = String::with_capacity(self.root.len() + rest.len());
        storage.push_str(&self.root);
        storage.extend(rest.chars().map(|c| if c == '/' { self.separator } else { c }));
        Ok(storage)
    }
}

/// Deterministic placement of materialized files on the target filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: String,
    naming_prefix: String,
    separator: char,
}

impl StorageLayout {
    pub fn new(root: impl Into<String>, naming_prefix: impl Into<String>, separator: char) -> Self {
        Self {
            root: root.into(),
            naming_prefix: naming_prefix.into(),
            separator,
        }
    }

    /// `targetRoot / (namingPrefix + region) / wellId[0:3] / wellId / baseName(sourceLocation)`
    ///
    /// The well bucket is taken by characters, not bytes, so multi-byte well
    /// identifiers never split inside a code point.
    pub fn storage_path(
        &self,
        region_name: &str,
        well_id: &str,
        source_location: &str,
    ) -> SyncResult<String> {
        if well_id.is_empty() {
            return Err(SyncError::transform("empty well id"));
        }
        if well_id.contains(['/', '\\']) || well_id == "." || well_id == ".." {
            return Err(SyncError::transform(format!(
                "well id '{}' is not a valid directory name",
                well_id
            )));
        }

        let bucket: String = well_id.chars().take(WELL_BUCKET_CHARS).collect();
        let file_name = base_name(source_location)?;
        let region_dir = format!("{}{}", self.naming_prefix, region_name);

        let sep = self.separator.to_string();
        let root = self.root.trim_end_matches(self.separator);
        Ok([root, &region_dir, &bucket, well_id, file_name].join(&sep))
    }
}
