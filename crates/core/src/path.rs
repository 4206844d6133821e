//! Materialized path strings.
//!
//! A path is the chain of ancestor ids from the root down to the node itself,
//! each preceded by the delimiter: root `/1`, child `/1/3`, grandchild `/1/3/8`.
//! Ancestor paths are always literal prefixes of descendant paths, bounded by
//! a delimiter. Every containment check in this crate goes through
//! [`PathCodec::is_within`] so `/1/30` is never treated as inside `/1/3`.

use crate::error::CoreError;
use crate::ids::NodeId;

pub const DEFAULT_DELIMITER: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCodec {
    delimiter: char,
}

impl Default for PathCodec {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl PathCodec {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Path of `id` under a parent whose path is `parent_path`.
    /// Roots pass an empty parent path and get `"/<id>"`.
    pub fn build(&self, parent_path: &str, id: NodeId) -> String {
        format!("{parent_path}{}{id}", self.delimiter)
    }

    /// Ids encoded in `path`, root first. Empty segments are skipped, so
    /// `""` and `"/"` both decode to an empty chain.
    pub fn split(&self, path: &str) -> Result<Vec<NodeId>, CoreError> {
        path.split(self.delimiter)
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                segment.parse::<NodeId>().map_err(|_| CoreError::MalformedPath {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })
            })
            .collect()
    }

    /// Strip trailing delimiters so `/1/3/` and `/1/3` select the same subtree.
    pub fn normalize_prefix<'a>(&self, prefix: &'a str) -> &'a str {
        prefix.trim_end_matches(self.delimiter)
    }

    /// Whether `path` is `prefix` itself or lies below it.
    pub fn is_within(&self, path: &str, prefix: &str) -> bool {
        let prefix = self.normalize_prefix(prefix);
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with(self.delimiter),
            None => false,
        }
    }

    /// Replace the leading `old_prefix` of `path` with `new_prefix`.
    /// Returns `None` when `path` is not within `old_prefix`.
    pub fn rebase(&self, path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
        if !self.is_within(path, old_prefix) {
            return None;
        }
        let old_prefix = self.normalize_prefix(old_prefix);
        Some(format!("{new_prefix}{}", &path[old_prefix.len()..]))
    }

    pub fn depth(&self, path: &str) -> usize {
        path.split(self.delimiter).filter(|s| !s.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: i64) -> NodeId {
        NodeId::new(raw).unwrap()
    }

    #[test]
    fn build_root_and_children() {
        let codec = PathCodec::default();
        let root = codec.build("", id(1));
        assert_eq!(root, "/1");
        let child = codec.build(&root, id(3));
        assert_eq!(child, "/1/3");
        assert_eq!(codec.build(&child, id(8)), "/1/3/8");
    }

    #[test]
    fn split_preserves_root_to_leaf_order() {
        let codec = PathCodec::default();
        assert_eq!(codec.split("/1/3/8").unwrap(), vec![id(1), id(3), id(8)]);
        assert_eq!(codec.split("1/3/8").unwrap(), vec![id(1), id(3), id(8)]);
        assert!(codec.split("").unwrap().is_empty());
        assert!(codec.split("/").unwrap().is_empty());
    }

    #[test]
    fn split_rejects_garbage_segments() {
        let codec = PathCodec::default();
        match codec.split("/1/x/8") {
            Err(CoreError::MalformedPath { segment, .. }) => assert_eq!(segment, "x"),
            other => panic!("expected MalformedPath, got {other:?}"),
        }
        assert!(codec.split("/1/0").is_err());
    }

    #[test]
    fn containment_is_delimiter_bounded() {
        let codec = PathCodec::default();
        assert!(codec.is_within("/1/3", "/1/3"));
        assert!(codec.is_within("/1/3/8", "/1/3"));
        assert!(codec.is_within("/1/3/8", "/1/3/"));
        assert!(!codec.is_within("/1/30", "/1/3"));
        assert!(!codec.is_within("/1", "/1/3"));
        assert!(codec.is_within("/7", ""));
    }

    #[test]
    fn rebase_only_touches_the_leading_prefix() {
        let codec = PathCodec::default();
        assert_eq!(codec.rebase("/1/2/3", "/1/2", "/2").as_deref(), Some("/2/3"));
        assert_eq!(codec.rebase("/1/2", "/1/2", "/5/2").as_deref(), Some("/5/2"));
        // "/1/2" also occurs later in this path; only the leading occurrence counts.
        assert_eq!(codec.rebase("/9/1/2", "/1/2", "/2"), None);
        assert_eq!(codec.rebase("/1/20", "/1/2", "/2"), None);
    }

    #[test]
    fn custom_delimiter() {
        let codec = PathCodec::new('.');
        assert_eq!(codec.build(".4", id(9)), ".4.9");
        assert_eq!(codec.split(".4.9").unwrap(), vec![id(4), id(9)]);
        assert_eq!(codec.depth(".4.9"), 2);
    }
}
