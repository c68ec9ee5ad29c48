//! The searchable field set.
//!
//! One small sum type replaces stringly-typed heading-depth dispatch: the
//! parser assigns it to sections, the store names its columns with it, and
//! the snippet extractor walks fields in its canonical order.

use serde::{Deserialize, Serialize};

/// A searchable field of a document record.
///
/// `Title` holds the first h1, `H1`..`H6` the per-level heading
/// projections, and `Body` the document text itself. Sections use the same
/// type (`Body` marks the synthetic pre-heading root).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Title,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Body,
}

/// Snippet extraction order: title first, then headings by level, body last.
pub const FIELD_ORDER: [FieldKind; 8] = [
    FieldKind::Title,
    FieldKind::H1,
    FieldKind::H2,
    FieldKind::H3,
    FieldKind::H4,
    FieldKind::H5,
    FieldKind::H6,
    FieldKind::Body,
];

/// Field names accepted in the public query language, `headings` excluded
/// (it is an alias expanded by the rewriter, not a column).
pub const QUERY_FIELDS: [&str; 8] = ["title", "h1", "h2", "h3", "h4", "h5", "h6", "body"];

impl FieldKind {
    /// Column name of the raw (stored, unindexed) variant.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::H4 => "h4",
            Self::H5 => "h5",
            Self::H6 => "h6",
            Self::Body => "body",
        }
    }

    /// Column name of the normalized (indexed) variant.
    #[must_use]
    pub const fn normalized_column(self) -> &'static str {
        match self {
            Self::Title => "title_normalized",
            Self::H1 => "h1_normalized",
            Self::H2 => "h2_normalized",
            Self::H3 => "h3_normalized",
            Self::H4 => "h4_normalized",
            Self::H5 => "h5_normalized",
            Self::H6 => "h6_normalized",
            Self::Body => "body_normalized",
        }
    }

    /// Heading depth 1-6 for heading fields, 0 otherwise.
    #[must_use]
    pub const fn depth(self) -> u8 {
        match self {
            Self::H1 => 1,
            Self::H2 => 2,
            Self::H3 => 3,
            Self::H4 => 4,
            Self::H5 => 5,
            Self::H6 => 6,
            Self::Title | Self::Body => 0,
        }
    }

    /// Field for a heading of the given depth.
    #[must_use]
    pub const fn from_depth(depth: u8) -> Option<Self> {
        match depth {
            1 => Some(Self::H1),
            2 => Some(Self::H2),
            3 => Some(Self::H3),
            4 => Some(Self::H4),
            5 => Some(Self::H5),
            6 => Some(Self::H6),
            _ => None,
        }
    }

    /// Resolve a public query-language field name.
    #[must_use]
    pub fn from_query_name(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "h1" => Some(Self::H1),
            "h2" => Some(Self::H2),
            "h3" => Some(Self::H3),
            "h4" => Some(Self::H4),
            "h5" => Some(Self::H5),
            "h6" => Some(Self::H6),
            "body" => Some(Self::Body),
            _ => None,
        }
    }

    /// True for `H1`..`H6`.
    #[must_use]
    pub const fn is_heading(self) -> bool {
        !matches!(self, Self::Title | Self::Body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_round_trips() {
        for depth in 1..=6u8 {
            let kind = FieldKind::from_depth(depth).unwrap();
            assert_eq!(kind.depth(), depth);
            assert!(kind.is_heading());
        }
        assert!(FieldKind::from_depth(0).is_none());
        assert!(FieldKind::from_depth(7).is_none());
    }

    #[test]
    fn normalized_columns_carry_suffix() {
        for kind in FIELD_ORDER {
            assert_eq!(
                kind.normalized_column(),
                format!("{}_normalized", kind.column())
            );
        }
    }

    #[test]
    fn query_names_resolve() {
        for name in QUERY_FIELDS {
            assert!(FieldKind::from_query_name(name).is_some());
        }
        assert!(FieldKind::from_query_name("headings").is_none());
        assert!(FieldKind::from_query_name("unknown").is_none());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FieldKind::H3).unwrap(), "\"h3\"");
        assert_eq!(serde_json::to_string(&FieldKind::Body).unwrap(), "\"body\"");
    }
}
