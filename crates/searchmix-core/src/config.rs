//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::field::FieldKind;

/// Configuration for a [`crate::SearchMix`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the persistent index.
    pub db_path: PathBuf,

    /// Whether fenced/indented code blocks participate in body search.
    ///
    /// Code blocks are always parsed into section content so they can be
    /// rendered back; this flag only gates the searchable projection.
    pub include_code_blocks: bool,

    /// Per-field ranking weights.
    pub weights: Weights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./db/searchmix.db"),
            include_code_blocks: false,
            weights: Weights::default(),
        }
    }
}

impl Config {
    /// Validate weight values before the index is opened.
    pub fn validate(&self) -> Result<()> {
        for kind in crate::field::FIELD_ORDER {
            let w = self.weights.get(kind);
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Config(format!(
                    "weight for field '{}' must be a non-negative number, got {w}",
                    kind.column()
                )));
            }
        }
        Ok(())
    }
}

/// BM25 boost per searchable field. Higher means matches in that field rank
/// the document better.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub title: f32,
    pub h1: f32,
    pub h2: f32,
    pub h3: f32,
    pub h4: f32,
    pub h5: f32,
    pub h6: f32,
    pub body: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            title: 10.0,
            h1: 9.0,
            h2: 7.0,
            h3: 5.0,
            h4: 3.0,
            h5: 2.0,
            h6: 1.5,
            body: 1.0,
        }
    }
}

impl Weights {
    /// Weight for a field.
    #[must_use]
    pub const fn get(&self, kind: FieldKind) -> f32 {
        match kind {
            FieldKind::Title => self.title,
            FieldKind::H1 => self.h1,
            FieldKind::H2 => self.h2,
            FieldKind::H3 => self.h3,
            FieldKind::H4 => self.h4,
            FieldKind::H5 => self.h5,
            FieldKind::H6 => self.h6,
            FieldKind::Body => self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from("./db/searchmix.db"));
        assert!(!config.include_code_blocks);
        assert!((config.weights.title - 10.0).abs() < f32::EPSILON);
        assert!((config.weights.h6 - 1.5).abs() < f32::EPSILON);
        assert!((config.weights.body - 1.0).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn heading_weights_decrease_with_depth() {
        let w = Weights::default();
        let ordered = [w.title, w.h1, w.h2, w.h3, w.h4, w.h5, w.h6, w.body];
        for pair in ordered.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn rejects_negative_weights() {
        let mut config = Config::default();
        config.weights.h3 = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_partial_config() {
        let config: Config =
            serde_json::from_str(r#"{"include_code_blocks": true, "weights": {"body": 2.0}}"#)
                .unwrap();
        assert!(config.include_code_blocks);
        assert!((config.weights.body - 2.0).abs() < f32::EPSILON);
        assert!((config.weights.title - 10.0).abs() < f32::EPSILON);
    }
}
