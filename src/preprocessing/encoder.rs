//! Categorical label encoding

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::feature_extractor::FeatureError;

/// Code assigned to category values the encoder never saw during fitting
pub const UNSEEN_CATEGORY_CODE: f64 = 0.0;

/// Maps the distinct values of one column to integer codes.
///
/// Codes follow the sorted order of the values seen at fit time, so the same
/// training batch always produces the same table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the values of a training column
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();

        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Code for a known value
    pub fn code(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }

    /// Code for a value, falling back to [`UNSEEN_CATEGORY_CODE`]
    pub fn encode(&self, value: &str) -> f64 {
        self.code(value)
            .map(|code| code as f64)
            .unwrap_or(UNSEEN_CATEGORY_CODE)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Fitted encoders keyed by source column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoders {
    columns: BTreeMap<String, LabelEncoder>,
}

impl CategoricalEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: &str, encoder: LabelEncoder) {
        self.columns.insert(column.to_string(), encoder);
    }

    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Encode a value of `column`; the column itself must have been fitted
    pub fn encode(&self, column: &str, value: &str) -> Result<f64, FeatureError> {
        self.get(column)
            .map(|encoder| encoder.encode(value))
            .ok_or_else(|| FeatureError::MissingEncoder(column.to_string()))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}
