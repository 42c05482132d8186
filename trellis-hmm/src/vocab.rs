//! Symbolic name ↔ dense index mapping at the API boundary.
//!
//! The numerical core only ever sees dense indices. A [`Vocabulary`] holds
//! an ordered set of names (hidden states or observation symbols) and
//! translates caller-facing tokens into those indices and back for display.

use std::collections::HashMap;

use trellis_core::{Result, TrellisError};

/// An ordered, duplicate-free set of names with index lookup.
///
/// The position of a name in the construction order is its dense index, and
/// that ordering is fixed for the lifetime of the vocabulary.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vocabulary {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a vocabulary from an ordered list of names.
    ///
    /// # Errors
    ///
    /// Returns [`TrellisError::InvalidInput`] if the list is empty or
    /// contains a duplicate or empty name.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Err(TrellisError::InvalidInput(
                "vocabulary must contain at least one name".into(),
            ));
        }
        let mut owned = Vec::with_capacity(names.len());
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let name = name.as_ref();
            if name.is_empty() {
                return Err(TrellisError::InvalidInput(format!(
                    "vocabulary name {i} is empty"
                )));
            }
            if index.insert(name.to_string(), i).is_some() {
                return Err(TrellisError::InvalidInput(format!(
                    "duplicate vocabulary name {name:?}"
                )));
            }
            owned.push(name.to_string());
        }
        Ok(Self {
            names: owned,
            index,
        })
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the vocabulary is empty (never true for a constructed value).
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The ordered names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The name at `index`, if in range.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// The dense index of `name`, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Translate tokens into dense indices.
    ///
    /// # Errors
    ///
    /// Returns [`TrellisError::InvalidObservation`] for any token not in the
    /// vocabulary.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<usize>> {
        tokens
            .iter()
            .enumerate()
            .map(|(t, token)| {
                let token = token.as_ref();
                self.index_of(token).ok_or_else(|| {
                    TrellisError::InvalidObservation(format!(
                        "token {t} ({token:?}) is not in the vocabulary"
                    ))
                })
            })
            .collect()
    }

    /// Translate dense indices back into names.
    ///
    /// # Errors
    ///
    /// Returns [`TrellisError::InvalidInput`] for any out-of-range index.
    pub fn decode(&self, indices: &[usize]) -> Result<Vec<&str>> {
        indices
            .iter()
            .map(|&i| {
                self.name(i).ok_or_else(|| {
                    TrellisError::InvalidInput(format!(
                        "index {i} out of range for vocabulary of {}",
                        self.names.len()
                    ))
                })
            })
            .collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_preserves_order() {
        let vocab = Vocabulary::new(&["Walk", "Shop", "Clean"]).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.name(0), Some("Walk"));
        assert_eq!(vocab.name(2), Some("Clean"));
        assert_eq!(vocab.index_of("Shop"), Some(1));
        assert_eq!(vocab.index_of("Fly"), None);
    }

    #[test]
    fn encode_decode_round_trip() {
        let vocab = Vocabulary::new(&["Walk", "Shop", "Clean"]).unwrap();
        let encoded = vocab.encode(&["Walk", "Shop", "Clean", "Walk"]).unwrap();
        assert_eq!(encoded, vec![0, 1, 2, 0]);
        let decoded = vocab.decode(&encoded).unwrap();
        assert_eq!(decoded, vec!["Walk", "Shop", "Clean", "Walk"]);
    }

    #[test]
    fn encode_rejects_unknown_token() {
        let vocab = Vocabulary::new(&["Walk", "Shop", "Clean"]).unwrap();
        let err = vocab.encode(&["Walk", "Fly"]).unwrap_err();
        assert!(matches!(err, TrellisError::InvalidObservation(_)));
        assert!(err.to_string().contains("Fly"));
    }

    #[test]
    fn decode_rejects_out_of_range_index() {
        let vocab = Vocabulary::new(&["Rainy", "Sunny"]).unwrap();
        assert!(vocab.decode(&[0, 2]).is_err());
    }

    #[test]
    fn construction_rejects_bad_name_lists() {
        assert!(Vocabulary::new::<&str>(&[]).is_err());
        assert!(Vocabulary::new(&["Walk", "Walk"]).is_err());
        assert!(Vocabulary::new(&["Walk", ""]).is_err());
    }
}
