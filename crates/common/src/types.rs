// Core domain types shared across all termlight crates.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier assigned to a term by the data service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub String);

impl TermId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TermId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TermId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A source string and its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub translated: String,
}

impl Term {
    pub fn new(id: impl Into<TermId>, original: impl Into<String>, translated: impl Into<String>) -> Self {
        Self { id: id.into(), original: original.into(), translated: translated.into() }
    }

    /// Case-insensitive lookup key for this term.
    pub fn key(&self) -> String {
        lookup_key(&self.original)
    }
}

/// Lower-cased form used to key the term index.
pub fn lookup_key(text: &str) -> String {
    text.to_lowercase()
}

/// Partial update for an existing term. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
}

impl TermPatch {
    pub fn is_empty(&self) -> bool {
        self.original.is_none() && self.translated.is_none()
    }
}

/// Ordered term list for the current session.
///
/// Always replaced wholesale; equality is structural and drives change
/// detection between the cached and the freshly fetched list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermSet {
    terms: Vec<Term>,
}

impl TermSet {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter()
    }

    pub fn as_slice(&self) -> &[Term] {
        &self.terms
    }

    /// Non-empty originals in set order, the input for the match rule.
    pub fn originals(&self) -> Vec<String> {
        self.terms
            .iter()
            .filter(|term| !term.original.is_empty())
            .map(|term| term.original.clone())
            .collect()
    }

    pub fn index(&self) -> TermIndex {
        TermIndex::from_terms(&self.terms)
    }

    pub fn into_vec(self) -> Vec<Term> {
        self.terms
    }
}

impl From<Vec<Term>> for TermSet {
    fn from(terms: Vec<Term>) -> Self {
        Self::new(terms)
    }
}

/// Index entry: what a lookup resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedTerm {
    pub id: TermId,
    pub translated: String,
}

/// Lower-cased original → `{id, translated}`.
///
/// First occurrence wins; later terms sharing a key are shadowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermIndex {
    entries: HashMap<String, IndexedTerm>,
}

impl TermIndex {
    pub fn from_terms(terms: &[Term]) -> Self {
        let mut entries = HashMap::with_capacity(terms.len());
        for term in terms {
            if term.original.is_empty() {
                continue;
            }
            entries.entry(term.key()).or_insert_with(|| IndexedTerm {
                id: term.id.clone(),
                translated: term.translated.clone(),
            });
        }
        Self { entries }
    }

    /// Resolve a matched word, case-insensitively.
    pub fn lookup(&self, word: &str) -> Option<&IndexedTerm> {
        if word.is_empty() {
            return None;
        }
        self.entries.get(&lookup_key(word))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
