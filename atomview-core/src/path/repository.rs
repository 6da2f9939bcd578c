//! Path Repository
//!
//! Interns source paths and their canonical token sequences into dense
//! [`PathId`]s. Slots are recycled through free lists, so identifier space
//! stays proportional to the number of live paths.

use std::collections::HashMap;

use crate::ids::PathId;

use super::{canonical, tokenize};

/// Identifiers assigned to one source path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathIds {
    /// Identifier of the exact client-supplied string.
    pub source: PathId,
    /// Identifier of its canonical form, shared by equivalent notations.
    pub canonical: PathId,
}

#[derive(Debug)]
struct SourceEntry {
    path: String,
    canonical: PathId,
}

#[derive(Debug)]
struct CanonicalEntry {
    tokens: Vec<String>,
    path: String,
    /// Number of live source ids mapping here.
    sources: usize,
}

/// Interning table for source and canonical paths.
#[derive(Debug, Default)]
pub struct PathRepository {
    source_index: HashMap<String, PathId>,
    sources: Vec<Option<SourceEntry>>,
    free_sources: Vec<PathId>,

    canonical_index: HashMap<Vec<String>, PathId>,
    canonicals: Vec<Option<CanonicalEntry>>,
    free_canonicals: Vec<PathId>,
}

impl PathRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a source path, returning existing ids for a known string.
    pub fn intern(&mut self, source: &str) -> PathIds {
        if let Some(&id) = self.source_index.get(source) {
            if let Some(entry) = self.sources[id.index()].as_ref() {
                return PathIds {
                    source: id,
                    canonical: entry.canonical,
                };
            }
        }

        let tokens = tokenize(source);
        let canonical_id = match self.canonical_index.get(&tokens) {
            Some(&id) => id,
            None => {
                let entry = CanonicalEntry {
                    path: canonical(&tokens),
                    tokens: tokens.clone(),
                    sources: 0,
                };
                let id = allocate(&mut self.canonicals, &mut self.free_canonicals, entry);
                self.canonical_index.insert(tokens, id);
                id
            }
        };
        if let Some(entry) = self.canonicals[canonical_id.index()].as_mut() {
            entry.sources += 1;
        }

        let source_id = allocate(
            &mut self.sources,
            &mut self.free_sources,
            SourceEntry {
                path: source.to_owned(),
                canonical: canonical_id,
            },
        );
        self.source_index.insert(source.to_owned(), source_id);

        PathIds {
            source: source_id,
            canonical: canonical_id,
        }
    }

    /// Canonical tokens of a canonical id.
    pub fn tokens_of(&self, canonical: PathId) -> Option<&[String]> {
        self.canonical_entry(canonical).map(|e| e.tokens.as_slice())
    }

    /// Dotted rendering of a canonical id.
    pub fn canonical_path_of(&self, canonical: PathId) -> Option<&str> {
        self.canonical_entry(canonical).map(|e| e.path.as_str())
    }

    /// The original string of a source id.
    pub fn source_path_of(&self, source: PathId) -> Option<&str> {
        self.source_entry(source).map(|e| e.path.as_str())
    }

    /// The canonical id a source id maps to.
    pub fn canonical_of(&self, source: PathId) -> Option<PathId> {
        self.source_entry(source).map(|e| e.canonical)
    }

    /// Look up the canonical id for a path without interning it.
    pub fn find_canonical(&self, source: &str) -> Option<PathId> {
        match self.source_index.get(source) {
            Some(&id) => self.canonical_of(id),
            None => self.canonical_index.get(&tokenize(source)).copied(),
        }
    }

    /// Remove a source mapping.
    ///
    /// The canonical id is released too once no source id refers to it.
    /// Both slots become available for reuse. Returns false for unknown ids.
    pub fn release(&mut self, source: PathId) -> bool {
        let Some(entry) = self.sources.get_mut(source.index()).and_then(Option::take) else {
            return false;
        };
        self.source_index.remove(&entry.path);
        self.free_sources.push(source);

        let canonical_id = entry.canonical;
        let orphaned = match self.canonicals[canonical_id.index()].as_mut() {
            Some(canonical) => {
                canonical.sources -= 1;
                canonical.sources == 0
            }
            None => false,
        };
        if orphaned {
            if let Some(canonical) = self.canonicals[canonical_id.index()].take() {
                self.canonical_index.remove(&canonical.tokens);
                self.free_canonicals.push(canonical_id);
            }
        }
        true
    }

    /// Number of live source paths.
    pub fn source_count(&self) -> usize {
        self.source_index.len()
    }

    /// Number of live canonical paths.
    pub fn canonical_count(&self) -> usize {
        self.canonical_index.len()
    }

    fn source_entry(&self, id: PathId) -> Option<&SourceEntry> {
        self.sources.get(id.index()).and_then(Option::as_ref)
    }

    fn canonical_entry(&self, id: PathId) -> Option<&CanonicalEntry> {
        self.canonicals.get(id.index()).and_then(Option::as_ref)
    }
}

fn allocate<T>(slots: &mut Vec<Option<T>>, free: &mut Vec<PathId>, entry: T) -> PathId {
    match free.pop() {
        Some(id) => {
            slots[id.index()] = Some(entry);
            id
        }
        None => {
            slots.push(Some(entry));
            PathId::from_index(slots.len() - 1)
        }
    }
}
