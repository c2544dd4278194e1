//! Puzzle definitions and the catalog they are served from.
//!
//! A [`Puzzle`] can only be built through validation, so every value of the
//! type holds the grid invariant: four groups of four words whose union is
//! exactly the sixteen words of the grid.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GROUP_COUNT: usize = 4;
pub const GROUP_SIZE: usize = 4;
pub const WORD_COUNT: usize = GROUP_COUNT * GROUP_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PuzzleError {
    #[error("expected {WORD_COUNT} words, found {0}")]
    WordCount(usize),
    #[error("expected {GROUP_COUNT} groups, found {0}")]
    GroupCount(usize),
    #[error("group \"{name}\" has {size} words (expected {GROUP_SIZE})")]
    GroupSize { name: String, size: usize },
    #[error("word \"{0}\" appears more than once in the grid")]
    DuplicateWord(String),
    #[error("group name \"{0}\" is used twice")]
    DuplicateGroupName(String),
    #[error("word \"{0}\" belongs to more than one group")]
    OverlappingWord(String),
    #[error("word \"{0}\" is not in any group")]
    UngroupedWord(String),
    #[error("group \"{group}\" lists \"{word}\" which is not in the grid")]
    UnknownGroupWord { group: String, word: String },
    #[error("empty word or group name")]
    Blank,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("puzzle dated {date} is invalid: {source}")]
    Invalid {
        date: NaiveDate,
        #[source]
        source: PuzzleError,
    },
    #[error("two puzzles share the date {0}")]
    DuplicateDate(NaiveDate),
}

/// A named group of four words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub words: Vec<String>,
}

impl Group {
    pub fn new(name: impl Into<String>, words: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    /// Set equality against a selection; order is irrelevant.
    pub fn matches<S: AsRef<str>>(&self, selection: &[S]) -> bool {
        selection.len() == self.words.len() && selection.iter().all(|s| self.contains(s.as_ref()))
    }

    /// How many of the selected words belong to this group.
    pub fn overlap<S: AsRef<str>>(&self, selection: &[S]) -> usize {
        selection.iter().filter(|s| self.contains(s.as_ref())).count()
    }
}

/// Serialized form of a puzzle, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPuzzle {
    date: NaiveDate,
    words: Vec<String>,
    groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPuzzle", into = "RawPuzzle")]
pub struct Puzzle {
    date: NaiveDate,
    words: Vec<String>,
    groups: Vec<Group>,
    creator: Option<String>,
}

impl TryFrom<RawPuzzle> for Puzzle {
    type Error = PuzzleError;

    fn try_from(raw: RawPuzzle) -> Result<Self, Self::Error> {
        Puzzle::new(raw.date, raw.words, raw.groups, raw.creator)
    }
}

impl From<Puzzle> for RawPuzzle {
    fn from(p: Puzzle) -> Self {
        RawPuzzle {
            date: p.date,
            words: p.words,
            groups: p.groups,
            creator: p.creator,
        }
    }
}

impl Puzzle {
    pub fn new(
        date: NaiveDate,
        words: Vec<String>,
        groups: Vec<Group>,
        creator: Option<String>,
    ) -> Result<Self, PuzzleError> {
        validate(&words, &groups)?;
        Ok(Self {
            date,
            words,
            groups,
            creator,
        })
    }

    /// Builds a puzzle whose grid is the groups' words in group order.
    pub fn from_groups(
        date: NaiveDate,
        groups: Vec<Group>,
        creator: Option<String>,
    ) -> Result<Self, PuzzleError> {
        let words = groups.iter().flat_map(|g| g.words.iter().cloned()).collect();
        Self::new(date, words, groups, creator)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    pub fn group_named(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_matching<S: AsRef<str>>(&self, selection: &[S]) -> Option<&Group> {
        self.groups.iter().find(|g| g.matches(selection))
    }
}

fn validate(words: &[String], groups: &[Group]) -> Result<(), PuzzleError> {
    if words.len() != WORD_COUNT {
        return Err(PuzzleError::WordCount(words.len()));
    }
    if groups.len() != GROUP_COUNT {
        return Err(PuzzleError::GroupCount(groups.len()));
    }

    let mut grid: HashSet<&str> = HashSet::with_capacity(WORD_COUNT);
    for w in words {
        if w.trim().is_empty() {
            return Err(PuzzleError::Blank);
        }
        if !grid.insert(w.as_str()) {
            return Err(PuzzleError::DuplicateWord(w.clone()));
        }
    }

    let mut names: HashSet<&str> = HashSet::with_capacity(GROUP_COUNT);
    let mut grouped: HashSet<&str> = HashSet::with_capacity(WORD_COUNT);
    for g in groups {
        if g.name.trim().is_empty() {
            return Err(PuzzleError::Blank);
        }
        if !names.insert(g.name.as_str()) {
            return Err(PuzzleError::DuplicateGroupName(g.name.clone()));
        }
        if g.words.len() != GROUP_SIZE {
            return Err(PuzzleError::GroupSize {
                name: g.name.clone(),
                size: g.words.len(),
            });
        }
        for w in &g.words {
            if !grid.contains(w.as_str()) {
                return Err(PuzzleError::UnknownGroupWord {
                    group: g.name.clone(),
                    word: w.clone(),
                });
            }
            if !grouped.insert(w.as_str()) {
                return Err(PuzzleError::OverlappingWord(w.clone()));
            }
        }
    }

    // 16 distinct grid words and 16 distinct grouped words drawn from the grid
    // already force equality; this only names the first stray word.
    if let Some(stray) = words.iter().find(|w| !grouped.contains(w.as_str())) {
        return Err(PuzzleError::UngroupedWord(stray.clone()));
    }
    Ok(())
}

/// Ordered, read-only list of puzzles.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    puzzles: Vec<Puzzle>,
}

impl Catalog {
    /// Duplicate dates are rejected; order is kept as given.
    pub fn new(puzzles: Vec<Puzzle>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(puzzles.len());
        for p in &puzzles {
            if !seen.insert(p.date()) {
                return Err(CatalogError::DuplicateDate(p.date()));
            }
        }
        Ok(Self { puzzles })
    }

    /// Parses a JSON array of puzzles, validating each entry.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: Vec<RawPuzzle> = serde_json::from_str(json)?;
        let puzzles = raw
            .into_iter()
            .map(|r| {
                let date = r.date;
                Puzzle::try_from(r).map_err(|source| CatalogError::Invalid { date, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(puzzles)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            puzzles = catalog.len(),
            "Loaded puzzle catalog"
        );
        Ok(catalog)
    }

    pub fn puzzles(&self) -> &[Puzzle] {
        &self.puzzles
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    pub fn first(&self) -> Option<&Puzzle> {
        self.puzzles.first()
    }

    pub fn get(&self, index: usize) -> Option<&Puzzle> {
        self.puzzles.get(index)
    }

    pub fn by_date(&self, date: NaiveDate) -> Option<&Puzzle> {
        self.puzzles.iter().find(|p| p.date() == date)
    }
}
