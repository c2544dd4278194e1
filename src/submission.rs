//! User-authored puzzles: the submission data contract, its validation, and
//! the SQLite table submissions are kept in.
//!
//! Transport is someone else's problem. This module only knows the JSON
//! shapes of `POST /api/submit-puzzle` and `GET /api/submissions` and how a
//! stored submission turns back into a [`Puzzle`].

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::puzzle::{Catalog, CatalogError, Group, Puzzle, PuzzleError, GROUP_COUNT, GROUP_SIZE};

pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Please complete all fields in Group {0}.")]
    Incomplete(usize),
    #[error("expected {GROUP_COUNT} groups, found {0}")]
    GroupCount(usize),
    #[error("{0}")]
    Puzzle(#[from] PuzzleError),
    #[error("this puzzle has already been submitted")]
    Duplicate,
    #[error("stored submission {id} is unreadable: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionGroup {
    pub category: String,
    pub words: [String; GROUP_SIZE],
}

/// Body of `POST /api/submit-puzzle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPuzzleRequest {
    #[serde(default)]
    pub submitter: String,
    pub groups: Vec<SubmissionGroup>,
}

/// Reply of `POST /api/submit-puzzle`: `{"success":true}` or `{"error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitPuzzleResponse {
    Accepted { success: bool },
    Rejected { error: String },
}

impl SubmitPuzzleResponse {
    pub fn accepted() -> Self {
        SubmitPuzzleResponse::Accepted { success: true }
    }

    pub fn rejected(error: impl ToString) -> Self {
        SubmitPuzzleResponse::Rejected {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmitPuzzleResponse::Accepted { success: true })
    }
}

/// Client-side progress of one submission. There is no automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Submitting,
    Success,
    Error,
}

impl SubmissionStatus {
    pub fn settle(response: &SubmitPuzzleResponse) -> Self {
        if response.is_success() {
            SubmissionStatus::Success
        } else {
            SubmissionStatus::Error
        }
    }
}

/// A request that passed validation, trimmed and hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub submitter: String,
    pub groups: Vec<SubmissionGroup>,
    pub puzzle_hash: String,
}

impl SubmitPuzzleRequest {
    pub fn validate(&self) -> Result<ValidSubmission, SubmissionError> {
        for (i, g) in self.groups.iter().enumerate() {
            if g.category.trim().is_empty() || g.words.iter().any(|w| w.trim().is_empty()) {
                return Err(SubmissionError::Incomplete(i + 1));
            }
        }
        if self.groups.len() != GROUP_COUNT {
            return Err(SubmissionError::GroupCount(self.groups.len()));
        }

        let groups: Vec<SubmissionGroup> = self
            .groups
            .iter()
            .map(|g| SubmissionGroup {
                category: g.category.trim().to_owned(),
                words: g.words.clone().map(|w| w.trim().to_owned()),
            })
            .collect();

        // Any date will do; this only checks the grid invariant.
        Puzzle::from_groups(NaiveDate::MIN, to_groups(&groups), None)?;

        let submitter = match self.submitter.trim() {
            "" => ANONYMOUS.to_owned(),
            name => name.to_owned(),
        };
        let puzzle_hash = puzzle_hash(&groups);
        Ok(ValidSubmission {
            submitter,
            groups,
            puzzle_hash,
        })
    }
}

fn to_groups(groups: &[SubmissionGroup]) -> Vec<Group> {
    groups
        .iter()
        .map(|g| Group::new(g.category.clone(), g.words.iter().cloned()))
        .collect()
}

/// SHA-256 over the case-folded groups, independent of group and word order.
///
/// Rows are hashed as a JSON array of `[category, word, ...]` so no text
/// inside a field can imitate a separator.
pub fn puzzle_hash(groups: &[SubmissionGroup]) -> String {
    let mut rows: Vec<Vec<String>> = groups
        .iter()
        .map(|g| {
            let mut words: Vec<String> = g.words.iter().map(|w| w.to_lowercase()).collect();
            words.sort();
            let mut row = Vec::with_capacity(GROUP_SIZE + 1);
            row.push(g.category.to_lowercase());
            row.extend(words);
            row
        })
        .collect();
    rows.sort();
    let mut hasher = Sha256::new();
    hasher.update(serde_json::Value::from(rows).to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// One row of the `submissions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredSubmission {
    pub id: i64,
    pub submitter: String,
    pub groups: Vec<SubmissionGroup>,
    pub submitted_at: String,
}

impl StoredSubmission {
    /// Calendar day of `submitted_at` (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub fn submitted_on(&self) -> Option<NaiveDate> {
        let day = self.submitted_at.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    pub fn to_puzzle_on(&self, date: NaiveDate) -> Result<Puzzle, PuzzleError> {
        Puzzle::from_groups(date, to_groups(&self.groups), Some(self.submitter.clone()))
    }

    /// The puzzle dated by its submission day.
    pub fn to_puzzle(&self) -> Result<Puzzle, SubmissionError> {
        let date = self.submitted_on().ok_or_else(|| SubmissionError::Corrupt {
            id: self.id,
            reason: format!("bad timestamp {:?}", self.submitted_at),
        })?;
        Ok(self.to_puzzle_on(date)?)
    }
}

/// Lays submissions out on consecutive days starting at `start`, in the order given.
pub fn schedule(submissions: &[StoredSubmission], start: NaiveDate) -> Result<Catalog, CatalogError> {
    let mut puzzles = Vec::with_capacity(submissions.len());
    let mut day = start;
    for s in submissions {
        let puzzle = s
            .to_puzzle_on(day)
            .map_err(|source| CatalogError::Invalid { date: day, source })?;
        puzzles.push(puzzle);
        day = day.succ_opt().unwrap_or(day);
    }
    Catalog::new(puzzles)
}

pub struct SubmissionStore {
    conn: Connection,
}

impl SubmissionStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS submissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submitter TEXT NOT NULL,
            groups TEXT NOT NULL,
            puzzle_hash TEXT NOT NULL UNIQUE,
            submitted_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
    ";

    pub fn open(path: impl AsRef<Path>) -> Result<Self, SubmissionError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(Duration::from_millis(60000))?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self, SubmissionError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, SubmissionError> {
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self { conn })
    }

    /// Stores a validated submission and returns its row id.
    pub fn insert(&self, submission: &ValidSubmission) -> Result<i64, SubmissionError> {
        let groups = serde_json::to_string(&submission.groups).map_err(|e| {
            SubmissionError::Corrupt {
                id: 0,
                reason: e.to_string(),
            }
        })?;
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO submissions (submitter, groups, puzzle_hash) VALUES (?1, ?2, ?3)",
            params![submission.submitter, groups, submission.puzzle_hash],
        )?;
        if changed == 0 {
            return Err(SubmissionError::Duplicate);
        }
        let id = self.conn.last_insert_rowid();
        tracing::info!(id, submitter = %submission.submitter, "Stored puzzle submission");
        Ok(id)
    }

    /// All submissions, oldest first. Rows whose groups no longer parse are skipped.
    pub fn list(&self) -> Result<Vec<StoredSubmission>, SubmissionError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, submitter, groups, COALESCE(submitted_at, '') FROM submissions ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let submitter: String = row.get(1)?;
            let groups: String = row.get(2)?;
            let submitted_at: String = row.get(3)?;
            Ok((id, submitter, groups, submitted_at))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, submitter, groups, submitted_at) = row?;
            match serde_json::from_str(&groups) {
                Ok(groups) => out.push(StoredSubmission {
                    id,
                    submitter,
                    groups,
                    submitted_at,
                }),
                Err(e) => tracing::warn!(id, %e, "Skipping unreadable submission"),
            }
        }
        Ok(out)
    }

    /// Reply body of `GET /api/submissions`. Rows that don't make a valid
    /// puzzle are skipped.
    pub fn puzzles(&self) -> Result<Vec<Puzzle>, SubmissionError> {
        let puzzles = self
            .list()?
            .iter()
            .filter_map(|s| match s.to_puzzle() {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(id = s.id, %e, "Skipping invalid submission");
                    None
                }
            })
            .collect();
        Ok(puzzles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::fixtures::date;

    fn group(category: &str, words: [&str; 4]) -> SubmissionGroup {
        SubmissionGroup {
            category: category.to_owned(),
            words: words.map(str::to_owned),
        }
    }

    fn request() -> SubmitPuzzleRequest {
        SubmitPuzzleRequest {
            submitter: "  ".into(),
            groups: vec![
                group("Marksmen", ["Jinx ", "Caitlyn", "Ashe", "Vayne"]),
                group("Regions", ["Demacia", "Noxus", "Ionia", "Shurima"]),
                group("Items", ["Zhonya", "Rabadon", "Thornmail", "Bork"]),
                group(" Dragons", ["Infernal", "Ocean", "Cloud", "Mountain"]),
            ],
        }
    }

    #[test]
    fn parses_the_wire_shape() {
        let body = r#"{
            "submitter": "Teemo",
            "groups": [
                {"category": "a", "words": ["1","2","3","4"]},
                {"category": "b", "words": ["5","6","7","8"]},
                {"category": "c", "words": ["9","10","11","12"]},
                {"category": "d", "words": ["13","14","15","16"]}
            ]
        }"#;
        let req: SubmitPuzzleRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.validate().unwrap().submitter, "Teemo");

        let short = r#"{"groups":[{"category":"a","words":["1","2","3"]}]}"#;
        assert!(serde_json::from_str::<SubmitPuzzleRequest>(short).is_err());
    }

    #[test]
    fn trims_and_defaults_submitter() {
        let valid = request().validate().unwrap();
        assert_eq!(valid.submitter, ANONYMOUS);
        assert_eq!(valid.groups[0].words[0], "Jinx");
        assert_eq!(valid.groups[3].category, "Dragons");
        assert_eq!(valid.puzzle_hash.len(), 64);
    }

    #[test]
    fn names_first_incomplete_group() {
        let mut req = request();
        req.groups[2].words[1] = "   ".into();
        req.groups[3].category = String::new();
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Please complete all fields in Group 3.");
    }

    #[test]
    fn rejects_wrong_group_count_and_repeated_words() {
        let mut req = request();
        req.groups.pop();
        assert!(matches!(req.validate(), Err(SubmissionError::GroupCount(3))));

        let mut req = request();
        req.groups[1].words[0] = "Ashe".into();
        assert!(matches!(
            req.validate(),
            Err(SubmissionError::Puzzle(PuzzleError::DuplicateWord(_)))
        ));
    }

    #[test]
    fn hash_ignores_order_and_case() {
        let a = request().validate().unwrap();
        let mut req = request();
        req.groups.swap(0, 2);
        req.groups[1].words.reverse();
        req.groups[0].category = "ITEMS".into();
        assert_eq!(req.validate().unwrap().puzzle_hash, a.puzzle_hash);
    }

    #[test]
    fn response_shapes() {
        assert_eq!(
            serde_json::to_string(&SubmitPuzzleResponse::accepted()).unwrap(),
            r#"{"success":true}"#
        );
        let rejected: SubmitPuzzleResponse = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert_eq!(SubmissionStatus::settle(&rejected), SubmissionStatus::Error);
        assert_eq!(
            SubmissionStatus::settle(&SubmitPuzzleResponse::accepted()),
            SubmissionStatus::Success
        );
        assert_eq!(SubmissionStatus::default(), SubmissionStatus::Idle);
    }

    #[test]
    fn store_insert_list_and_dedupe() {
        let store = SubmissionStore::open_in_memory().unwrap();
        let valid = request().validate().unwrap();
        let id = store.insert(&valid).unwrap();
        assert!(matches!(store.insert(&valid), Err(SubmissionError::Duplicate)));

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].submitter, ANONYMOUS);
        assert!(all[0].submitted_on().is_some());

        let puzzles = store.puzzles().unwrap();
        assert_eq!(puzzles[0].creator(), Some(ANONYMOUS));
        assert_eq!(puzzles[0].words().len(), 16);
        assert_eq!(puzzles[0].groups()[1].name, "Regions");
    }

    #[test]
    fn listing_skips_rows_that_are_not_puzzles() {
        let store = SubmissionStore::open_in_memory().unwrap();
        store.insert(&request().validate().unwrap()).unwrap();

        let mut repeated = request();
        repeated.groups[1].words[0] = "Caitlyn".into();
        let groups = serde_json::to_string(&repeated.groups).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO submissions (submitter, groups, puzzle_hash) VALUES ('Old', ?1, 'h1')",
                params![groups],
            )
            .unwrap();
        let groups = serde_json::to_string(&request().groups).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO submissions (submitter, groups, puzzle_hash, submitted_at) \
                 VALUES ('Old', ?1, 'h2', 'sometime')",
                params![groups],
            )
            .unwrap();

        assert_eq!(store.list().unwrap().len(), 3);
        let puzzles = store.puzzles().unwrap();
        assert_eq!(puzzles.len(), 1);
        assert_eq!(puzzles[0].creator(), Some(ANONYMOUS));
    }

    #[test]
    fn hash_fields_cannot_imitate_separators() {
        let a = [group("a", ["b", "c", "d", "e,f"])];
        let b = [group("a", ["b,c", "d", "e", "f"])];
        assert_ne!(puzzle_hash(&a), puzzle_hash(&b));

        let c = [group("x:y", ["1", "2", "3", "4"]), group("z", ["5", "6", "7", "8"])];
        let d = [group("x", ["y:1", "2", "3", "4"]), group("z", ["5", "6", "7", "8"])];
        assert_ne!(puzzle_hash(&c), puzzle_hash(&d));
    }

    #[test]
    fn stored_submission_becomes_puzzle() {
        let valid = request().validate().unwrap();
        let stored = StoredSubmission {
            id: 7,
            submitter: "Ezreal".into(),
            groups: valid.groups,
            submitted_at: "2025-05-17 21:04:11".into(),
        };
        let puzzle = stored.to_puzzle().unwrap();
        assert_eq!(puzzle.date(), date(2025, 5, 17));
        assert_eq!(puzzle.creator(), Some("Ezreal"));

        let broken = StoredSubmission {
            submitted_at: "yesterday".into(),
            ..stored
        };
        assert!(matches!(broken.to_puzzle(), Err(SubmissionError::Corrupt { id: 7, .. })));
    }

    #[test]
    fn schedule_assigns_consecutive_days() {
        let valid = request().validate().unwrap();
        let stored: Vec<StoredSubmission> = (1..=3)
            .map(|id| StoredSubmission {
                id,
                submitter: ANONYMOUS.into(),
                groups: valid.groups.clone(),
                submitted_at: String::new(),
            })
            .collect();
        let catalog = schedule(&stored, date(2025, 12, 31)).unwrap();
        let dates: Vec<_> = catalog.puzzles().iter().map(Puzzle::date).collect();
        assert_eq!(dates, [date(2025, 12, 31), date(2026, 1, 1), date(2026, 1, 2)]);
    }
}
