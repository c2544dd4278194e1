//! Maps a calendar day onto one catalog entry.

use chrono::NaiveDate;
use thiserror::Error;

use crate::puzzle::{Catalog, Puzzle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no puzzle available: the catalog is empty")]
    NoPuzzleAvailable,
}

/// Picks the puzzle for `today`.
///
/// An entry dated exactly `today` wins. Otherwise the catalog is treated as a
/// daily rotation anchored at its first entry: the day offset from that entry
/// is reduced modulo the catalog length, so days before the anchor wrap
/// backwards instead of indexing out of range.
pub fn select_puzzle(catalog: &Catalog, today: NaiveDate) -> Result<&Puzzle, SelectError> {
    let anchor = catalog.first().ok_or(SelectError::NoPuzzleAvailable)?;

    if let Some(exact) = catalog.by_date(today) {
        return Ok(exact);
    }

    let offset = today.signed_duration_since(anchor.date()).num_days();
    let len = catalog.len() as i64;
    let index = offset.rem_euclid(len) as usize;
    tracing::debug!(%today, offset, index, "No puzzle dated today, rotating");
    catalog.get(index).ok_or(SelectError::NoPuzzleAvailable)
}

/// Local wall-clock date. Only binaries call this; the engine takes dates as input.
pub fn today_local() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::fixtures::{date, numbered};

    fn weekly(start: NaiveDate) -> Catalog {
        let puzzles = (0..7)
            .map(|i| numbered(start + chrono::Duration::days(i * 30)))
            .collect();
        Catalog::new(puzzles).unwrap()
    }

    #[test]
    fn exact_date_wins() {
        let start = date(2025, 1, 1);
        let catalog = weekly(start);
        let target = catalog.puzzles()[5].date();
        assert_eq!(select_puzzle(&catalog, target).unwrap().date(), target);
    }

    #[test]
    fn ten_days_after_anchor_with_seven_entries_picks_index_three() {
        let start = date(2025, 1, 1);
        let catalog = weekly(start);
        let picked = select_puzzle(&catalog, start + chrono::Duration::days(10)).unwrap();
        assert_eq!(picked, &catalog.puzzles()[3]);
    }

    #[test]
    fn days_before_anchor_wrap_into_range() {
        let start = date(2025, 1, 1);
        let catalog = weekly(start);
        // -1 mod 7 == 6
        let picked = select_puzzle(&catalog, date(2024, 12, 31)).unwrap();
        assert_eq!(picked, &catalog.puzzles()[6]);
        let picked = select_puzzle(&catalog, date(2024, 12, 25)).unwrap();
        assert_eq!(picked, &catalog.puzzles()[0]);
    }

    #[test]
    fn rotation_is_stable_for_the_same_day() {
        let start = date(2025, 1, 1);
        let catalog = weekly(start);
        let day = date(2026, 6, 17);
        assert_eq!(
            select_puzzle(&catalog, day).unwrap(),
            select_puzzle(&catalog, day).unwrap()
        );
    }

    #[test]
    fn empty_catalog_has_no_puzzle() {
        let catalog = Catalog::default();
        assert_eq!(
            select_puzzle(&catalog, date(2025, 1, 1)),
            Err(SelectError::NoPuzzleAvailable)
        );
    }
}
