//! The game state machine for one puzzle day.
//!
//! A session is created in `Loading` (the constructor), which replays any
//! saved progress for the puzzle's date, and then sits in `Playing` until the
//! player finds all four groups (`Won`) or loses (`Lost`). Terminal states
//! only accept [`GameSession::reset`].
//!
//! Correct guesses resolve in two phases. [`GameSession::guess`] marks the
//! four words as fading and hands back a [`CommitTicket`]; the words leave the
//! board only when that ticket is completed, either explicitly or by
//! [`GameSession::poll`] once the fade delay has passed. While a commit is
//! pending the selection is locked. Resetting cancels the pending commit, and
//! its ticket is dead from then on.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{AttemptPolicy, EngineConfig};
use crate::puzzle::{Catalog, Group, Puzzle, GROUP_COUNT, GROUP_SIZE};
use crate::selector::{select_puzzle, SelectError};
use crate::shuffle::shuffle;
use crate::store::{PersistedState, PersistedStatus, ProgressStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Playing,
    Won,
    Lost,
}

impl Status {
    pub fn is_over(self) -> bool {
        !matches!(self, Status::Playing)
    }
}

/// Handle for a scheduled guess commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitTicket(u64);

impl CommitTicket {
    pub fn id(self) -> u64 {
        self.0
    }

    pub fn from_id(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingCommit {
    ticket: CommitTicket,
    group: usize,
    due: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GuessOutcome {
    /// Not four words selected, a commit is pending, or the game is over.
    Ignored,
    /// Matched a group; the words are fading until `ticket` is committed.
    Correct { group: String, ticket: CommitTicket },
    /// `repeated` is set when the same four words were already tried.
    Wrong {
        wrong_attempts: u32,
        one_away: bool,
        repeated: bool,
    },
    /// Wrong guess that used up the last life.
    OutOfLives { wrong_attempts: u32 },
}

/// Everything a renderer needs, detached from the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub date: NaiveDate,
    pub creator: Option<String>,
    pub status: Status,
    pub remaining: Vec<String>,
    pub selection: Vec<String>,
    pub fading: Vec<String>,
    pub solved: Vec<Group>,
    pub revealed: Vec<Group>,
    pub wrong_attempts: u32,
    pub lives_left: Option<u32>,
    pub pending: Option<CommitTicket>,
}

pub struct GameSession<S> {
    puzzle: Puzzle,
    store: S,
    policy: AttemptPolicy,
    fade_delay: Duration,
    rng: StdRng,

    remaining: Vec<String>,
    selection: Vec<String>,
    solved: Vec<usize>,
    revealed: Vec<usize>,
    wrong_attempts: u32,
    status: Status,
    wrong_guesses: HashSet<Vec<String>>,
    pending: Option<PendingCommit>,
    next_ticket: u64,
}

impl<S: ProgressStore> GameSession<S> {
    pub fn new(puzzle: Puzzle, store: S, config: &EngineConfig) -> Self {
        Self::with_rng(puzzle, store, config, StdRng::from_os_rng())
    }

    /// Selects today's puzzle from `catalog` and opens a session on it.
    pub fn for_day(
        catalog: &Catalog,
        today: NaiveDate,
        store: S,
        config: &EngineConfig,
    ) -> Result<Self, SelectError> {
        let puzzle = select_puzzle(catalog, today)?.clone();
        Ok(Self::new(puzzle, store, config))
    }

    pub fn with_rng(puzzle: Puzzle, store: S, config: &EngineConfig, rng: StdRng) -> Self {
        let mut session = Self {
            puzzle,
            store,
            policy: config.attempt_policy,
            fade_delay: config.fade_delay(),
            rng,
            remaining: Vec::new(),
            selection: Vec::new(),
            solved: Vec::new(),
            revealed: Vec::new(),
            wrong_attempts: 0,
            status: Status::Playing,
            wrong_guesses: HashSet::new(),
            pending: None,
            next_ticket: 0,
        };
        session.load();
        session
    }

    fn load(&mut self) {
        let date = self.puzzle.date();
        let saved = self.store.load(date);
        let restored = saved.as_ref().and_then(|saved| {
            let restored = self.reconcile(saved);
            if restored.is_none() {
                tracing::warn!(%date, ?saved, "Saved progress does not fit this puzzle");
            }
            restored
        });

        match restored {
            Some((solved, status)) => {
                self.wrong_attempts = saved.map_or(0, |saved| saved.wrong_attempts);
                self.solved = solved;
                self.status = status;
                if status == Status::Lost {
                    self.revealed = self.unsolved();
                }
                let taken: HashSet<&str> = self
                    .solved
                    .iter()
                    .chain(&self.revealed)
                    .flat_map(|&g| self.puzzle.groups()[g].words.iter().map(String::as_str))
                    .collect();
                let left = self
                    .puzzle
                    .words()
                    .iter()
                    .filter(|w| !taken.contains(w.as_str()))
                    .cloned()
                    .collect();
                self.remaining = shuffle(left, &mut self.rng);
                tracing::debug!(
                    %date,
                    solved = self.solved.len(),
                    wrong_attempts = self.wrong_attempts,
                    status = ?self.status,
                    "Restored progress"
                );
            }
            None => self.start_fresh(),
        }
    }

    /// Maps saved group names back onto this puzzle. `None` if they don't fit.
    fn reconcile(&self, saved: &PersistedState) -> Option<(Vec<usize>, Status)> {
        let mut solved = Vec::with_capacity(GROUP_COUNT);
        for name in &saved.solved_group_names {
            let index = self.puzzle.groups().iter().position(|g| &g.name == name)?;
            if solved.contains(&index) {
                return None;
            }
            solved.push(index);
        }

        let status = match (saved.status, solved.len()) {
            (Some(PersistedStatus::Won), GROUP_COUNT) | (None, GROUP_COUNT) => Status::Won,
            (Some(PersistedStatus::Won), _) | (Some(PersistedStatus::Lost), GROUP_COUNT) => {
                return None;
            }
            (Some(PersistedStatus::Lost), _) => Status::Lost,
            (None, _) if self.policy.is_exhausted(saved.wrong_attempts) => Status::Lost,
            (None, _) => Status::Playing,
        };
        Some((solved, status))
    }

    fn start_fresh(&mut self) {
        self.remaining = shuffle(self.puzzle.words().to_vec(), &mut self.rng);
        self.selection.clear();
        self.solved.clear();
        self.revealed.clear();
        self.wrong_guesses.clear();
        self.wrong_attempts = 0;
        self.status = Status::Playing;
        self.pending = None;
    }

    fn unsolved(&self) -> Vec<usize> {
        (0..self.puzzle.groups().len())
            .filter(|g| !self.solved.contains(g))
            .collect()
    }

    fn persist(&mut self) {
        let state = PersistedState {
            solved_group_names: self
                .solved
                .iter()
                .map(|&g| self.puzzle.groups()[g].name.clone())
                .collect(),
            wrong_attempts: self.wrong_attempts,
            status: match self.status {
                Status::Playing => None,
                Status::Won => Some(PersistedStatus::Won),
                Status::Lost => Some(PersistedStatus::Lost),
            },
        };
        self.store.save(self.puzzle.date(), &state);
    }

    fn accepts_input(&self) -> bool {
        self.status == Status::Playing && self.pending.is_none()
    }

    /// Adds or removes `word` from the selection. Returns whether anything changed.
    pub fn toggle_select(&mut self, word: &str) -> bool {
        if !self.accepts_input() {
            return false;
        }
        if let Some(pos) = self.selection.iter().position(|w| w == word) {
            self.selection.remove(pos);
            return true;
        }
        if self.selection.len() >= GROUP_SIZE || !self.remaining.iter().any(|w| w == word) {
            return false;
        }
        self.selection.push(word.to_owned());
        true
    }

    pub fn deselect_all(&mut self) -> bool {
        if !self.accepts_input() || self.selection.is_empty() {
            return false;
        }
        self.selection.clear();
        true
    }

    pub fn guess(&mut self) -> GuessOutcome {
        self.guess_at(Instant::now())
    }

    /// Like [`GameSession::guess`], with the fade starting at `now`.
    pub fn guess_at(&mut self, now: Instant) -> GuessOutcome {
        if !self.accepts_input() || self.selection.len() != GROUP_SIZE {
            return GuessOutcome::Ignored;
        }

        if let Some(group) = self
            .puzzle
            .groups()
            .iter()
            .position(|g| g.matches(&self.selection))
        {
            self.next_ticket += 1;
            let ticket = CommitTicket(self.next_ticket);
            self.pending = Some(PendingCommit {
                ticket,
                group,
                due: now + self.fade_delay,
            });
            let name = self.puzzle.groups()[group].name.clone();
            tracing::debug!(date = %self.puzzle.date(), group = %name, ticket = ticket.0, "Correct guess, fading");
            return GuessOutcome::Correct {
                group: name,
                ticket,
            };
        }

        let mut key = std::mem::take(&mut self.selection);
        key.sort();
        let repeated = !self.wrong_guesses.insert(key.clone());

        self.wrong_attempts += 1;
        let one_away = self
            .puzzle
            .groups()
            .iter()
            .any(|g| g.overlap(&key) == GROUP_SIZE - 1);
        tracing::debug!(
            date = %self.puzzle.date(),
            wrong_attempts = self.wrong_attempts,
            one_away,
            repeated,
            "Wrong guess"
        );

        if self.policy.is_exhausted(self.wrong_attempts) {
            self.lose();
            return GuessOutcome::OutOfLives {
                wrong_attempts: self.wrong_attempts,
            };
        }
        self.persist();
        GuessOutcome::Wrong {
            wrong_attempts: self.wrong_attempts,
            one_away,
            repeated,
        }
    }

    /// Runs the pending commit if `ticket` is still the live one.
    pub fn complete(&mut self, ticket: CommitTicket) -> bool {
        match self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                self.commit(pending.group);
                true
            }
            _ => {
                tracing::debug!(ticket = ticket.0, "Ignoring stale commit ticket");
                false
            }
        }
    }

    /// Commits the pending guess once its fade delay has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<CommitTicket> {
        let pending = self.pending.filter(|p| p.due <= now)?;
        self.complete(pending.ticket).then_some(pending.ticket)
    }

    /// Time left before the pending commit is due, if any.
    pub fn pending_due_in(&self, now: Instant) -> Option<Duration> {
        self.pending.map(|p| p.due.saturating_duration_since(now))
    }

    fn commit(&mut self, group: usize) {
        let words = &self.puzzle.groups()[group].words;
        self.remaining.retain(|w| !words.contains(w));
        self.selection.clear();
        self.solved.push(group);
        if self.solved.len() == GROUP_COUNT {
            self.status = Status::Won;
        }
        tracing::info!(
            date = %self.puzzle.date(),
            group = %self.puzzle.groups()[group].name,
            solved = self.solved.len(),
            status = ?self.status,
            "Group solved"
        );
        self.persist();
    }

    fn lose(&mut self) {
        self.status = Status::Lost;
        self.revealed = self.unsolved();
        self.remaining.clear();
        self.selection.clear();
        tracing::info!(
            date = %self.puzzle.date(),
            solved = self.solved.len(),
            wrong_attempts = self.wrong_attempts,
            "Game lost"
        );
        self.persist();
    }

    /// Reorders the unsolved words. Presentation only.
    pub fn shuffle_visible(&mut self) {
        if self.status.is_over() {
            return;
        }
        let words = std::mem::take(&mut self.remaining);
        self.remaining = shuffle(words, &mut self.rng);
    }

    /// Gives up and reveals every group not yet found.
    pub fn surrender(&mut self) -> bool {
        if self.status != Status::Playing {
            return false;
        }
        if let Some(pending) = self.pending {
            self.complete(pending.ticket);
            if self.status != Status::Playing {
                return false;
            }
        }
        self.lose();
        true
    }

    /// Wipes saved progress for this day and starts over.
    pub fn reset(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(ticket = pending.ticket.0, "Cancelled pending commit");
        }
        self.store.clear(self.puzzle.date());
        self.start_fresh();
        tracing::info!(date = %self.puzzle.date(), "Session reset");
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    pub fn date(&self) -> NaiveDate {
        self.puzzle.date()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn remaining_words(&self) -> &[String] {
        &self.remaining
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// Words of the pending correct guess, still on the board.
    pub fn fading_words(&self) -> &[String] {
        match self.pending {
            Some(_) => self.selection.as_slice(),
            None => &[],
        }
    }

    pub fn pending_ticket(&self) -> Option<CommitTicket> {
        self.pending.map(|p| p.ticket)
    }

    pub fn solved_groups(&self) -> Vec<&Group> {
        self.solved.iter().map(|&g| &self.puzzle.groups()[g]).collect()
    }

    /// Groups shown because the game was lost, in puzzle order.
    pub fn revealed_groups(&self) -> Vec<&Group> {
        self.revealed.iter().map(|&g| &self.puzzle.groups()[g]).collect()
    }

    /// Solved rows followed by revealed rows.
    pub fn board_groups(&self) -> Vec<&Group> {
        let mut rows = self.solved_groups();
        rows.extend(self.revealed_groups());
        rows
    }

    pub fn wrong_attempts(&self) -> u32 {
        self.wrong_attempts
    }

    pub fn lives_left(&self) -> Option<u32> {
        self.policy.lives_left(self.wrong_attempts)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            date: self.puzzle.date(),
            creator: self.puzzle.creator().map(str::to_owned),
            status: self.status,
            remaining: self.remaining.clone(),
            selection: self.selection.clone(),
            fading: self.fading_words().to_vec(),
            solved: self.solved_groups().into_iter().cloned().collect(),
            revealed: self.revealed_groups().into_iter().cloned().collect(),
            wrong_attempts: self.wrong_attempts,
            lives_left: self.lives_left(),
            pending: self.pending_ticket(),
        }
    }
}
