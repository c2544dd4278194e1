//! Line-delimited JSON driver for one game session.
//!
//! Send `Init` first; every later message acts on that session and is answered
//! with the session's current view. Correct guesses come back with a commit
//! ticket: send `Commit` once the fade animation is done (or `Poll` to let the
//! configured fade delay decide).

use std::io::{BufRead, BufReader, Write};
use std::time::Instant;

use cdx_daily::selector::today_local;
use cdx_daily::{
    Catalog, CommitTicket, EngineConfig, GameSession, GuessOutcome, MemoryProgressStore,
    ProgressStore, Puzzle, SessionView, SqliteProgressStore,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Msg {
    Init {
        catalog: Option<Vec<Puzzle>>,
        catalog_path: Option<String>,
        today: Option<NaiveDate>,
        progress_db: Option<String>,
    },
    Toggle {
        word: String,
    },
    Deselect,
    Guess,
    Commit {
        ticket: Option<u64>,
    },
    Poll,
    Shuffle,
    Surrender,
    Reset,
    State,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Out {
    Ready { view: SessionView },
    Guessed { outcome: GuessOutcome, view: SessionView },
    Committed { committed: bool, view: SessionView },
    State { view: SessionView },
    Error { message: String },
}

type Session = GameSession<Box<dyn ProgressStore>>;

fn reply<W: Write>(out: &mut W, msg: &Out) {
    match serde_json::to_string(msg) {
        Ok(s) => {
            let _ = writeln!(out, "{s}");
        }
        Err(e) => tracing::error!(%e, "Failed to encode reply"),
    }
}

fn error(message: impl ToString) -> Out {
    Out::Error {
        message: message.to_string(),
    }
}

fn open_session(
    config: &EngineConfig,
    catalog: Option<Vec<Puzzle>>,
    catalog_path: Option<String>,
    today: Option<NaiveDate>,
    progress_db: Option<String>,
) -> Result<Session, String> {
    let catalog = match (catalog, catalog_path.map(Into::into).or(config.catalog.clone())) {
        (Some(puzzles), _) => Catalog::new(puzzles).map_err(|e| e.to_string())?,
        (None, Some(path)) => Catalog::load(path).map_err(|e| e.to_string())?,
        (None, None) => Catalog::default(),
    };

    let db = progress_db.map(Into::into).or(config.progress_db.clone());
    let store: Box<dyn ProgressStore> = match db {
        Some(path) => Box::new(SqliteProgressStore::open(path).map_err(|e| e.to_string())?),
        None => Box::new(MemoryProgressStore::default()),
    };

    let today = today.unwrap_or_else(today_local);
    GameSession::for_day(&catalog, today, store, config).map_err(|e| e.to_string())
}

fn handle(session: &mut Session, msg: Msg) -> Out {
    match msg {
        Msg::Init { .. } => error("already initialized"),
        Msg::Toggle { word } => {
            session.toggle_select(&word);
            Out::State { view: session.view() }
        }
        Msg::Deselect => {
            session.deselect_all();
            Out::State { view: session.view() }
        }
        Msg::Guess => {
            let outcome = session.guess();
            Out::Guessed {
                outcome,
                view: session.view(),
            }
        }
        Msg::Commit { ticket } => {
            let committed = match ticket.map(CommitTicket::from_id).or(session.pending_ticket()) {
                Some(ticket) => session.complete(ticket),
                None => false,
            };
            Out::Committed {
                committed,
                view: session.view(),
            }
        }
        Msg::Poll => {
            let committed = session.poll(Instant::now()).is_some();
            Out::Committed {
                committed,
                view: session.view(),
            }
        }
        Msg::Shuffle => {
            session.shuffle_visible();
            Out::State { view: session.view() }
        }
        Msg::Surrender => {
            session.surrender();
            Out::State { view: session.view() }
        }
        Msg::Reset => {
            session.reset();
            Out::State { view: session.view() }
        }
        Msg::State => Out::State { view: session.view() },
    }
}

/// Answers one input line. A second `Init` is an error, not a restart.
fn process(config: &EngineConfig, session_opt: &mut Option<Session>, line: &str) -> Out {
    let msg: Msg = match serde_json::from_str(line) {
        Ok(m) => m,
        Err(e) => return error(format!("bad json: {e}")),
    };
    match msg {
        Msg::Init {
            catalog,
            catalog_path,
            today,
            progress_db,
        } if session_opt.is_none() => {
            match open_session(config, catalog, catalog_path, today, progress_db) {
                Ok(session) => {
                    let view = session.view();
                    *session_opt = Some(session);
                    Out::Ready { view }
                }
                Err(message) => Out::Error { message },
            }
        }
        msg => match session_opt.as_mut() {
            Some(session) => handle(session, msg),
            None => error("not initialized"),
        },
    }
}

fn main() {
    cdx_daily::init_logging();
    let config = EngineConfig::from_env();

    let stdin = std::io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let mut line = String::new();
    let mut session_opt: Option<Session> = None;
    let mut stdout = std::io::stdout();

    loop {
        line.clear();
        let n = match reader.read_line(&mut line) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(%e, "Failed to read stdin");
                break;
            }
        };
        if n == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let out = process(&config, &mut session_opt, &line);
        reply(&mut stdout, &out);
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUZZLE: &str = r#"{
        "date": "2025-06-01",
        "creator": "Lux",
        "words": ["a1","b1","c1","d1","a2","b2","c2","d2","a3","b3","c3","d3","a4","b4","c4","d4"],
        "groups": [
            {"name": "A", "words": ["a1","a2","a3","a4"]},
            {"name": "B", "words": ["b1","b2","b3","b4"]},
            {"name": "C", "words": ["c1","c2","c3","c4"]},
            {"name": "D", "words": ["d1","d2","d3","d4"]}
        ]
    }"#;

    fn slow_fade() -> EngineConfig {
        EngineConfig {
            fade_delay_ms: 60_000,
            ..EngineConfig::default()
        }
    }

    fn init_inline() -> String {
        format!(r#"{{"type":"Init","catalog":[{PUZZLE}],"today":"2025-06-09"}}"#)
    }

    fn view_of(out: Out) -> SessionView {
        match out {
            Out::Ready { view }
            | Out::State { view }
            | Out::Guessed { view, .. }
            | Out::Committed { view, .. } => view,
            Out::Error { message } => panic!("error reply: {message}"),
        }
    }

    fn select_group(config: &EngineConfig, session: &mut Option<Session>, letter: char) {
        for i in 1..=4 {
            let line = format!(r#"{{"type":"Toggle","word":"{letter}{i}"}}"#);
            view_of(process(config, session, &line));
        }
    }

    #[test]
    fn bad_lines_get_error_replies() {
        let config = slow_fade();
        let mut session = None;
        for line in ["not json", r#"{"type":"Explode"}"#, r#"{"type":"Toggle"}"#] {
            assert!(matches!(
                process(&config, &mut session, line),
                Out::Error { .. }
            ));
        }
        match process(&config, &mut session, r#"{"type":"Guess"}"#) {
            Out::Error { message } => assert_eq!(message, "not initialized"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.is_none());
    }

    #[test]
    fn init_with_inline_catalog() {
        let config = slow_fade();
        let mut session = None;
        let view = view_of(process(&config, &mut session, &init_inline()));
        assert_eq!(view.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(view.creator.as_deref(), Some("Lux"));
        assert_eq!(view.remaining.len(), 16);

        match process(&config, &mut session, &init_inline()) {
            Out::Error { message } => assert_eq!(message, "already initialized"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn init_failures_are_replies() {
        let config = slow_fade();
        let mut session = None;
        let empty = r#"{"type":"Init","catalog":[],"today":"2025-06-01"}"#;
        assert!(matches!(
            process(&config, &mut session, empty),
            Out::Error { .. }
        ));
        let missing = r#"{"type":"Init","catalog_path":"/nonexistent/catalog.json"}"#;
        assert!(matches!(
            process(&config, &mut session, missing),
            Out::Error { .. }
        ));
        assert!(session.is_none());
    }

    #[test]
    fn commit_without_ticket_takes_the_pending_one() {
        let config = slow_fade();
        let mut session = None;
        view_of(process(&config, &mut session, &init_inline()));
        select_group(&config, &mut session, 'b');

        match process(&config, &mut session, r#"{"type":"Guess"}"#) {
            Out::Guessed {
                outcome: GuessOutcome::Correct { group, .. },
                view,
            } => {
                assert_eq!(group, "B");
                assert_eq!(view.fading.len(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }

        // Fade has a minute to go.
        match process(&config, &mut session, r#"{"type":"Poll"}"#) {
            Out::Committed { committed, .. } => assert!(!committed),
            other => panic!("unexpected {other:?}"),
        }
        match process(&config, &mut session, r#"{"type":"Commit","ticket":999}"#) {
            Out::Committed { committed, .. } => assert!(!committed),
            other => panic!("unexpected {other:?}"),
        }
        match process(&config, &mut session, r#"{"type":"Commit"}"#) {
            Out::Committed { committed, view } => {
                assert!(committed);
                assert_eq!(view.solved.len(), 1);
                assert_eq!(view.remaining.len(), 12);
                assert_eq!(view.pending, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        match process(&config, &mut session, r#"{"type":"Commit"}"#) {
            Out::Committed { committed, .. } => assert!(!committed),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_configured_catalog_and_db() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.json");
        std::fs::write(&catalog, format!("[{PUZZLE}]")).unwrap();
        let config = EngineConfig {
            catalog: Some(catalog),
            progress_db: Some(dir.path().join("progress.db")),
            ..slow_fade()
        };
        let init = r#"{"type":"Init","today":"2025-06-01"}"#;

        {
            let mut session = None;
            view_of(process(&config, &mut session, init));
            select_group(&config, &mut session, 'c');
            view_of(process(&config, &mut session, r#"{"type":"Guess"}"#));
            view_of(process(&config, &mut session, r#"{"type":"Commit"}"#));
            view_of(process(&config, &mut session, r#"{"type":"Surrender"}"#));
        }

        let mut session = None;
        let view = view_of(process(&config, &mut session, init));
        assert_eq!(view.status, cdx_daily::Status::Lost);
        assert_eq!(view.solved.len(), 1);
        assert_eq!(view.solved[0].name, "C");
        assert_eq!(view.revealed.len(), 3);

        let view = view_of(process(&config, &mut session, r#"{"type":"Reset"}"#));
        assert_eq!(view.status, cdx_daily::Status::Playing);
        assert_eq!(view.remaining.len(), 16);
    }
}
