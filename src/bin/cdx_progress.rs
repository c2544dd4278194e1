//! Maintenance worker for saved game progress.

use std::io::{BufRead, BufReader, Write};

use cdx_daily::retry::{retry_with_backoff, DEFAULT_ATTEMPTS};
use cdx_daily::{KvProgressStore, PersistedState, ProgressStore, SqliteBackend};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Msg {
    Init { db_path: String },
    Load { date: NaiveDate },
    Clear { dates: Vec<NaiveDate> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Out {
    Ready,
    Progress {
        date: NaiveDate,
        state: Option<PersistedState>,
    },
    Cleared {
        removed: usize,
    },
    Error {
        message: String,
    },
}

fn reply<W: Write>(out: &mut W, msg: &Out) {
    if let Ok(s) = serde_json::to_string(msg) {
        let _ = writeln!(out, "{s}");
    }
}

type Store = KvProgressStore<SqliteBackend>;

fn process(store_opt: &mut Option<Store>, line: &str) -> Out {
    let msg: Msg = match serde_json::from_str(line) {
        Ok(m) => m,
        Err(e) => return Out::Error { message: format!("bad json: {e}") },
    };
    match msg {
        Msg::Init { db_path } => match SqliteBackend::open(&db_path) {
            Ok(backend) => {
                *store_opt = Some(KvProgressStore::new(backend));
                Out::Ready
            }
            Err(e) => Out::Error { message: e.to_string() },
        },
        Msg::Load { date } => match store_opt.as_ref() {
            Some(store) => Out::Progress {
                date,
                state: store.load(date),
            },
            None => Out::Error { message: "no db".into() },
        },
        Msg::Clear { dates } => match store_opt.as_mut() {
            Some(store) => {
                let cleared =
                    retry_with_backoff(|| store.backend_mut().clear_dates(&dates), DEFAULT_ATTEMPTS);
                match cleared {
                    Ok(removed) => {
                        tracing::info!(days = dates.len(), removed, "Cleared saved progress");
                        Out::Cleared { removed }
                    }
                    Err(e) => Out::Error {
                        message: format!("clear failed after retries: {e}"),
                    },
                }
            }
            None => Out::Error { message: "no db".into() },
        },
    }
}

fn main() {
    cdx_daily::init_logging();

    let stdin = std::io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let mut line = String::new();
    let mut stdout = std::io::stdout();
    let mut store_opt: Option<Store> = None;

    loop {
        line.clear();
        let n = match reader.read_line(&mut line) {
            Ok(n) => n,
            Err(_) => break,
        };
        if n == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let out = process(&mut store_opt, &line);
        reply(&mut stdout, &out);
    }
}
