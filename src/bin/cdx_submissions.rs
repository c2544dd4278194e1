//! Storage worker behind the puzzle submission endpoints.
//!
//! `Submit` takes the `POST /api/submit-puzzle` body and answers with its
//! response body and status code; `List` answers with the
//! `GET /api/submissions` body.

use std::io::{BufRead, BufReader, Write};

use cdx_daily::retry::{retry_with_backoff, DEFAULT_ATTEMPTS};
use cdx_daily::submission::{
    SubmissionError, SubmissionStore, SubmitPuzzleRequest, SubmitPuzzleResponse,
};
use cdx_daily::Puzzle;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Msg {
    Init { db_path: String },
    Submit { body: SubmitPuzzleRequest },
    List,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Out {
    Ready,
    Submitted {
        status: u16,
        body: SubmitPuzzleResponse,
    },
    Submissions {
        puzzles: Vec<Puzzle>,
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

fn submit(store: &SubmissionStore, body: &SubmitPuzzleRequest) -> Out {
    let valid = match body.validate() {
        Ok(v) => v,
        Err(e) => {
            return Out::Submitted {
                status: 400,
                body: SubmitPuzzleResponse::rejected(e),
            }
        }
    };

    // Only lock contention is worth another try.
    let stored = retry_with_backoff(
        || match store.insert(&valid) {
            Err(SubmissionError::Sqlite(e)) => Err(e),
            other => Ok(other),
        },
        DEFAULT_ATTEMPTS,
    );
    match stored {
        Ok(Ok(_)) => Out::Submitted {
            status: 200,
            body: SubmitPuzzleResponse::accepted(),
        },
        Ok(Err(e @ SubmissionError::Duplicate)) => Out::Submitted {
            status: 409,
            body: SubmitPuzzleResponse::rejected(e),
        },
        Ok(Err(e)) => Out::Submitted {
            status: 500,
            body: SubmitPuzzleResponse::rejected(e),
        },
        Err(e) => {
            tracing::error!(%e, "Submission insert failed after retries");
            Out::Submitted {
                status: 500,
                body: SubmitPuzzleResponse::rejected("Failed to save puzzle"),
            }
        }
    }
}

fn process(store_opt: &mut Option<SubmissionStore>, line: &str) -> Out {
    let msg: Msg = match serde_json::from_str(line) {
        Ok(m) => m,
        Err(e) => return Out::Error { message: format!("bad json: {e}") },
    };
    match msg {
        Msg::Init { db_path } => match SubmissionStore::open(&db_path) {
            Ok(store) => {
                *store_opt = Some(store);
                Out::Ready
            }
            Err(e) => Out::Error { message: e.to_string() },
        },
        Msg::Submit { body } => match store_opt.as_ref() {
            Some(store) => submit(store, &body),
            None => Out::Error { message: "no db".into() },
        },
        Msg::List => match store_opt.as_ref() {
            Some(store) => match store.puzzles() {
                Ok(puzzles) => Out::Submissions { puzzles },
                Err(e) => Out::Error { message: e.to_string() },
            },
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
    let mut store_opt: Option<SubmissionStore> = None;

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
