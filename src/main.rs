//! Checks a puzzle catalog and reports which entry is today's.
//!
//! Reads `{"puzzles": [...], "today": "YYYY-MM-DD"}` from stdin (`today` is
//! optional and defaults to the local date) and writes one JSON report.

use std::io::{Read, Write};

use cdx_daily::{select_puzzle, Catalog, Puzzle};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct Input {
    puzzles: Vec<serde_json::Value>,
    today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct Problem {
    index: usize,
    date: Option<String>,
    reason: String,
}

#[derive(Debug, Serialize)]
struct Pick {
    date: NaiveDate,
    index: usize,
    creator: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Output {
    Report {
        valid: usize,
        problems: Vec<Problem>,
        today: NaiveDate,
        pick: Option<Pick>,
    },
    Error {
        message: String,
    },
}

fn check(inp: Input) -> Output {
    let today = inp.today.unwrap_or_else(cdx_daily::selector::today_local);

    let mut problems = Vec::new();
    let mut puzzles: Vec<Puzzle> = Vec::with_capacity(inp.puzzles.len());
    for (index, value) in inp.puzzles.into_iter().enumerate() {
        let date = value.get("date").and_then(|d| d.as_str()).map(str::to_owned);
        match serde_json::from_value::<Puzzle>(value) {
            Ok(p) => puzzles.push(p),
            Err(e) => problems.push(Problem {
                index,
                date,
                reason: e.to_string(),
            }),
        }
    }
    let valid = puzzles.len();

    let catalog = match Catalog::new(puzzles) {
        Ok(c) => c,
        Err(e) => {
            return Output::Error {
                message: e.to_string(),
            }
        }
    };
    let pick = select_puzzle(&catalog, today).ok().map(|p| Pick {
        date: p.date(),
        index: catalog
            .puzzles()
            .iter()
            .position(|q| q.date() == p.date())
            .unwrap_or_default(),
        creator: p.creator().map(str::to_owned),
    });

    Output::Report {
        valid,
        problems,
        today,
        pick,
    }
}

fn main() {
    cdx_daily::init_logging();

    let mut buf = String::new();
    let out = match std::io::stdin().read_to_string(&mut buf) {
        Err(e) => Output::Error {
            message: format!("failed to read stdin: {e}"),
        },
        Ok(_) => match serde_json::from_str::<Input>(&buf) {
            Ok(inp) => check(inp),
            Err(e) => Output::Error {
                message: format!("bad json: {e}"),
            },
        },
    };

    let failed = matches!(out, Output::Error { .. });
    let mut stdout = std::io::stdout();
    if let Ok(s) = serde_json::to_string(&out) {
        let _ = stdout.write_all(s.as_bytes());
        let _ = stdout.write_all(b"\n");
    }
    if failed {
        std::process::exit(1);
    }
}
