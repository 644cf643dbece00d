mod backup;
mod config;
mod dashboard;
mod db;
mod error;
mod grade;
mod guard;
mod ipc;
mod logging;
mod snapshot;
mod store;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cfg = match config::load_from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("resultsd: invalid configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(cfg.log_filter.as_deref());

    let mut state = match ipc::AppState::new(&cfg) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "failed to open store");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(backend = state.snapshot.backend(), "resultsd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let body = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{body}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    ExitCode::SUCCESS
}
