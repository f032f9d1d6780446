//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `quicknote_core` linkage and environment configuration.
//! - Run the one-shot backend probe and report which storage would serve
//!   requests.
//!
//! # Environment
//! - `.env` is loaded first when present.
//! - `QUICKNOTE_LOG_LEVEL` (default per build mode), `QUICKNOTE_LOG_DIR`
//!   (absolute; stderr when unset).
//! - Backend selection: see `quicknote_core::config::env_vars`.

use log::error;
use quicknote_core::{default_log_level, init_logging, init_stderr_logging, NoteStore};
use std::process::ExitCode;

const LOG_LEVEL_VAR: &str = "QUICKNOTE_LOG_LEVEL";
const LOG_DIR_VAR: &str = "QUICKNOTE_LOG_DIR";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let level = std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| default_log_level().to_string());
    let logging = match std::env::var(LOG_DIR_VAR) {
        Ok(dir) => init_logging(&level, &dir),
        Err(_) => init_stderr_logging(&level),
    };
    if let Err(err) = logging {
        eprintln!("logging disabled: {err}");
    }

    println!("quicknote_core ping={}", quicknote_core::ping());
    println!("quicknote_core version={}", quicknote_core::core_version());

    let store = match NoteStore::from_env() {
        Ok(store) => store,
        Err(err) => {
            error!("event=cli_start module=cli status=error kind={} error={err}", err.kind().as_str());
            eprintln!("error[{}]: {err}", err.kind().as_str());
            return ExitCode::FAILURE;
        }
    };

    let health = store.health().await;
    println!("backend={}", health.backend.unwrap_or("none"));
    println!("connected={}", health.connection.connected);
    if let Some(reason) = health.connection.error.as_deref() {
        println!("reason={reason}");
    }
    println!("storage={}", health.storage.as_str());
    println!("state={:?}", health.state);

    ExitCode::SUCCESS
}
