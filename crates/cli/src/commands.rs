use crate::error::CliError;
use clap::{Args, Subcommand};
use model::execution::status::StatusRecord;
use std::path::{Path, PathBuf};
use supervisor_config::constants::DEFAULT_STATE_PREFIX;
use supervisor_core::{handoff::CONFIG_DIR, state::sled_store::SledStatusStore};

#[derive(Subcommand)]
pub enum Commands {
    /// Supervise the attempt handed off in the config directory (the default)
    Run,
    /// Print the last status recorded for an execution unit
    Status {
        #[arg(long, help = "Path of the sled status store")]
        store: PathBuf,

        #[arg(long, help = "Execution unit name, e.g. the pod name")]
        unit: String,

        #[arg(long, default_value = DEFAULT_STATE_PREFIX, help = "Key prefix")]
        prefix: String,

        #[arg(long, help = "Print the record as JSON instead of a table")]
        json: bool,
    },
}

/// Bootstrap flags for the supervised run.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, env = "CONFIG_DIR", default_value = CONFIG_DIR)]
    pub config_dir: PathBuf,

    #[arg(long, env = "HANDOFF_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub handoff_poll_interval_ms: u64,

    #[arg(long, env = "HANDOFF_MAX_POLLS", default_value_t = 600)]
    pub handoff_max_polls: usize,
}

pub fn load_status(store: &Path, prefix: &str, unit: &str) -> Result<StatusRecord, CliError> {
    let store = SledStatusStore::open(store).map_err(|source| CliError::StoreOpen {
        path: store.to_path_buf(),
        source,
    })?;

    let key = format!("{prefix}{unit}");
    store.read(&key)?.ok_or(CliError::NoStatus(key))
}

pub fn show_status(store: &Path, prefix: &str, unit: &str, as_json: bool) -> Result<(), CliError> {
    let record = load_status(store, prefix, unit)?;

    if as_json {
        let json = serde_json::to_string_pretty(&record).map_err(CliError::JsonSerialize)?;
        println!("{json}");
    } else {
        print_status_table(&record);
    }
    Ok(())
}

fn print_status_table(record: &StatusRecord) {
    println!("Status for unit '{}':", record.unit.name);
    println!("-----------------------------");
    println!("{:<16} {}", "Namespace", record.unit.namespace);
    println!("{:<16} {}", "Status", record.status);
    println!("{:<16} {}", "Written at", record.written_at.to_rfc3339());
    let payload = record.payload.as_deref().unwrap_or("n/a");
    println!("{:<16} {}", "Payload", payload);
}
