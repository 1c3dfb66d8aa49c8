//! One-shot subcommands: script execution and timeline import.

use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Deserialize;

use luftuj_adapter_modbus_tokio::ConnectionRegistry;
use luftuj_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteTimelineRepository,
};
use luftuj_app::interpreter;
use luftuj_app::ports::{Endpoint, TimelineRepository};
use luftuj_domain::script::{CommandScript, Variables};
use luftuj_domain::timeline::{Mode, TimelineEvent};

use crate::config::Config;

#[derive(Debug, Args)]
pub struct RunScriptArgs {
    /// JSON command script.
    pub file: PathBuf,
    /// Initial variable, `name=value`. Repeatable.
    #[arg(long = "var", value_parser = parse_variable)]
    pub vars: Vec<(String, f64)>,
    /// Unit host; defaults to `hru.host`.
    #[arg(long)]
    pub host: Option<String>,
    /// Unit port; defaults to `hru.port`.
    #[arg(long)]
    pub port: Option<u16>,
    /// Modbus unit id; defaults to `hru.unit_id`.
    #[arg(long)]
    pub unit_id: Option<u8>,
}

fn parse_variable(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid value for `{name}`: {err}"))?;
    Ok((name.trim().to_string(), value))
}

impl RunScriptArgs {
    fn endpoint(&self, config: &Config) -> Endpoint {
        Endpoint::new(
            self.host.clone().unwrap_or_else(|| config.hru.host.clone()),
            self.port.unwrap_or(config.hru.port),
            self.unit_id.unwrap_or(config.hru.unit_id),
        )
    }
}

/// Run a script on a temporary client and print the final variables as
/// JSON, sorted by name.
pub async fn run_script(config: &Config, args: RunScriptArgs) -> Result<(), Box<dyn Error>> {
    let endpoint = args.endpoint(config);
    if endpoint.host.trim().is_empty() {
        return Err("no unit host: pass --host or set hru.host".into());
    }
    let script = CommandScript::from_json(&std::fs::read_to_string(&args.file)?)?;
    let variables: Variables = args.vars.into_iter().collect();

    let registry = ConnectionRegistry::new(config.modbus.clone());
    let result = interpreter::run_scoped(&registry, &endpoint, &script, variables).await?;

    let sorted: BTreeMap<String, f64> = result.into_iter().collect();
    println!("{}", serde_json::to_string_pretty(&sorted)?);
    Ok(())
}

/// Contents of an import file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimelineFile {
    modes: Vec<Mode>,
    events: Vec<TimelineEvent>,
}

/// Upsert every mode and event of `file`. Stops at the first invalid entry;
/// entries stored before it stay stored.
pub async fn import_timeline(config: &Config, file: &Path) -> Result<(), Box<dyn Error>> {
    let timeline: TimelineFile = serde_json::from_str(&std::fs::read_to_string(file)?)?;

    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let repo = SqliteTimelineRepository::new(db.pool().clone());

    let result = store_timeline(&repo, timeline).await;
    db.close().await;
    let (modes, events) = result?;
    tracing::info!(modes, events, file = %file.display(), "timeline imported");
    Ok(())
}

async fn store_timeline<T: TimelineRepository>(
    repo: &T,
    timeline: TimelineFile,
) -> Result<(usize, usize), luftuj_domain::error::LuftujError> {
    let modes = timeline.modes.len();
    let events = timeline.events.len();
    for mode in timeline.modes {
        repo.save_mode(mode).await?;
    }
    for event in timeline.events {
        repo.save_event(event).await?;
    }
    Ok((modes, events))
}
