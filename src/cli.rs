use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

use crate::authz::build_cache;
use crate::config::ServerConfig;
use crate::store::{SqliteStore, Store};
use crate::types::TeamId;

fn db_path(data_dir: &Path) -> PathBuf {
    ServerConfig {
        data_dir: data_dir.to_path_buf(),
        ..ServerConfig::default()
    }
    .db_path()
}

/// Initialize store from data directory, checking it exists
pub fn init_store(data_dir: &Path) -> anyhow::Result<SqliteStore> {
    let db_path = db_path(data_dir);

    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run 'tierguard init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}

/// Creates the data directory and database, and seeds the built-in roles.
pub fn run_init(data_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let db_path = db_path(data_dir);
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    println!("Initialized database at {}", db_path.display());
    Ok(())
}

/// Prints the team's authorization cache as pretty JSON.
pub fn run_explain(data_dir: &Path, team_id: TeamId) -> anyhow::Result<()> {
    let store = init_store(data_dir)?;

    let Some(team) = store.get_team(team_id)? else {
        bail!("Team {team_id} not found");
    };

    let cache = build_cache(&store, team.id)
        .with_context(|| format!("failed to build authorization cache for team {}", team.name))?;

    println!("{}", serde_json::to_string_pretty(&cache)?);
    Ok(())
}
