//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use shardgrid_core::{DialectRegistry, ShardgridConfig};
use shardgrid_scaling::{ScalingJobBuilder, ScalingJobCoordinator, ScalingWorker, StartScalingEvent};
use shardgrid_state::{MetaDataPersistService, StateStore};
use shardgrid_topology::{ResourceTopology, TopologyRegistry, create_data_sources};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

const STATE_FILE: &str = "shardgrid.redb";

pub fn init(database: &str, units: usize) -> anyhow::Result<()> {
    let config = ShardgridConfig::scaffold(database, units);
    print!("{}", config.to_toml_string()?);
    Ok(())
}

pub fn topology(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let dialects = DialectRegistry::with_defaults()?;
    let registry = TopologyRegistry::new();

    for (database, db) in &config.databases {
        let handles = create_data_sources(&db.data_sources);
        let topology = ResourceTopology::new(Some(database.as_str()), &handles, &dialects)
            .with_context(|| format!("building topology of `{database}`"))?;
        registry.publish(database, topology);
    }

    for database in registry.database_names() {
        let Some(topology) = registry.get(&database) else {
            continue;
        };
        println!("database {database}");
        for (name, unit) in topology.storage_units() {
            println!(
                "  {name} -> {} ({})",
                unit.storage_node().name(),
                unit.catalog()
            );
        }
        println!(
            "  instances: {}",
            topology.get_all_instance_data_source_names().join(", ")
        );
    }
    Ok(())
}

pub fn persist(config_path: &Path, data_dir: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&resolve_data_dir(Some(&config), data_dir))?;
    let service = MetaDataPersistService::new(Arc::new(store));

    service.persist_global_rule_configuration(&config.rules, &config.props)?;
    for (database, db) in &config.databases {
        service.persist_configurations(database, &db.data_sources, &db.rules)?;
    }

    let databases = service.load_all_database_names()?;
    info!(databases = databases.len(), "configuration persisted");
    println!("persisted: {}", databases.join(", "));
    Ok(())
}

pub fn create_job(config_path: &Path, data_dir: Option<&Path>, notification: &Path) -> anyhow::Result<()> {
    let event = load_event(notification)?;
    let coordinator = open_coordinator(config_path, data_dir)?;
    match coordinator.create_job(&event)? {
        Some(job) => println!("{} {}", job.job_id(), job.status),
        None => println!("no scaling job required for {}", event.database_name),
    }
    Ok(())
}

pub fn jobs(config_path: &Path, data_dir: Option<&Path>, database: &str) -> anyhow::Result<()> {
    let coordinator = open_coordinator(config_path, data_dir)?;
    for job in coordinator.list_jobs(database)? {
        let policy = job.config.altered_rule_policy()?;
        println!(
            "{} {} shards={} concurrency={} read_batch_size={} write_batch_size={}",
            job.job_id(),
            job.status,
            job.config.shard_total_count,
            job.config.concurrency,
            policy.read_batch_size,
            policy.write_batch_size,
        );
    }
    Ok(())
}

pub fn stop(config_path: &Path, data_dir: Option<&Path>, database: &str, job_id: &str) -> anyhow::Result<()> {
    let coordinator = open_coordinator(config_path, data_dir)?;
    let job = coordinator.stop_job(database, job_id)?;
    println!("{} {}", job.job_id(), job.status);
    Ok(())
}

pub async fn serve(config_path: &Path, data_dir: Option<&Path>, queue_capacity: usize) -> anyhow::Result<()> {
    let coordinator = Arc::new(open_coordinator(config_path, data_dir)?);
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = ScalingWorker::new(coordinator, rx, shutdown_rx).spawn();
    info!("shardgridd serving notifications from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("notification input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<StartScalingEvent>(&line) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            warn!("scaling worker stopped, no longer accepting notifications");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "ignoring malformed notification"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
                break;
            }
        }
    }

    drop(tx);
    let report = worker.await?;
    info!(?report, "shardgridd stopped");
    Ok(())
}

// ── Helpers ────────────────────────────────────────────────────────

fn load_config(path: &Path) -> anyhow::Result<ShardgridConfig> {
    ShardgridConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))
}

/// `--data-dir` wins, then the config file, then the built-in default.
fn resolve_data_dir(config: Option<&ShardgridConfig>, data_dir: Option<&Path>) -> PathBuf {
    match (data_dir, config) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(config)) => config.store.data_dir.clone(),
        (None, None) => shardgrid_core::config::StoreConfig::default().data_dir,
    }
}

fn open_store(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(STATE_FILE);
    let store = StateStore::open(&path)?;
    info!(path = ?path, "state store opened");
    Ok(store)
}

/// The config file is optional for job commands; it only supplies the
/// state directory.
fn open_coordinator(config_path: &Path, data_dir: Option<&Path>) -> anyhow::Result<ScalingJobCoordinator> {
    let config = if config_path.exists() {
        Some(load_config(config_path)?)
    } else {
        None
    };
    let store = open_store(&resolve_data_dir(config.as_ref(), data_dir))?;
    let builder = ScalingJobBuilder::new(Arc::new(DialectRegistry::with_defaults()?));
    Ok(ScalingJobCoordinator::new(Arc::new(store), builder))
}

fn load_event(path: &Path) -> anyhow::Result<StartScalingEvent> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading notification {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}
