//! NAS Provisioner
//!
//! Operator command line for the share provisioning core. Each subcommand
//! loads the driver configuration, runs one driver operation and prints the
//! result as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nas_provisioner::{
    AccessRule, AccessType, ClusteredShareDriver, DriverConfig, DriverFactory, RequestContext,
    Share, ShareDriver, Snapshot,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// NAS Provisioner - NFS/CIFS share provisioning on clustered controllers and LVM
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Driver configuration file (YAML)
    #[arg(long, env = "NAS_CONFIG", default_value = "/etc/nas-provisioner/config.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify the backend prerequisites
    Check,

    /// List aggregates of the clustered controller with their free bytes
    Pools,

    #[command(flatten)]
    Share(ShareCommand),
}

/// Subcommands running against a set-up driver
#[derive(Subcommand, Debug)]
enum ShareCommand {
    /// Print backend capacity
    Stats,

    /// Allocate a container and export it as a share
    CreateShare {
        #[arg(long)]
        id: String,
        /// Size in GiB
        #[arg(long)]
        size: u64,
        #[arg(long, default_value = "nfs")]
        proto: String,
        /// Clone the container from this snapshot
        #[arg(long, requires = "source_share_id")]
        snapshot_id: Option<String>,
        /// Share the snapshot was taken of
        #[arg(long)]
        source_share_id: Option<String>,
    },

    /// Remove the export and release the container of a share
    DeleteShare {
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "nfs")]
        proto: String,
        /// Known export location of the share
        #[arg(long)]
        location: Option<String>,
    },

    /// Snapshot a share
    SnapshotCreate {
        #[arg(long)]
        id: String,
        #[arg(long)]
        share_id: String,
        #[arg(long, default_value = "1")]
        share_size: u64,
    },

    /// Delete a share snapshot
    SnapshotDelete {
        #[arg(long)]
        id: String,
        #[arg(long)]
        share_id: String,
    },

    /// Grant access to a share
    Allow(AccessArgs),

    /// Revoke access to a share
    Deny(AccessArgs),
}

#[derive(clap::Args, Debug)]
struct AccessArgs {
    #[arg(long)]
    share_id: String,
    #[arg(long, default_value = "nfs")]
    proto: String,
    /// Known export location of the share
    #[arg(long)]
    location: Option<String>,
    /// `ip` or `passwd`
    #[arg(long, default_value = "ip")]
    access_type: String,
    /// Host address(es), comma separated, or user name
    #[arg(long)]
    access_to: String,
}

impl AccessArgs {
    fn share(&self) -> anyhow::Result<Share> {
        share_record(&self.share_id, 0, &self.proto, self.location.as_deref())
    }

    fn rule(&self) -> anyhow::Result<AccessRule> {
        let access_type: AccessType = self.access_type.parse()?;
        Ok(AccessRule::new(access_type, self.access_to.clone()))
    }
}

fn share_record(id: &str, size: u64, proto: &str, location: Option<&str>) -> anyhow::Result<Share> {
    let share = Share::new(id, size, proto)?;
    Ok(match location {
        Some(location) => share.with_export_location(location),
        None => share,
    })
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = DriverConfig::from_file(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;

    info!("Starting NAS Provisioner");
    info!("  Version: {}", nas_provisioner::VERSION);
    info!("  Driver: {}", config.driver);

    let ctx = RequestContext::admin();
    let output = match args.command {
        Command::Check => check(&config, &ctx).await?,
        Command::Pools => pools(&config).await?,
        Command::Share(command) => run(command, &config, &ctx).await?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn pools(config: &DriverConfig) -> anyhow::Result<serde_json::Value> {
    let driver = ClusteredShareDriver::new(config.clustered.clone())?;
    let pools = driver.client().get_available_pools().await?;
    Ok(pools
        .iter()
        .map(|(aggregate, free)| json!({ "aggregate": aggregate, "free_bytes": free }))
        .collect())
}

/// Report setup errors before the backend is contacted
async fn check(config: &DriverConfig, ctx: &RequestContext) -> anyhow::Result<serde_json::Value> {
    let driver = DriverFactory::from_config(config)?;
    driver.check_for_setup_error().await?;
    driver.do_setup(ctx).await?;
    Ok(json!({ "backend": driver.backend_name(), "status": "ok" }))
}

async fn run(command: ShareCommand, config: &DriverConfig, ctx: &RequestContext) -> anyhow::Result<serde_json::Value> {
    let driver = DriverFactory::from_config(config)?;
    driver.do_setup(ctx).await?;

    let output = match command {
        ShareCommand::Stats => serde_json::to_value(driver.get_share_stats(true).await?)?,
        ShareCommand::CreateShare {
            id,
            size,
            proto,
            snapshot_id,
            source_share_id,
        } => {
            let share = share_record(&id, size, &proto, None)?;
            match snapshot_id.zip(source_share_id) {
                Some((snapshot_id, source_share_id)) => {
                    let snapshot = Snapshot::new(snapshot_id, source_share_id, size);
                    driver.allocate_container_from_snapshot(ctx, &share, &snapshot).await?;
                }
                None => driver.allocate_container(ctx, &share).await?,
            }
            driver.create_export(ctx, &share).await?;
            let location = driver.create_share(ctx, &share).await?;
            info!("Share {} available at {}", id, location);
            json!({ "id": id, "export_location": location })
        }
        ShareCommand::DeleteShare { id, proto, location } => {
            let share = share_record(&id, 0, &proto, location.as_deref())?;
            driver.ensure_share(ctx, &share).await?;
            driver.delete_share(ctx, &share).await?;
            driver.remove_export(ctx, &share).await?;
            driver.deallocate_container(ctx, &share).await?;
            json!({ "id": id, "deleted": true })
        }
        ShareCommand::SnapshotCreate {
            id,
            share_id,
            share_size,
        } => {
            driver
                .create_snapshot(ctx, &Snapshot::new(id.as_str(), share_id, share_size))
                .await?;
            json!({ "id": id, "created": true })
        }
        ShareCommand::SnapshotDelete { id, share_id } => {
            driver
                .delete_snapshot(ctx, &Snapshot::new(id.as_str(), share_id, 0))
                .await?;
            json!({ "id": id, "deleted": true })
        }
        ShareCommand::Allow(access) => {
            let share = access.share()?;
            driver.ensure_share(ctx, &share).await?;
            driver.allow_access(ctx, &share, &access.rule()?).await?;
            json!({ "share_id": access.share_id, "access_to": access.access_to, "state": "active" })
        }
        ShareCommand::Deny(access) => {
            let share = access.share()?;
            driver.ensure_share(ctx, &share).await?;
            driver.deny_access(ctx, &share, &access.rule()?).await?;
            json!({ "share_id": access.share_id, "access_to": access.access_to, "state": "deleted" })
        }
    };
    Ok(output)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["reqwest=warn", "hyper=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr so stdout carries only the JSON result.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
