use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use custody_ledger::{
    HistoryValidator, LedgerReader, LedgerSnapshot, PackageLedger, ProjectionBuilder,
    ValidationReport,
};
use custody_server::{CustodyServer, ServerConfig};
use custody_types::{Identity, KeyPair, PackageId, Timestamp};
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Keygen => cmd_keygen(format),
        Command::Address(args) => cmd_address(args, format),
        Command::Verify(args) => cmd_verify(args, format),
        Command::List(args) => cmd_list(args, format),
        Command::Show(args) => cmd_show(args, format),
    }
}

/// File config, then environment, then command-line flags.
fn serve_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(owner) = &args.owner {
        config.owner = Some(Identity::from_hex(owner).context("invalid --owner address")?);
    }
    if let Some(snapshot) = &args.snapshot {
        config.snapshot_path = Some(snapshot.clone());
    }
    Ok(config)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = serve_config(&args)?;
    let server = CustodyServer::new(config)?;
    println!(
        "{} custody ledger on {} (owner {})",
        "▶".green().bold(),
        server.config().bind_addr.to_string().bold(),
        server.state().ledger.owner().short_id().cyan()
    );
    server.serve().await?;
    Ok(())
}

fn cmd_keygen(format: OutputFormat) -> anyhow::Result<()> {
    let keypair = KeyPair::generate();
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "address": keypair.identity().to_hex(),
                "public_key": keypair.public_key_hex(),
                "secret_key": keypair.secret_hex(),
            }))?
        ),
        OutputFormat::Text => {
            println!("{} New writer key", "✓".green().bold());
            println!("  Address:    {}", keypair.identity().to_hex().cyan());
            println!("  Public key: {}", keypair.public_key_hex());
            println!("  Secret key: {}", keypair.secret_hex().yellow());
            println!("\n{}", "Keep the secret key private.".dimmed());
        }
    }
    Ok(())
}

fn cmd_address(args: AddressArgs, format: OutputFormat) -> anyhow::Result<()> {
    let identity =
        Identity::from_public_key_hex(&args.public_key).context("invalid public key")?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "address": identity.to_hex() })),
        OutputFormat::Text => println!("{}", identity.to_hex()),
    }
    Ok(())
}

fn report_json(report: &ValidationReport) -> serde_json::Value {
    json!({
        "package": report.package,
        "events": report.event_count,
        "valid": report.is_valid(),
        "violations": report
            .violations
            .iter()
            .map(|v| json!({ "index": v.index, "kind": format!("{:?}", v.kind), "description": v.description }))
            .collect::<Vec<_>>(),
    })
}

fn verify_snapshot(path: &Path) -> anyhow::Result<(LedgerSnapshot, Vec<ValidationReport>)> {
    let snapshot = LedgerSnapshot::read_from(path)?;
    let reports = HistoryValidator::validate_snapshot(&snapshot);
    debug!(path = %path.display(), packages = reports.len(), "snapshot validated");
    Ok((snapshot, reports))
}

fn cmd_verify(args: SnapshotArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (snapshot, reports) = verify_snapshot(&args.snapshot)?;
    let failed = reports.iter().filter(|r| !r.is_valid()).count();

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "version": snapshot.version,
                "owner": snapshot.owner,
                "packages": reports.iter().map(report_json).collect::<Vec<_>>(),
            }))?
        ),
        OutputFormat::Text => {
            println!("Snapshot v{} owned by {}", snapshot.version, snapshot.owner.to_hex().cyan());
            for report in &reports {
                if report.is_valid() {
                    println!("  {} {} ({} events)", "✓".green(), report.package, report.event_count);
                } else {
                    println!("  {} {}", "✗".red().bold(), report.package.to_string().bold());
                    for violation in &report.violations {
                        match violation.index {
                            Some(i) => println!("      [{i}] {}", violation.description),
                            None => println!("      {}", violation.description),
                        }
                    }
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} packages failed validation", reports.len());
    }
    if format == OutputFormat::Text {
        println!("{} {} packages verified", "✓".green().bold(), reports.len());
    }
    Ok(())
}

/// Restore a snapshot into a ledger, which rejects inconsistent histories.
fn open_snapshot(path: &Path) -> anyhow::Result<PackageLedger> {
    let snapshot = LedgerSnapshot::read_from(path)?;
    debug!(
        path = %path.display(),
        version = snapshot.version,
        packages = snapshot.packages.len(),
        "snapshot loaded"
    );
    PackageLedger::restore(snapshot)
        .with_context(|| format!("cannot restore {}", path.display()))
}

fn cmd_list(args: SnapshotArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ledger = open_snapshot(&args.snapshot)?;
    let ids = ledger.package_ids()?;

    match format {
        OutputFormat::Json => {
            let mut rows = Vec::with_capacity(ids.len());
            for id in &ids {
                let last = ledger.last_status(id)?;
                rows.push(json!({ "id": id, "status": last.status, "location": last.location }));
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if ids.is_empty() {
                println!("No packages.");
            }
            for id in &ids {
                let last = ledger.last_status(id)?;
                println!(
                    "{}  {} @ {}",
                    id.to_string().yellow(),
                    last.status.bold(),
                    last.location
                );
            }
        }
    }
    Ok(())
}

fn render_time(ts: Timestamp) -> String {
    ts.to_rfc3339().unwrap_or_else(|| ts.to_string())
}

fn cmd_show(args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ledger = open_snapshot(&args.snapshot)?;
    let id = PackageId::new(args.id)?;
    let tracking = ProjectionBuilder::tracking(&ledger, &id)?;
    let history = if args.history {
        Some(ledger.history(&id)?)
    } else {
        None
    };

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&tracking)?;
            if let Some(history) = &history {
                value["history"] = serde_json::to_value(history)?;
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            let package = &tracking.package;
            println!("Package {}", package.id.to_string().yellow().bold());
            println!("  Route:   {} → {}", package.origin, package.destination);
            println!(
                "  Status:  {} @ {}",
                tracking.last.status.bold(),
                tracking.last.location
            );
            println!("  Created: {}", render_time(tracking.created_at));
            println!("  Updated: {}", render_time(tracking.updated_at));
            if tracking.at_destination {
                println!("  {}", "At destination".green());
            }
            if let Some(history) = &history {
                println!("\nHistory ({} events):", history.len());
                for event in history {
                    println!(
                        "  {}  {:<16} {}",
                        render_time(event.timestamp).dimmed(),
                        event.status,
                        event.location
                    );
                }
            }
        }
    }
    Ok(())
}
