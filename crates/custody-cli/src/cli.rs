use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "custody",
    about = "Custody ledger: append-only package tracking",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Generate a new writer key and print its address
    Keygen,
    /// Derive the address of an ed25519 public key
    Address(AddressArgs),
    /// Check every package history in a snapshot file
    Verify(SnapshotArgs),
    /// List packages in a snapshot file
    List(SnapshotArgs),
    /// Show one package from a snapshot file
    Show(ShowArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Authorized writer address (0x...)
    #[arg(long)]
    pub owner: Option<String>,
    /// Snapshot file loaded at startup and written on shutdown
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Args)]
pub struct AddressArgs {
    /// Hex-encoded 32-byte ed25519 public key
    pub public_key: String,
}

#[derive(Args)]
pub struct SnapshotArgs {
    pub snapshot: PathBuf,
}

#[derive(Args)]
pub struct ShowArgs {
    pub snapshot: PathBuf,
    pub id: String,
    /// Print the full history
    #[arg(long)]
    pub history: bool,
}
