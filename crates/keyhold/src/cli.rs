//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{ArgGroup, Args, Parser, Subcommand};

/// Keyhold - cached, optionally encrypted secret key storage
#[derive(Parser, Debug)]
#[command(name = "keyhold")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config.yaml (defaults to ~/.keyhold/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, read and delete keys
    #[command(subcommand)]
    Key(KeyCommands),

    /// Master key management for encryption at rest
    #[command(subcommand)]
    MasterKey(MasterKeyCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum KeyCommands {
    /// Store a new key
    Create(KeyCreateArgs),

    /// Print a key as hex
    Get(KeyNameArgs),

    /// Delete a key
    Delete(KeyNameArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("material").required(true).args(["hex", "generate"])))]
pub struct KeyCreateArgs {
    /// Key name
    pub name: String,

    /// Hex encoded key material to store
    #[arg(long, value_name = "HEX")]
    pub hex: Option<String>,

    /// Generate a random 256-bit key and print it once
    #[arg(long)]
    pub generate: bool,
}

#[derive(Args, Debug)]
pub struct KeyNameArgs {
    /// Key name
    pub name: String,
}

#[derive(Subcommand, Debug)]
pub enum MasterKeyCommands {
    /// Write a new random master key file
    Generate(MasterKeyGenerateArgs),
}

#[derive(Args, Debug)]
pub struct MasterKeyGenerateArgs {
    /// Output file (defaults to kms.key_file, then ~/.keyhold/master.key)
    #[arg(short, long)]
    pub output: Option<Utf8PathBuf>,

    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
