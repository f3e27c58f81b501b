//! Key commands

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use keyhold_core::config::BackendKind;
use keyhold_core::Secret;
use keyhold_store::KeyStore;

use crate::cli::{KeyCommands, KeyCreateArgs, KeyNameArgs};
use crate::output;

pub async fn run(cmd: KeyCommands, config: Option<&Utf8Path>) -> Result<()> {
    let config = super::load_config(config)?;
    if config.store.backend == BackendKind::Mem {
        output::warning("The mem backend does not keep keys after this command exits");
    }
    let store = keyhold_store::open(&config)?;

    match cmd {
        KeyCommands::Create(args) => create(store.as_ref(), args).await,
        KeyCommands::Get(args) => get(store.as_ref(), args).await,
        KeyCommands::Delete(args) => delete(store.as_ref(), args).await,
    }
}

async fn create(store: &dyn KeyStore, args: KeyCreateArgs) -> Result<()> {
    let secret = match (&args.hex, args.generate) {
        (Some(hex), false) => Secret::parse(hex).context("Invalid --hex value")?,
        (None, true) => Secret::generate(),
        _ => bail!("Pass exactly one of --hex or --generate"),
    };

    store
        .create(&args.name, secret.clone())
        .await
        .with_context(|| format!("Failed to create key '{}'", args.name))?;

    output::success(&format!("Created key '{}'", args.name));
    if args.generate {
        output::info("Generated key material, it is shown only once:");
        println!("{}", secret.to_hex());
    }
    Ok(())
}

async fn get(store: &dyn KeyStore, args: KeyNameArgs) -> Result<()> {
    let secret = store
        .get(&args.name)
        .await
        .with_context(|| format!("Failed to get key '{}'", args.name))?;
    println!("{}", secret.to_hex());
    Ok(())
}

async fn delete(store: &dyn KeyStore, args: KeyNameArgs) -> Result<()> {
    store
        .delete(&args.name)
        .await
        .with_context(|| format!("Failed to delete key '{}'", args.name))?;
    output::success(&format!("Deleted key '{}'", args.name));
    Ok(())
}
