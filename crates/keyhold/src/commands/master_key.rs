//! Master key commands

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use keyhold_core::kms::generate_key_file;

use crate::cli::{MasterKeyCommands, MasterKeyGenerateArgs};
use crate::output;

const DEFAULT_KEY_FILE: &str = "~/.keyhold/master.key";

pub async fn run(cmd: MasterKeyCommands, config: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        MasterKeyCommands::Generate(args) => generate(args, config),
    }
}

fn generate(args: MasterKeyGenerateArgs, config: Option<&Utf8Path>) -> Result<()> {
    let path = match args.output {
        Some(path) => path,
        None => {
            let config = super::load_config(config)?;
            match config.kms {
                Some(kms) => Utf8PathBuf::from_path_buf(kms.key_file).map_err(|p| {
                    anyhow::anyhow!("kms.key_file is not valid UTF-8: {}", p.display())
                })?,
                None => Utf8PathBuf::from(DEFAULT_KEY_FILE),
            }
        }
    };

    generate_key_file(path.as_std_path(), args.force)?;

    output::success(&format!("Generated master key file {}", path));
    output::info("Set kms.key and kms.key_file in config.yaml to encrypt keys at rest");
    Ok(())
}
