use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use rand::rngs::OsRng;
use rand::RngCore;
use slotwise_crypto::{Key, KeyAlgorithm, KeyRole};
use slotwise_server::{ServerConfig, SlotwiseServer};
use slotwise_service::Settings;
use slotwise_store::InMemoryDatabase;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Keys(KeysArgs {
            action: KeysAction::Generate(args),
        }) => cmd_keys_generate(args),
        Command::Config(ConfigArgs {
            action: ConfigAction::Check { config },
        }) => cmd_config_check(&config),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    let db = Arc::new(InMemoryDatabase::with_lock_timeout(config.service.lock_timeout()));
    let server = SlotwiseServer::new(config, db)?;
    if server.config().service.allow_reset {
        tracing::warn!("resetDB is enabled");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_keys_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let keys_path = args.out.join("keys.json");
    let config_path = args.out.join("slotwise.toml");
    for path in [&keys_path, &config_path] {
        if path.exists() && !args.force {
            bail!("{} exists, pass --force to overwrite", path.display());
        }
    }

    let (keys, config) = generate_material()?;
    std::fs::create_dir_all(&args.out)?;
    std::fs::write(&keys_path, serde_json::to_string_pretty(&keys)?)?;
    std::fs::write(&config_path, toml::to_string(&config)?)?;

    println!("{} Generated server key material", "✓".green().bold());
    for key in &keys {
        println!("  {:<14} {}", key.name.bold(), key.actor_id().to_string().cyan());
    }
    println!("  private keys: {}", keys_path.display().to_string().yellow());
    println!("  config:       {}", config_path.display().to_string().yellow());
    Ok(())
}

/// Fresh root, token and provider-data keys and a config that uses them.
///
/// The root private key only lands in the key file; the server config
/// carries its public half.
fn generate_material() -> anyhow::Result<(Vec<Key>, ServerConfig)> {
    let root = Key::generate("root", KeyRole::Root, KeyAlgorithm::Ecdsa);
    let token = Key::generate("token", KeyRole::Token, KeyAlgorithm::Ecdsa);
    let provider_data = Key::generate("provider-data", KeyRole::ProviderData, KeyAlgorithm::Ecdh);

    let mut secret = vec![0u8; 32];
    OsRng.fill_bytes(&mut secret);

    let settings = Settings::new(
        vec![root.public_key.clone()],
        token.signing_key()?.to_bytes(),
        provider_data.public_key.clone(),
        secret,
    );
    settings.validate()?;
    Ok((vec![root, token, provider_data], ServerConfig::new(settings)))
}

fn cmd_config_check(path: &Path) -> anyhow::Result<()> {
    let config =
        ServerConfig::load(path).with_context(|| format!("loading {}", path.display()))?;
    let service = &config.service;
    println!("{} {} is valid", "✓".green().bold(), path.display());
    println!("  bind:              {}", config.bind_addr);
    println!("  root keys:         {}", service.root_keys.len());
    println!("  signature window:  {}s", service.signature_window_secs);
    println!(
        "  codes:             user {}, provider {}",
        on_off(service.codes.user.enabled),
        on_off(service.codes.provider.enabled)
    );
    println!("  retention:         {} days", service.appointment_retention_days);
    if service.allow_reset {
        println!("  {}", "resetDB enabled".red().bold());
    }
    Ok(())
}

fn on_off(enabled: bool) -> colored::ColoredString {
    if enabled {
        "on".green()
    } else {
        "off".yellow()
    }
}
