use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "slotwise",
    about = "Slotwise -- privacy-preserving appointment booking server",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the JSON-RPC server
    Serve(ServeArgs),
    /// Manage server key material
    Keys(KeysArgs),
    /// Inspect a configuration file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Server configuration (TOML)
    #[arg(short, long, default_value = "slotwise.toml")]
    pub config: PathBuf,

    /// Override the configured listen address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub action: KeysAction,
}

#[derive(Subcommand)]
pub enum KeysAction {
    /// Generate root, token and provider-data keys plus a server config
    Generate(GenerateArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Directory to write `keys.json` and `slotwise.toml` into
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate a configuration file and print a summary
    Check {
        #[arg(short, long, default_value = "slotwise.toml")]
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["slotwise", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.config, PathBuf::from("slotwise.toml"));
            assert!(args.bind.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve_with_bind() {
        let cli = Cli::try_parse_from([
            "slotwise", "serve", "--config", "/etc/slotwise.toml", "--bind", "0.0.0.0:8888",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.config, PathBuf::from("/etc/slotwise.toml"));
            assert_eq!(args.bind, Some("0.0.0.0:8888".parse().unwrap()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        assert!(Cli::try_parse_from(["slotwise", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_keys_generate() {
        let cli = Cli::try_parse_from(["slotwise", "keys", "generate", "--out", "keys", "--force"])
            .unwrap();
        let Command::Keys(KeysArgs {
            action: KeysAction::Generate(args),
        }) = cli.command
        else {
            panic!("wrong command");
        };
        assert_eq!(args.out, PathBuf::from("keys"));
        assert!(args.force);
    }

    #[test]
    fn parse_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["slotwise", "config", "check", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
