//! CLI argument definitions for the Warden binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use warden_core::config::WardenConfig;

/// Warden: run capabilities through policy, confirmation and audit.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Directory the built-in file capabilities are confined to.
    #[arg(short = 'r', long = "root", global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the sorted capability manifest as JSON.
    Manifest,

    /// Execute one envelope or a JSON array of envelopes, in order.
    Execute {
        /// Envelope file, or `-` for stdin.
        input: String,

        /// Actor id the calls run as.
        #[arg(long = "actor")]
        actor: Option<String>,

        /// Role granted to the actor (repeatable).
        #[arg(long = "role", requires = "actor")]
        roles: Vec<String>,

        /// Confirmation token supplied with every call.
        #[arg(long = "confirm")]
        confirm: Option<String>,

        /// Force dry-run on every envelope.
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > WARDEN_CONFIG env var > ~/.warden/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("WARDEN_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &WardenConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    /// Resolve the workspace root.
    ///
    /// Priority: --root flag > config file value.
    pub fn resolve_root(&self, config: &WardenConfig) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.general.workspace_root))
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".warden").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".warden").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let args = CliArgs::try_parse_from(["warden", "manifest"]).unwrap();
        assert!(matches!(args.command, Command::Manifest));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_parse_execute_with_flags() {
        let args = CliArgs::try_parse_from([
            "warden",
            "execute",
            "batch.json",
            "--actor",
            "alice",
            "--role",
            "editor",
            "--role",
            "ops",
            "--confirm",
            "tok",
            "--root",
            "/tmp/project",
        ])
        .unwrap();
        match args.command {
            Command::Execute {
                ref input,
                ref actor,
                ref roles,
                ref confirm,
                dry_run,
            } => {
                assert_eq!(input, "batch.json");
                assert_eq!(actor.as_deref(), Some("alice"));
                assert_eq!(roles, &vec!["editor".to_string(), "ops".to_string()]);
                assert_eq!(confirm.as_deref(), Some("tok"));
                assert!(!dry_run);
            }
            Command::Manifest => panic!("expected execute"),
        }
        assert_eq!(args.root, Some(PathBuf::from("/tmp/project")));
    }

    #[test]
    fn test_role_requires_actor() {
        assert!(CliArgs::try_parse_from(["warden", "execute", "-", "--role", "ops"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = WardenConfig::default();
        config.general.log_level = "warn".to_string();
        config.general.workspace_root = "/srv/ws".to_string();

        let args = CliArgs::try_parse_from(["warden", "manifest"]).unwrap();
        assert_eq!(args.resolve_log_level(&config), "warn");
        assert_eq!(args.resolve_root(&config), PathBuf::from("/srv/ws"));

        let args =
            CliArgs::try_parse_from(["warden", "-l", "debug", "--root", "here", "manifest"]).unwrap();
        assert_eq!(args.resolve_log_level(&config), "debug");
        assert_eq!(args.resolve_root(&config), PathBuf::from("here"));
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args = CliArgs::try_parse_from(["warden", "-c", "/etc/warden.toml", "manifest"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/warden.toml"));
    }
}
