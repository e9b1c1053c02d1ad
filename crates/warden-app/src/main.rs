//! Warden application binary - composition root.
//!
//! Ties the engine together into a single executable:
//! 1. Load configuration from TOML
//! 2. Initialise tracing
//! 3. Register the built-in file capabilities against a rooted file system
//! 4. Build the audit sinks, the idempotency store and the role policy
//! 5. Print the manifest, or execute envelopes and print one result per line

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncReadExt;
use warden_core::config::{AuditConfig, PolicyConfig, WardenConfig};
use warden_core::types::Actor;
use warden_engine::handler::{self, LocalFileSystem};
use warden_engine::{
    ActionEnvelope, AuditSink, CapabilityRegistry, Executor, FanoutAuditSink, Invocation,
    JsonlAuditSink, MemoryIdempotencyStore, RolePolicy, TracingAuditSink,
};

use cli::{CliArgs, Command};

/// Build the audit sink chain described by the `[audit]` section.
///
/// Returns `None` when every sink is disabled.
async fn build_audit_sink(
    config: &AuditConfig,
) -> Result<Option<Arc<dyn AuditSink>>, Box<dyn std::error::Error>> {
    let mut fanout = FanoutAuditSink::new();
    if config.tracing {
        fanout = fanout.with_sink(Arc::new(TracingAuditSink));
    }
    if let Some(ref path) = config.jsonl_path {
        fanout = fanout.with_sink(Arc::new(JsonlAuditSink::open(path).await?));
    }
    if fanout.is_empty() {
        tracing::info!("Auditing disabled");
        return Ok(None);
    }
    let sink: Arc<dyn AuditSink> = Arc::new(fanout);
    Ok(Some(sink))
}

/// Build the role policy from `[policy]`, or `None` when no rules are set.
fn build_policy(config: &PolicyConfig) -> Option<RolePolicy> {
    if config.rules.is_empty() {
        return None;
    }
    let policy = config
        .rules
        .iter()
        .fold(RolePolicy::new(), |policy, rule| {
            policy.require_role(rule.prefix.as_str(), rule.role.as_str())
        });
    Some(policy)
}

/// Wire the registry, store, policy and audit sinks into one executor.
async fn build_executor(
    config: &WardenConfig,
) -> Result<Executor<LocalFileSystem>, Box<dyn std::error::Error>> {
    let mut registry: CapabilityRegistry<LocalFileSystem> = CapabilityRegistry::new();
    handler::register_builtin(&mut registry)?;
    tracing::info!(capabilities = registry.len(), "Registry ready");

    let store = Arc::new(MemoryIdempotencyStore::from_config(&config.idempotency));
    let mut executor = Executor::new(Arc::new(registry))
        .with_config(config.executor.clone())
        .with_idempotency_store(store);
    if let Some(policy) = build_policy(&config.policy) {
        tracing::info!(rules = config.policy.rules.len(), "Role policy enabled");
        executor = executor.with_policy(policy);
    }
    if let Some(sink) = build_audit_sink(&config.audit).await? {
        executor = executor.with_audit_sink(sink);
    }
    Ok(executor)
}

/// Accept either a single envelope object or an array of envelopes.
fn parse_envelopes(input: &str) -> Result<Vec<ActionEnvelope>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    if value.is_array() {
        serde_json::from_value(value)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

async fn read_input(input: &str) -> std::io::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(input).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = WardenConfig::load_or_default(&config_file);

    // Tracing. RUST_LOG wins over flag and config. Logs go to stderr so
    // stdout stays machine-readable.
    let log_level = args.resolve_log_level(&config);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Warden v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(path = %config_file.display(), "Configuration resolved");

    let root = args.resolve_root(&config);
    tracing::debug!(root = %root.display(), "Workspace root resolved");
    let executor = build_executor(&config).await?;

    match args.command {
        Command::Manifest => {
            println!("{}", serde_json::to_string_pretty(&executor.manifest())?);
        }
        Command::Execute {
            input,
            actor,
            roles,
            confirm,
            dry_run,
        } => {
            let envelopes = parse_envelopes(&read_input(&input).await?)?;
            let actor = actor.map(|id| {
                roles
                    .into_iter()
                    .fold(Actor::new(id), |actor, role| actor.with_role(role))
            });
            let fs = Arc::new(LocalFileSystem::new(root));
            tracing::info!(count = envelopes.len(), "Executing envelopes");

            for mut envelope in envelopes {
                if dry_run {
                    envelope.dry_run = Some(true);
                }
                let mut invocation = Invocation::new(envelope, Arc::clone(&fs));
                if let Some(ref actor) = actor {
                    invocation = invocation.with_actor(actor.clone());
                }
                if let Some(ref token) = confirm {
                    invocation = invocation.with_confirmation_token(token.clone());
                }
                let result = executor.execute(invocation).await?;
                println!("{}", serde_json::to_string(&result)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::config::RoleRule;

    #[test]
    fn test_parse_single_envelope() {
        let envelopes =
            parse_envelopes(r#"{"action_type": "project.system.read_text_file", "args": {"path": "a"}}"#)
                .unwrap();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].action_type, "project.system.read_text_file");
    }

    #[test]
    fn test_parse_envelope_array() {
        let envelopes = parse_envelopes(
            r#"[
                {"action_type": "a", "idempotency_key": "k"},
                {"action_type": "b", "dry_run": true}
            ]"#,
        )
        .unwrap();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].idempotency_key.as_deref(), Some("k"));
        assert_eq!(envelopes[1].dry_run, Some(true));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_envelopes("not json").is_err());
        assert!(parse_envelopes(r#"{"args": {}}"#).is_err());
    }

    #[test]
    fn test_no_rules_means_no_role_policy() {
        assert!(build_policy(&PolicyConfig::default()).is_none());
    }

    #[tokio::test]
    async fn test_configured_roles_gate_execution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let fs = Arc::new(LocalFileSystem::new(dir.path()));

        let mut config = WardenConfig::default();
        config.audit.tracing = false;
        config.policy.rules.push(RoleRule {
            prefix: "project.system.".to_string(),
            role: "editor".to_string(),
        });
        let executor = build_executor(&config).await.unwrap();
        let read = || {
            ActionEnvelope::new(
                "project.system.read_text_file",
                serde_json::json!({"path": "notes.txt"}),
            )
        };

        let anonymous = executor
            .execute(Invocation::new(read(), Arc::clone(&fs)))
            .await
            .unwrap();
        assert!(anonymous.blocked_by_policy);
        assert_eq!(
            anonymous.reason.as_deref(),
            Some("Action 'project.system.read_text_file' requires an authenticated actor")
        );

        let outsider = executor
            .execute(
                Invocation::new(read(), Arc::clone(&fs))
                    .with_actor(Actor::new("a").with_role("nothing")),
            )
            .await
            .unwrap();
        assert!(outsider.blocked_by_policy);
        assert_eq!(
            outsider.reason.as_deref(),
            Some("Actor 'a' lacks role 'editor' for 'project.system.read_text_file'")
        );

        let editor = executor
            .execute(
                Invocation::new(read(), Arc::clone(&fs))
                    .with_actor(Actor::new("a").with_role("editor")),
            )
            .await
            .unwrap();
        assert!(!editor.blocked_by_policy);
        assert_eq!(editor.result.unwrap()["content"], "hello");
    }

    #[tokio::test]
    async fn test_audit_sink_disabled() {
        let config = AuditConfig {
            tracing: false,
            jsonl_path: None,
        };
        assert!(build_audit_sink(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_audit_sink_with_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let config = AuditConfig {
            tracing: true,
            jsonl_path: Some(path.to_string_lossy().to_string()),
        };
        assert!(build_audit_sink(&config).await.unwrap().is_some());
        assert!(path.exists());
    }
}
