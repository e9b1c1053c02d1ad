//! `project.system.delete_file`: remove a file under the project root.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::HandlerContext;
use crate::descriptor::{CapabilityDescriptor, CapabilityHandler, Precondition, TypedArgs};
use crate::error::CapabilityError;
use crate::handler::{FileSystemAccess, NAMESPACE};
use crate::types::{ActionEnvelope, RiskLevel, SideEffectScope};

pub const ACTION_TYPE: &str = "project.system.delete_file";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteFileArgs {
    pub path: String,
}

/// Blocks the call when the target file is not there.
pub struct FileExists;

#[async_trait]
impl<C> Precondition<C> for FileExists
where
    C: FileSystemAccess + Send + Sync + 'static,
{
    async fn check(
        &self,
        ctx: &HandlerContext<C>,
        envelope: &ActionEnvelope,
    ) -> Result<(), CapabilityError> {
        let path = envelope
            .args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::msg("path is required"))?;
        if ctx.context.file_system().exists(path).await? {
            Ok(())
        } else {
            Err(CapabilityError::msg(format!("file '{}' does not exist", path)))
        }
    }
}

pub struct DeleteFileHandler;

#[async_trait]
impl<C> CapabilityHandler<C> for DeleteFileHandler
where
    C: FileSystemAccess + Send + Sync + 'static,
{
    async fn handle(&self, args: Value, ctx: &HandlerContext<C>) -> Result<Value, CapabilityError> {
        let args: DeleteFileArgs = serde_json::from_value(args)?;

        if ctx.dry_run {
            return Ok(json!({"dry_run": true, "path": args.path, "deleted": false}));
        }

        ctx.signal.check()?;
        ctx.context.file_system().remove(&args.path).await?;
        tracing::info!(path = %args.path, "File deleted");

        Ok(json!({"path": args.path, "deleted": true}))
    }
}

pub fn descriptor<C>() -> CapabilityDescriptor<C>
where
    C: FileSystemAccess + Send + Sync + 'static,
{
    CapabilityDescriptor::from_handler(ACTION_TYPE, DeleteFileHandler)
        .with_namespace(NAMESPACE)
        .with_summary("Delete a file from the project")
        .with_args_schema(json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"],
        }))
        .with_risk_level(RiskLevel::Destructive)
        .with_side_effect_scope(SideEffectScope::Project)
        .with_reversible(false)
        .with_tag("fs")
        .with_validator(TypedArgs::<DeleteFileArgs>::new())
        .with_precondition(FileExists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{ctx, MemoryFileSystem};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_deletes_file() {
        let fs = Arc::new(MemoryFileSystem::default().with_file("old.log", "x"));
        let out = DeleteFileHandler
            .handle(json!({"path": "old.log"}), &ctx(fs.clone(), false))
            .await
            .unwrap();
        assert_eq!(out, json!({"path": "old.log", "deleted": true}));
        assert!(fs.get("old.log").is_none());
    }

    #[tokio::test]
    async fn test_dry_run_keeps_file() {
        let fs = Arc::new(MemoryFileSystem::default().with_file("old.log", "x"));
        let out = DeleteFileHandler
            .handle(json!({"path": "old.log"}), &ctx(fs.clone(), true))
            .await
            .unwrap();
        assert_eq!(out["deleted"], json!(false));
        assert!(fs.get("old.log").is_some());
    }

    #[tokio::test]
    async fn test_precondition_requires_existing_file() {
        let fs = Arc::new(MemoryFileSystem::default().with_file("here.txt", ""));
        let ctx = ctx(fs, false);

        let present = ActionEnvelope::new(ACTION_TYPE, json!({"path": "here.txt"}));
        assert!(FileExists.check(&ctx, &present).await.is_ok());

        let absent = ActionEnvelope::new(ACTION_TYPE, json!({"path": "gone.txt"}));
        let err = FileExists.check(&ctx, &absent).await.unwrap_err();
        assert_eq!(err.to_string(), "file 'gone.txt' does not exist");

        let malformed = ActionEnvelope::new(ACTION_TYPE, json!({}));
        assert!(FileExists.check(&ctx, &malformed).await.is_err());
    }

    #[test]
    fn test_descriptor_is_destructive() {
        let d: CapabilityDescriptor<MemoryFileSystem> = descriptor();
        assert_eq!(d.risk_level, Some(RiskLevel::Destructive));
        assert_eq!(d.preconditions().len(), 1);
    }
}
