//! `project.system.write_text_file`: create or overwrite a UTF-8 file.
//!
//! Honours `dry_run` by reporting what would be written without writing it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::HandlerContext;
use crate::descriptor::{CapabilityDescriptor, CapabilityHandler, TypedArgs};
use crate::error::CapabilityError;
use crate::handler::{FileSystemAccess, NAMESPACE};
use crate::types::{RiskLevel, SideEffectScope};

pub const ACTION_TYPE: &str = "project.system.write_text_file";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteTextFileArgs {
    pub path: String,
    pub content: String,
}

pub struct WriteTextFileHandler;

#[async_trait]
impl<C> CapabilityHandler<C> for WriteTextFileHandler
where
    C: FileSystemAccess + Send + Sync + 'static,
{
    async fn handle(&self, args: Value, ctx: &HandlerContext<C>) -> Result<Value, CapabilityError> {
        let args: WriteTextFileArgs = serde_json::from_value(args)?;
        let bytes = args.content.len();

        if ctx.dry_run {
            return Ok(json!({"dry_run": true, "path": args.path, "bytes": bytes}));
        }

        ctx.signal.check()?;
        ctx.context
            .file_system()
            .write_text(&args.path, &args.content)
            .await?;
        tracing::info!(path = %args.path, bytes, "File written");

        Ok(json!({"path": args.path, "bytes": bytes}))
    }
}

pub fn descriptor<C>() -> CapabilityDescriptor<C>
where
    C: FileSystemAccess + Send + Sync + 'static,
{
    CapabilityDescriptor::from_handler(ACTION_TYPE, WriteTextFileHandler)
        .with_namespace(NAMESPACE)
        .with_summary("Write a text file in the project")
        .with_description("Creates parent directories as needed and overwrites existing files.")
        .with_args_schema(json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
            },
            "required": ["path", "content"],
        }))
        .with_risk_level(RiskLevel::Write)
        .with_side_effect_scope(SideEffectScope::Project)
        .with_supports_dry_run(true)
        .with_tag("fs")
        .with_validator(TypedArgs::<WriteTextFileArgs>::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{ctx, MemoryFileSystem};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writes_file() {
        let fs = Arc::new(MemoryFileSystem::default());
        let out = WriteTextFileHandler
            .handle(json!({"path": "x.txt", "content": "abc"}), &ctx(fs.clone(), false))
            .await
            .unwrap();
        assert_eq!(out, json!({"path": "x.txt", "bytes": 3}));
        assert_eq!(fs.get("x.txt").as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let fs = Arc::new(MemoryFileSystem::default());
        let out = WriteTextFileHandler
            .handle(json!({"path": "x.txt", "content": "abc"}), &ctx(fs.clone(), true))
            .await
            .unwrap();
        assert_eq!(out, json!({"dry_run": true, "path": "x.txt", "bytes": 3}));
        assert!(fs.get("x.txt").is_none());
    }

    #[tokio::test]
    async fn test_missing_content_is_rejected() {
        let fs = Arc::new(MemoryFileSystem::default());
        let err = WriteTextFileHandler
            .handle(json!({"path": "x.txt"}), &ctx(fs, false))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Json(_)));
    }

    #[tokio::test]
    async fn test_validator_rejects_wrong_types() {
        let d: CapabilityDescriptor<MemoryFileSystem> = descriptor();
        let err = d
            .validator()
            .unwrap()
            .validate(json!({"path": 7, "content": "abc"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid type"));
    }
}
