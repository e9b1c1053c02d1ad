//! `project.system.read_text_file`: read a UTF-8 file under the project root.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::HandlerContext;
use crate::descriptor::{CapabilityDescriptor, CapabilityHandler, TypedArgs};
use crate::error::CapabilityError;
use crate::handler::{FileSystemAccess, NAMESPACE};
use crate::types::{RiskLevel, SideEffectScope};

pub const ACTION_TYPE: &str = "project.system.read_text_file";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadTextFileArgs {
    pub path: String,
}

pub struct ReadTextFileHandler;

#[async_trait]
impl<C> CapabilityHandler<C> for ReadTextFileHandler
where
    C: FileSystemAccess + Send + Sync + 'static,
{
    async fn handle(&self, args: Value, ctx: &HandlerContext<C>) -> Result<Value, CapabilityError> {
        let args: ReadTextFileArgs = serde_json::from_value(args)?;
        ctx.signal.check()?;

        let content = ctx.context.file_system().read_text(&args.path).await?;
        tracing::debug!(path = %args.path, bytes = content.len(), "File read");

        Ok(json!({
            "path": args.path,
            "bytes": content.len(),
            "content": content,
        }))
    }
}

pub fn descriptor<C>() -> CapabilityDescriptor<C>
where
    C: FileSystemAccess + Send + Sync + 'static,
{
    CapabilityDescriptor::from_handler(ACTION_TYPE, ReadTextFileHandler)
        .with_namespace(NAMESPACE)
        .with_summary("Read a text file from the project")
        .with_args_schema(json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"],
        }))
        .with_risk_level(RiskLevel::Read)
        .with_side_effect_scope(SideEffectScope::Project)
        .with_reversible(true)
        .with_tag("fs")
        .with_validator(TypedArgs::<ReadTextFileArgs>::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{ctx, MemoryFileSystem};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_content() {
        let fs = Arc::new(MemoryFileSystem::default().with_file("notes.md", "héllo"));
        let out = ReadTextFileHandler
            .handle(json!({"path": "notes.md"}), &ctx(fs, false))
            .await
            .unwrap();
        assert_eq!(out["content"], json!("héllo"));
        assert_eq!(out["bytes"], json!(6));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let fs = Arc::new(MemoryFileSystem::default());
        let err = ReadTextFileHandler
            .handle(json!({"path": "nope.md"}), &ctx(fs, false))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no such file: nope.md");
    }

    #[tokio::test]
    async fn test_cancelled_before_read() {
        let fs = Arc::new(MemoryFileSystem::default().with_file("a", "b"));
        let ctx = ctx(fs, false);
        ctx.signal.cancel();
        let err = ReadTextFileHandler
            .handle(json!({"path": "a"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Cancelled));
    }

    #[test]
    fn test_descriptor_metadata() {
        let d: CapabilityDescriptor<MemoryFileSystem> = descriptor();
        assert_eq!(d.action_type, ACTION_TYPE);
        assert_eq!(d.risk_level, Some(RiskLevel::Read));
        assert_eq!(d.reversible, Some(true));
        assert!(d.validator().is_some());
    }
}
