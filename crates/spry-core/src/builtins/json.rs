use async_trait::async_trait;

use crate::diagnostics::{HookError, HookResult};
use crate::plugin::{HookUsage, Plugin, PluginContext, TransformOutput};
use crate::resource::ResourceId;

/// Turns `.json` files into ES modules with a default export.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPlugin;

#[async_trait]
impl Plugin for JsonPlugin {
    fn name(&self) -> &str {
        "json"
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::TRANSFORM
    }

    async fn transform(
        &self,
        _ctx: &PluginContext,
        code: &str,
        id: &ResourceId,
    ) -> HookResult<Option<TransformOutput>> {
        if id.extension() != Some("json") {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_str(code).map_err(|e| {
            HookError::new(format!("Invalid JSON: {e}"))
                .with_location(e.line() as u32, e.column() as u32)
        })?;

        let json = serde_json::to_string(&value)
            .map_err(|e| HookError::new(format!("Invalid JSON: {e}")))?;
        Ok(Some(TransformOutput::code(format!("export default {json};"))))
    }
}
