use async_trait::async_trait;

use super::is_script;
use crate::diagnostics::HookResult;
use crate::plugin::{HookUsage, Plugin, PluginContext, TransformOutput};
use crate::resource::ResourceId;

/// Hot context factory installed by the browser client.
pub const HOT_CONTEXT_GLOBAL: &str = "__spry_hot__";

/// Gives modules that use `import.meta.hot` a hot context.
///
/// The prelude is kept on the first line so line numbers in the module stay
/// unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct HotAcceptPlugin;

#[async_trait]
impl Plugin for HotAcceptPlugin {
    fn name(&self) -> &str {
        "hot-accept"
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
        if !is_script(id) || !code.contains("import.meta.hot") {
            return Ok(None);
        }

        let prelude =
            format!("import.meta.hot = globalThis.{HOT_CONTEXT_GLOBAL}?.(import.meta.url);");
        Ok(Some(TransformOutput::code(format!("{prelude}{code}"))))
    }
}
