use async_trait::async_trait;

use crate::diagnostics::HookResult;
use crate::plugin::{HookUsage, Plugin, PluginContext, ResolveOptions, ResolvedId};
use crate::resource::ResourceId;

/// Extensions tried, in order, for extensionless specifiers.
pub const RESOLVE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".mjs", ".cjs"];

/// Resolves extensionless specifiers and directory index files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveExtensionsPlugin;

#[async_trait]
impl Plugin for ResolveExtensionsPlugin {
    fn name(&self) -> &str {
        "resolve-extensions"
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::RESOLVE
    }

    async fn resolve(
        &self,
        ctx: &PluginContext,
        specifier: &str,
        importer: Option<&ResourceId>,
        _opts: &ResolveOptions,
    ) -> HookResult<Option<ResolvedId>> {
        let Some(id) = ResourceId::from_specifier(specifier, importer) else {
            return Ok(None);
        };
        if ctx.runtime().is_file(&id.to_path(ctx.root())) {
            return Ok(None);
        }

        let base = id.as_str();
        let candidates = RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| format!("{base}{ext}"))
            .chain(
                RESOLVE_EXTENSIONS
                    .iter()
                    .map(|ext| format!("{base}/index{ext}")),
            );

        for candidate in candidates {
            if ctx.runtime().is_file(&ctx.root().join(&candidate)) {
                return Ok(Some(ResolvedId::new(format!("/{candidate}"))));
            }
        }
        Ok(None)
    }
}
