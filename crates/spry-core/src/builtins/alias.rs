use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::diagnostics::HookResult;
use crate::plugin::{HookUsage, Plugin, PluginContext, ResolveOptions, ResolvedId};
use crate::resource::ResourceId;

/// Rewrites aliased specifier prefixes, then resolves the result through
/// the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct AliasPlugin {
    /// Longest prefix first
    entries: Vec<(String, String)>,
}

impl AliasPlugin {
    pub fn new(alias: BTreeMap<String, String>) -> Self {
        let mut entries: Vec<(String, String)> = alias
            .into_iter()
            .map(|(from, to)| {
                let from = from.trim_start_matches('/').to_string();
                let to = to
                    .trim_start_matches("./")
                    .trim_start_matches('/')
                    .to_string();
                (from, to)
            })
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    /// Root-relative path for an aliased specifier.
    fn rewrite(&self, specifier: &str) -> Option<String> {
        let bare = specifier.trim_start_matches('/');
        self.entries.iter().find_map(|(from, to)| {
            let rest = bare.strip_prefix(from.as_str())?;
            if rest.is_empty() || from.ends_with('/') {
                Some(format!("/{to}{rest}"))
            } else if let Some(rest) = rest.strip_prefix('/') {
                Some(format!("/{}/{rest}", to.trim_end_matches('/')))
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl Plugin for AliasPlugin {
    fn name(&self) -> &str {
        "alias"
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::RESOLVE
    }

    async fn resolve(
        &self,
        ctx: &PluginContext,
        specifier: &str,
        importer: Option<&ResourceId>,
        opts: &ResolveOptions,
    ) -> HookResult<Option<ResolvedId>> {
        let Some(rewritten) = self.rewrite(specifier) else {
            return Ok(None);
        };

        let opts = ResolveOptions {
            skip_self: true,
            ..*opts
        };
        let resolved = ctx.resolve(&rewritten, importer, opts).await?;
        Ok(Some(resolved.unwrap_or_else(|| ResolvedId::new(rewritten))))
    }
}
