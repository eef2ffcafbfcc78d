use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use path_clean::PathClean;
use spry_core::{
    DependencyTracker, HookError, HookResult, HookUsage, Plugin, PluginContext, ResolveOptions,
    ResourceId, TransformOutput, render_code_frame,
};

use crate::engine::{EngineError, ImportLoader, LoadedImport, RenderRequest};
use crate::provider::{DISABLE_ENV, EngineProvider};

/// Compiles `.less` stylesheets to CSS.
///
/// Every file a stylesheet imports is declared as a watch file of that
/// stylesheet, and `watch_change` maps an imported file back to the
/// stylesheets that pulled it in.
#[derive(Debug)]
pub struct StylesPlugin {
    provider: EngineProvider,
    sourcemap: bool,
    /// Imported file -> stylesheets built from it
    importers: DependencyTracker,
    warned: AtomicBool,
}

impl StylesPlugin {
    pub fn new(provider: EngineProvider) -> Self {
        Self {
            provider,
            sourcemap: false,
            importers: DependencyTracker::new(),
            warned: AtomicBool::new(false),
        }
    }

    /// Plugin with the engine chosen by the environment.
    pub fn from_env() -> Self {
        Self::new(EngineProvider::from_env())
    }

    pub fn with_sourcemap(mut self, sourcemap: bool) -> Self {
        self.sourcemap = sourcemap;
        self
    }

    pub fn provider(&self) -> &EngineProvider {
        &self.provider
    }

    /// Whether `id` is handled by this plugin.
    pub fn is_stylesheet(id: &ResourceId) -> bool {
        id.extension() == Some("less")
    }

    fn unavailable(&self, reason: &str) -> HookError {
        if !self.warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(%reason, "stylesheet engine unavailable, .less files will fail to build");
        }
        HookError::new("Please install a stylesheet engine to compile \"*.less\" files").with_hint(
            format!("{reason}. Unset {DISABLE_ENV} and enable `features.styles` to compile stylesheets."),
        )
    }
}

impl Default for StylesPlugin {
    fn default() -> Self {
        Self::new(EngineProvider::default())
    }
}

#[async_trait]
impl Plugin for StylesPlugin {
    fn name(&self) -> &str {
        "styles"
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::TRANSFORM | HookUsage::WATCH_CHANGE
    }

    async fn transform(
        &self,
        ctx: &PluginContext,
        code: &str,
        id: &ResourceId,
    ) -> HookResult<Option<TransformOutput>> {
        if !Self::is_stylesheet(id) {
            return Ok(None);
        }
        let engine = match &self.provider {
            EngineProvider::Available(engine) => engine,
            EngineProvider::Unavailable { reason } => return Err(self.unavailable(reason)),
        };

        let file = id.to_path(ctx.root());
        let request = RenderRequest {
            code,
            file: &file,
            sourcemap: self.sourcemap,
        };
        let loader = ContextLoader { ctx, importer: id };
        let output = engine
            .render(request, &loader)
            .await
            .map_err(|err| to_hook_error(err, &file))?;

        for import in &output.imports {
            ctx.add_watch_file(import);
        }
        self.importers.replace(id, output.imports.iter().cloned());
        tracing::debug!(
            %id,
            engine = engine.name(),
            imports = output.imports.len(),
            "compiled stylesheet"
        );

        let mut transformed = TransformOutput::code(output.css);
        if let Some(map) = output.map {
            transformed = transformed.with_map(map);
        }
        Ok(Some(transformed))
    }

    fn watch_change(&self, path: &Path) -> Vec<ResourceId> {
        self.importers.dependents(path).into_iter().collect()
    }
}

fn to_hook_error(err: EngineError, file: &Path) -> HookError {
    let message = err.to_string();
    let Some((at, line, column)) = err.location() else {
        return HookError::new(message);
    };

    let mut hook = HookError::new(message).with_location(line, column);
    if at != file {
        hook = hook.with_file(at);
    }
    if let EngineError::Syntax {
        contents: Some(contents),
        ..
    } = &err
    {
        if let Some(frame) = render_code_frame(contents, line, column) {
            hook = hook.with_code_frame(frame);
        }
    }
    hook
}

/// Loads imports relative to the importing file, falling back to the rest
/// of the pipeline for aliases and bare names.
struct ContextLoader<'a> {
    ctx: &'a PluginContext,
    importer: &'a ResourceId,
}

#[async_trait]
impl<'a> ImportLoader for ContextLoader<'a> {
    async fn load(&self, specifier: &str, current_dir: &Path) -> Result<LoadedImport, String> {
        let mut file = specifier.to_string();
        if Path::new(&file).extension().is_none() {
            file.push_str(".less");
        }

        let candidate = current_dir.join(&file).clean();
        if self.ctx.runtime().is_file(&candidate) {
            let contents = self
                .ctx
                .read_to_string(&candidate)
                .await
                .map_err(|e| e.message)?;
            return Ok(LoadedImport {
                path: candidate,
                contents,
            });
        }

        let importer = ResourceId::from_path(self.ctx.root(), &current_dir.join("__import__.less"))
            .unwrap_or_else(|| self.importer.clone());
        let opts = ResolveOptions {
            skip_self: true,
            ..ResolveOptions::default()
        };
        let resolved = self
            .ctx
            .resolve(&file, Some(&importer), opts)
            .await
            .map_err(|e| e.message)?
            .ok_or_else(|| format!("Cannot find '{file}'"))?;

        let path = resolved_path(self.ctx.root(), &resolved.id);
        let contents = self
            .ctx
            .read_to_string(&path)
            .await
            .map_err(|e| e.message)?;
        Ok(LoadedImport { path, contents })
    }
}

/// Filesystem path for a resolved id, which may be absolute or root-relative.
fn resolved_path(root: &Path, id: &str) -> PathBuf {
    let path = Path::new(id);
    if path.starts_with(root) {
        path.clean()
    } else {
        root.join(id.trim_start_matches('/')).clean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn id(path: &str) -> ResourceId {
        ResourceId::from_request(path).unwrap()
    }

    #[test]
    fn resolved_ids_map_into_root() {
        let root = Path::new("/p");
        assert_eq!(resolved_path(root, "/src/a.less"), PathBuf::from("/p/src/a.less"));
        assert_eq!(resolved_path(root, "/p/src/a.less"), PathBuf::from("/p/src/a.less"));
        assert_eq!(resolved_path(root, "src/./a.less"), PathBuf::from("/p/src/a.less"));
    }

    #[tokio::test]
    async fn non_stylesheets_are_declined() {
        let dir = TempDir::new().unwrap();
        let ctx = PluginContext::detached(dir.path());
        let out = StylesPlugin::default()
            .transform(&ctx, "a {}", &id("/a.css"))
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn imports_become_watch_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("theme")).unwrap();
        fs::write(dir.path().join("theme/colors.less"), "@fg: #111;\n").unwrap();

        let ctx = PluginContext::detached(dir.path());
        let plugin = StylesPlugin::default();
        let out = plugin
            .transform(&ctx, "@import \"theme/colors\";\nbody { color: @fg; }", &id("/app.less"))
            .await
            .unwrap()
            .unwrap();

        let colors = dir.path().join("theme/colors.less");
        assert_eq!(out.code, "body { color: #111; }\n");
        assert_eq!(ctx.watch_files(), vec![colors.clone()]);
        assert_eq!(plugin.watch_change(&colors), vec![id("/app.less")]);
        assert!(plugin.watch_change(&dir.path().join("other.less")).is_empty());
    }

    #[tokio::test]
    async fn syntax_errors_carry_a_frame() {
        let dir = TempDir::new().unwrap();
        let ctx = PluginContext::detached(dir.path());
        let err = StylesPlugin::default()
            .transform(&ctx, "a {\n  color: @nope;\n}", &id("/app.less"))
            .await
            .unwrap_err();

        assert_eq!(err.message, "variable @nope is undefined");
        let location = err.location.unwrap();
        assert_eq!((location.line, location.column), (2, 10));
        assert_eq!(location.file, None);
        assert!(err.code_frame.unwrap().contains("> 2 |   color: @nope;"));
    }

    #[tokio::test]
    async fn unavailable_engine_fails_with_a_hint() {
        let dir = TempDir::new().unwrap();
        let ctx = PluginContext::detached(dir.path());
        let plugin = StylesPlugin::new(EngineProvider::unavailable("styles are disabled"));

        for _ in 0..2 {
            let err = plugin
                .transform(&ctx, "a {}", &id("/app.less"))
                .await
                .unwrap_err();
            assert!(err.message.contains("*.less"));
            assert!(err.hint.unwrap().contains(DISABLE_ENV));
        }
        assert!(plugin.warned.load(Ordering::Relaxed));
    }
}
