use std::collections::BTreeMap;

use async_trait::async_trait;
use spry_config::Mode;

use super::is_script;
use crate::diagnostics::HookResult;
use crate::plugin::{HookUsage, Plugin, PluginContext, TransformOutput};
use crate::resource::ResourceId;

const NODE_ENV: &str = "process.env.NODE_ENV";
const META_ENV: &str = "import.meta.env";

/// Inlines `process.env.NODE_ENV` and `import.meta.env` values into scripts.
#[derive(Debug, Clone)]
pub struct ProcessEnvPlugin {
    mode: Mode,
    env: BTreeMap<String, String>,
    /// `import.meta.env` as a JSON object literal
    env_object: String,
}

impl ProcessEnvPlugin {
    pub fn new(mode: Mode, env: BTreeMap<String, String>) -> Self {
        let mut object = env.clone();
        object.insert("MODE".to_string(), mode.as_str().to_string());
        let env_object = serde_json::to_string(&object).unwrap_or_else(|_| "{}".to_string());
        Self {
            mode,
            env,
            env_object,
        }
    }

    fn value_for(&self, key: &str) -> String {
        let value = match key {
            "MODE" => Some(self.mode.as_str()),
            key => self.env.get(key).map(String::as_str),
        };
        match value {
            Some(value) => json_string(value),
            None => "undefined".to_string(),
        }
    }

    fn rewrite(&self, code: &str) -> Option<String> {
        if !code.contains(NODE_ENV) && !code.contains(META_ENV) {
            return None;
        }

        let code = code.replace(NODE_ENV, &json_string(self.mode.as_str()));
        let mut out = String::with_capacity(code.len());
        let mut rest = code.as_str();

        while let Some(pos) = rest.find(META_ENV) {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + META_ENV.len()..];

            let Some(tail) = after.strip_prefix('.') else {
                out.push_str(&self.env_object);
                rest = after;
                continue;
            };

            let key_len = tail
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
                .unwrap_or(tail.len());
            if key_len == 0 {
                out.push_str(META_ENV);
                rest = after;
                continue;
            }

            out.push_str(&self.value_for(&tail[..key_len]));
            rest = &tail[key_len..];
        }

        out.push_str(rest);
        Some(out)
    }
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl Plugin for ProcessEnvPlugin {
    fn name(&self) -> &str {
        "process-env"
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
        if !is_script(id) {
            return Ok(None);
        }
        Ok(self.rewrite(code).map(TransformOutput::code))
    }
}
