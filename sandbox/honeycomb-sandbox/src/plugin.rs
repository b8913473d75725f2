use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// The three extension modes a plugin may apply to a target method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginMode {
    Pre,
    Post,
    Override,
}

/// How the wrapped original method expects its arguments, so a pre-mode
/// plugin's return value can be checked against that convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// A single non-array JSON object is the sole argument.
    Object,
    /// A JSON array of positional arguments.
    Positional,
}

/// A plugin wraps a single named method on a single target module. The
/// handler's meaning depends on `mode()`:
/// - `Pre`: called with the caller's args; its return value (if any)
///   replaces the args forwarded to the original.
/// - `Post`: called with `(args, result)` after the original ran; its
///   return value is ignored, the original result is always preserved.
/// - `Override`: called instead of the original; falls back to the
///   original on handler failure.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn target(&self) -> &str;
    fn mode(&self) -> PluginMode;
    fn methods(&self) -> &[String];

    async fn handle(
        &self,
        method: &str,
        args: serde_json::Value,
        result: Option<serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, String>;
}

pub type BoxedPlugin = Arc<dyn Plugin>;
pub type OriginalFuture = std::pin::Pin<Box<dyn std::future::Future<Output = serde_json::Value> + Send>>;

/// Composes the plugins registered against one method into a single
/// callable, built once at module construction time.
pub struct Interceptor {
    method: String,
    arg_shape: ArgShape,
    plugins: Vec<BoxedPlugin>,
}

/// What a pre-mode plugin's return value means for the args forwarded to
/// the original, per the shape rule: an object rewrites an object-shaped
/// original, an array rewrites a positional-shaped original, `null` means
/// "forward the caller's args unchanged", and anything else is a shape
/// mismatch that aborts pre-mode wrapping for this call.
enum PreOutcome {
    Rewrite(Value),
    KeepOriginal,
    Abort,
}

fn classify_pre_return(shape: ArgShape, value: &Value) -> PreOutcome {
    match (shape, value) {
        (_, Value::Null) => PreOutcome::KeepOriginal,
        (ArgShape::Object, Value::Object(_)) => PreOutcome::Rewrite(value.clone()),
        (ArgShape::Positional, Value::Array(_)) => PreOutcome::Rewrite(value.clone()),
        _ => PreOutcome::Abort,
    }
}

impl Interceptor {
    pub fn new(method: impl Into<String>, arg_shape: ArgShape, plugins: Vec<BoxedPlugin>) -> Self {
        Self { method: method.into(), arg_shape, plugins }
    }

    /// Runs `original` through every applicable mode. Plugin handler
    /// failures never abort the call: `pre`/`override` fall back to the
    /// original with the original args; `post` just logs and keeps the
    /// original result.
    pub async fn call(&self, args: Value, original: impl Fn(Value) -> OriginalFuture) -> Value {
        let mut effective_args = args.clone();

        for plugin in self.plugins.iter().filter(|p| p.mode() == PluginMode::Pre) {
            match plugin.handle(&self.method, effective_args.clone(), None).await {
                Ok(Some(value)) => match classify_pre_return(self.arg_shape, &value) {
                    PreOutcome::Rewrite(rewritten) => effective_args = rewritten,
                    PreOutcome::KeepOriginal => {}
                    PreOutcome::Abort => {
                        warn!(
                            method = %self.method,
                            "pre-mode plugin returned a shape incompatible with the original's argument convention, aborting pre-mode wrapping"
                        );
                        effective_args = args.clone();
                        break;
                    }
                },
                Ok(None) => {}
                Err(err) => warn!(method = %self.method, %err, "pre-mode plugin failed, falling through to original args"),
            }
        }

        let mut result = None;
        for plugin in self.plugins.iter().filter(|p| p.mode() == PluginMode::Override) {
            match plugin.handle(&self.method, effective_args.clone(), None).await {
                Ok(Some(value)) => {
                    result = Some(value);
                    break;
                }
                Ok(None) | Err(_) => {
                    warn!(method = %self.method, "override-mode plugin declined or failed, falling through to original");
                }
            }
        }

        let result = match result {
            Some(r) => r,
            None => original(effective_args.clone()).await,
        };

        for plugin in self.plugins.iter().filter(|p| p.mode() == PluginMode::Post) {
            if let Err(err) = plugin.handle(&self.method, effective_args.clone(), Some(result.clone())).await {
                warn!(method = %self.method, %err, "post-mode plugin failed, original result preserved");
            }
        }

        result
    }
}

/// Validates a plugin against its target's known method set. Unknown
/// method names are skipped with a warning rather than rejecting the
/// whole plugin.
pub fn applicable_methods(plugin: &dyn Plugin, known_methods: &[String]) -> Vec<String> {
    plugin
        .methods()
        .iter()
        .filter(|m| {
            let known = known_methods.contains(m);
            if !known {
                warn!(target = %plugin.target(), method = %m, "plugin names a method the target does not expose, skipping");
            }
            known
        })
        .cloned()
        .collect()
}
