pub mod container;
pub mod core;
pub mod error;
pub mod event_bus;
pub mod plugin;

pub use container::{Capabilities, Container, ModuleDef, Policy};
pub use core::Core;
pub use error::SandboxError;
pub use event_bus::{Event, EventBus};
pub use plugin::{ArgShape, Interceptor, OriginalFuture, Plugin, PluginMode};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Greeter;

    /// Stashes whatever resolving its sibling produced, so the test can
    /// inspect policy enforcement from outside a factory closure.
    struct Caller {
        sibling_result: Result<(), String>,
    }

    #[tokio::test]
    async fn bootstrap_module_constructs_eagerly_and_is_cached() {
        let defs = vec![ModuleDef::new::<Greeter, _, _>("Greeter", true, Policy::default(), |_caps| async { Ok(Greeter) })];
        let container = Container::build(defs).await;
        assert!(container.resolve::<Greeter>("Greeter").await.is_ok());
    }

    #[tokio::test]
    async fn sibling_access_denied_without_policy() {
        let defs = vec![
            ModuleDef::new::<Greeter, _, _>("Greeter", false, Policy::default(), |_caps| async { Ok(Greeter) }),
            ModuleDef::new::<Caller, _, _>("Caller", false, Policy::default(), |caps| async move {
                let sibling_result = caps.my::<Greeter>("Greeter").await.map(|_| ()).map_err(|e| e.to_string());
                Ok(Caller { sibling_result })
            }),
        ];
        let container = Container::build(defs).await;
        let caller = container.resolve::<Caller>("Caller").await.unwrap();
        assert!(caller.sibling_result.is_err());
    }

    #[tokio::test]
    async fn sibling_access_allowed_with_policy() {
        let mut allowed = HashSet::new();
        allowed.insert("Greeter".to_string());
        let defs = vec![
            ModuleDef::new::<Greeter, _, _>("Greeter", false, Policy::default(), |_caps| async { Ok(Greeter) }),
            ModuleDef::new::<Caller, _, _>("Caller", false, Policy { allowed_apis: allowed }, |caps| async move {
                let sibling_result = caps.my::<Greeter>("Greeter").await.map(|_| ()).map_err(|e| e.to_string());
                Ok(Caller { sibling_result })
            }),
        ];
        let container = Container::build(defs).await;
        let caller = container.resolve::<Caller>("Caller").await.unwrap();
        assert!(caller.sibling_result.is_ok());
    }

    #[tokio::test]
    async fn unknown_sibling_is_not_found() {
        let defs = vec![ModuleDef::new::<Caller, _, _>("Caller", false, Policy::default(), |caps| async move {
            let sibling_result = caps.my::<Greeter>("Ghost").await.map(|_| ()).map_err(|e| e.to_string());
            Ok(Caller { sibling_result })
        })];
        let container = Container::build(defs).await;
        let caller = container.resolve::<Caller>("Caller").await.unwrap();
        assert!(caller.sibling_result.is_err());
    }

    #[tokio::test]
    async fn missing_module_resolves_to_not_found() {
        let container = Container::build(vec![]).await;
        let result = container.resolve::<Greeter>("Nobody").await;
        assert!(matches!(result, Err(SandboxError::NotFound(_))));
    }
}
