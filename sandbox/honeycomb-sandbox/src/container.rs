use crate::core::Core;
use crate::error::SandboxError;
use crate::event_bus::EventBus;
use std::{
    any::Any,
    collections::{HashMap, HashSet},
    future::Future,
    pin::Pin,
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::{error, info};

type AnyModule = dyn Any + Send + Sync;
type Factory = Box<dyn Fn(Capabilities) -> BoxFuture<Result<Arc<AnyModule>, SandboxError>> + Send + Sync>;
type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

enum SlotState {
    Empty,
    Constructing,
    Ready(Arc<AnyModule>),
    Failed(String),
}

struct Slot {
    factory: Factory,
    state: Mutex<SlotState>,
}

#[derive(Default, Clone)]
pub struct Policy {
    pub allowed_apis: HashSet<String>,
}

/// Declares a module to be registered: its name, constructor factory,
/// whether it's constructed eagerly at boot, and its capability policy.
pub struct ModuleDef {
    pub name: String,
    pub bootstrap: bool,
    pub policy: Policy,
    pub factory: Factory,
}

impl ModuleDef {
    pub fn new<M, F, Fut>(name: impl Into<String>, bootstrap: bool, policy: Policy, factory: F) -> Self
    where
        M: Send + Sync + 'static,
        F: Fn(Capabilities) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M, SandboxError>> + Send + 'static,
    {
        let boxed_factory: Factory = Box::new(move |caps| {
            let fut = factory(caps);
            Box::pin(async move { fut.await.map(|m| Arc::new(m) as Arc<AnyModule>) })
        });
        Self { name: name.into(), bootstrap, policy, factory: boxed_factory }
    }
}

pub(crate) struct ContainerInner {
    slots: HashMap<String, Slot>,
    policies: HashMap<String, Policy>,
    core: Core,
    events: EventBus,
}

/// The sandbox's module container: lazy, at-most-once construction behind
/// a default-deny capability boundary.
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    pub async fn build(defs: Vec<ModuleDef>) -> Arc<Self> {
        let mut slots = HashMap::new();
        let mut policies = HashMap::new();
        let mut bootstrap_names = Vec::new();
        for def in defs {
            if def.bootstrap {
                bootstrap_names.push(def.name.clone());
            }
            policies.insert(def.name.clone(), def.policy);
            slots.insert(def.name.clone(), Slot { factory: def.factory, state: Mutex::new(SlotState::Empty) });
        }

        let container = Arc::new(Self {
            inner: Arc::new(ContainerInner { slots, policies, core: Core::new(), events: EventBus::new() }),
        });

        // Bootstrap modules are constructed eagerly, after every slot is
        // defined, so their constructors may call into permitted siblings.
        for name in bootstrap_names {
            let caps = Capabilities::new(container.inner.clone(), name.clone());
            if let Err(err) = resolve_any(&container.inner, &name, caps).await {
                error!(module = %name, %err, "bootstrap module construction failed");
            } else {
                info!(module = %name, "bootstrap module constructed");
            }
        }

        container
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn core(&self) -> &Core {
        &self.inner.core
    }

    /// Typed resolution of a module by name, from outside any module's view
    /// (used by the host to kick off dispatch into bootstrap/root modules).
    pub async fn resolve<M: Send + Sync + 'static>(self: &Arc<Self>, name: &str) -> Result<Arc<M>, SandboxError> {
        let caps = Capabilities::new(self.inner.clone(), name.to_string());
        let any = resolve_any(&self.inner, name, caps).await?;
        any.downcast::<M>().map_err(|_| SandboxError::NotFound(name.to_string()))
    }
}

/// Shared at-most-once construction logic used both for host-driven
/// resolution and for sibling access through [`Capabilities::my`].
async fn resolve_any(container: &ContainerInner, name: &str, caps: Capabilities) -> Result<Arc<AnyModule>, SandboxError> {
    let slot = container.slots.get(name).ok_or_else(|| SandboxError::NotFound(name.to_string()))?;
    let mut guard = slot.state.lock().await;
    match &*guard {
        SlotState::Ready(m) => return Ok(m.clone()),
        SlotState::Constructing => return Err(SandboxError::ReentrantConstruction(name.to_string())),
        SlotState::Failed(msg) => return Err(SandboxError::ConstructionFailed(name.to_string(), msg.clone())),
        SlotState::Empty => {}
    }

    *guard = SlotState::Constructing;
    drop(guard);

    let built = (slot.factory)(caps).await;

    let mut guard = slot.state.lock().await;
    match built {
        Ok(module) => {
            *guard = SlotState::Ready(module.clone());
            Ok(module)
        }
        Err(err) => {
            *guard = SlotState::Failed(err.to_string());
            Err(err)
        }
    }
}

/// The restricted, per-module view handed to a factory: `core` is always
/// reachable, sibling access is policy-gated, writes are forbidden by
/// construction (no mutation methods are exposed).
#[derive(Clone)]
pub struct Capabilities {
    container: Arc<ContainerInner>,
    module_name: String,
}

impl Capabilities {
    fn new(container: Arc<ContainerInner>, module_name: String) -> Self {
        Self { container, module_name }
    }

    pub fn core(&self) -> &Core {
        &self.container.core
    }

    pub fn events(&self) -> &EventBus {
        &self.container.events
    }

    /// Resolves a sibling module by name, enforcing the policy map: the
    /// requesting module must have `target` in its `allowed_apis` set.
    /// Unauthorized reads raise [`SandboxError::PolicyViolation`]; unknown
    /// targets raise [`SandboxError::NotFound`].
    pub async fn my<M: Send + Sync + 'static>(&self, target: &str) -> Result<Arc<M>, SandboxError> {
        if !self.container.slots.contains_key(target) {
            return Err(SandboxError::NotFound(target.to_string()));
        }
        if !self.is_allowed(target) {
            return Err(SandboxError::PolicyViolation { module: self.module_name.clone(), target: target.to_string() });
        }

        let caps = Capabilities::new(self.container.clone(), target.to_string());
        let any = resolve_any(&self.container, target, caps).await?;
        any.downcast::<M>().map_err(|_| SandboxError::NotFound(target.to_string()))
    }

    /// Default-deny: a module absent from the policy map (or missing the
    /// target from its `allowed_apis`) has no sibling access.
    fn is_allowed(&self, target: &str) -> bool {
        self.container
            .policies
            .get(&self.module_name)
            .map(|p| p.allowed_apis.contains(target))
            .unwrap_or(false)
    }
}
