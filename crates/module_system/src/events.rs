//! Registry notifications.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Identity of a module instance as seen by listeners.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleInfo {
    pub id: Uuid,
    pub name: String,
    pub package_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleEvent {
    Loaded(ModuleInfo),
    Unloaded(ModuleInfo),
}

impl ModuleEvent {
    pub fn module(&self) -> &ModuleInfo {
        match self {
            ModuleEvent::Loaded(info) | ModuleEvent::Unloaded(info) => info,
        }
    }
}

/// Receives registry notifications synchronously, after the state change.
///
/// Listeners run with the registry lock held and must not call back into
/// the registry.
pub trait ModuleListener: Send + Sync {
    fn on_event(&self, event: &ModuleEvent);

    /// Drops every subscription or callback that `module` registered.
    ///
    /// Called during unload, before the module's boundary is released.
    fn release_owned_by(&self, _module: &ModuleInfo) {}
}

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn ModuleListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn ModuleListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn emit(&self, event: ModuleEvent) {
        debug!("Emitting {:?}", event);
        for listener in self.listeners.read().iter() {
            listener.on_event(&event);
        }
    }

    pub fn release_owned_by(&self, module: &ModuleInfo) {
        for listener in self.listeners.read().iter() {
            listener.release_owned_by(module);
        }
    }
}

/// Listener that records every event it sees.
#[derive(Default)]
pub struct RecordingListener {
    events: parking_lot::Mutex<Vec<ModuleEvent>>,
    released: parking_lot::Mutex<Vec<ModuleInfo>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ModuleEvent> {
        self.events.lock().clone()
    }

    pub fn released(&self) -> Vec<ModuleInfo> {
        self.released.lock().clone()
    }
}

impl ModuleListener for RecordingListener {
    fn on_event(&self, event: &ModuleEvent) {
        self.events.lock().push(event.clone());
    }

    fn release_owned_by(&self, module: &ModuleInfo) {
        self.released.lock().push(module.clone());
    }
}
