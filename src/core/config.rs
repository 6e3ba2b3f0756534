// ─── ConfigStore ───
// External settings collaborator. The core treats every value as an opaque
// JSON scalar keyed by string name and does not define the persistence
// format; embedders bring their own backing store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// Callback invoked with the key that changed.
pub type ChangeListener = Box<dyn Fn(&str) + Send + Sync>;

/// Settings collaborator consumed by the resolution and launch pipelines.
///
/// Well-known keys: `JavaPath`, `AutomaticJavaDownload`, `MinMemAlloc`,
/// `MaxMemAlloc`, `PreLaunchCommand`, `PostExitCommand`, `WrapperCommand`,
/// `InstanceAccountId`, `DetachedLaunch`.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn reset(&self, key: &str);
    fn subscribe(&self, listener: ChangeListener);

    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_u64())
    }
}

/// Map-backed store for embedders without a settings system, and for tests.
#[derive(Default)]
pub struct InMemoryConfig {
    values: Mutex<HashMap<String, Value>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl InMemoryConfig {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn notify(&self, key: &str) {
        let listeners = self.listeners.lock().expect("listener lock poisoned");
        for listener in listeners.iter() {
            listener(key);
        }
    }
}

impl ConfigStore for InMemoryConfig {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .expect("config lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values
            .lock()
            .expect("config lock poisoned")
            .insert(key.to_string(), value);
        self.notify(key);
    }

    fn reset(&self, key: &str) {
        self.values
            .lock()
            .expect("config lock poisoned")
            .remove(key);
        self.notify(key);
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .push(listener);
    }
}
