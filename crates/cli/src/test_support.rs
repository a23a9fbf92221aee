use std::sync::{Mutex, MutexGuard, OnceLock};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Serializes environment mutation across tests and restores the touched
/// variables when dropped.
pub(crate) struct EnvScope {
    saved: Vec<(&'static str, Option<String>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvScope {
    /// Locks the environment and clears `keys` for the duration of the scope.
    pub(crate) fn clean(keys: &[&'static str]) -> Self {
        let guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let saved = keys.iter().map(|&k| (k, std::env::var(k).ok())).collect();
        let scope = Self {
            saved,
            _guard: guard,
        };
        for &key in keys {
            scope.remove(key);
        }
        scope
    }

    pub(crate) fn set(&self, key: &str, value: &str) {
        // SAFETY: every mutation happens while holding the env lock.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    pub(crate) fn remove(&self, key: &str) {
        // SAFETY: every mutation happens while holding the env lock.
        unsafe {
            std::env::remove_var(key);
        }
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => self.set(key, v),
                None => self.remove(key),
            }
        }
    }
}
