// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the set of capture subprocess pids the daemon is responsible
//! for. Replaces the original's process-wide mutable pid map with a
//! dedicated object behind a mutex, per spec §9's "process-wide mutable
//! maps" design note: `register`, `reap`, and `for_each_on_shutdown` are
//! the only operations exposed.

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RegisteredProcess {
    pub pid: i32,
    pub label: String,
}

#[derive(Default)]
pub struct ProcessRegistry {
    inner: Mutex<HashMap<i32, RegisteredProcess>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pid: i32, label: impl Into<String>) {
        self.inner.lock().insert(pid, RegisteredProcess { pid, label: label.into() });
    }

    /// Remove `pid` from the registry, e.g. once its owning session has
    /// reaped it.
    pub fn reap(&self, pid: i32) {
        self.inner.lock().remove(&pid);
    }

    pub fn is_registered(&self, pid: i32) -> bool {
        self.inner.lock().contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoked once at shutdown to stop every still-registered capture
    /// process. `f` is called outside the lock so it may block on
    /// signal escalation without holding up other registry users.
    pub fn for_each_on_shutdown(&self, mut f: impl FnMut(&RegisteredProcess)) {
        let processes: Vec<RegisteredProcess> = self.inner.lock().values().cloned().collect();
        for process in &processes {
            f(process);
        }
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_reap_roundtrip() {
        let registry = ProcessRegistry::new();
        registry.register(123, "dictate-hold");
        assert!(registry.is_registered(123));
        assert_eq!(registry.len(), 1);
        registry.reap(123);
        assert!(!registry.is_registered(123));
        assert!(registry.is_empty());
    }

    #[test]
    fn shutdown_sweep_visits_and_clears_all() {
        let registry = ProcessRegistry::new();
        registry.register(1, "a");
        registry.register(2, "b");
        let mut seen = Vec::new();
        registry.for_each_on_shutdown(|p| seen.push(p.pid));
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
        assert!(registry.is_empty());
    }
}
