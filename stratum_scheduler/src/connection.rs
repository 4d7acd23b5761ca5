// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vsync-event connection registry.
//!
//! Subscribers to vsync events get an opaque [`ConnectionHandle`]; each
//! handle maps to an event thread that fans events out to that subscriber.
//! All registry operations forward to the associated thread. Operations on
//! unknown handles log an error and return the typed default, matching the
//! skip-with-log policy of the rest of the pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use stratum_core::hwc::HwcDisplayId;
use tracing::error;

use crate::clock::Nanos;

/// An opaque handle to a vsync-event connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    /// Monotonically allocated id.
    pub id: u64,
}

/// The per-connection event fanout thread.
pub trait EventThread: Send + Sync {
    /// Delivers a hotplug event.
    fn on_hotplug_received(&self, display: HwcDisplayId, connected: bool);

    /// Delivers a screen-acquired (power on) event.
    fn on_screen_acquired(&self);

    /// Delivers a screen-released (power off) event.
    fn on_screen_released(&self);

    /// Delivers a display config change.
    fn on_config_changed(&self, display: HwcDisplayId, config_id: usize);

    /// Adjusts the vsync phase offset for this connection.
    fn set_phase_offset(&self, phase_offset: Nanos);

    /// Returns a state dump for debugging.
    fn dump(&self) -> String;
}

struct Connection {
    thread: Arc<dyn EventThread>,
}

/// Hands out connection handles and forwards events to their threads.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<HashMap<ConnectionHandle, Connection>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event thread and returns its handle.
    pub fn create_connection(&self, thread: Arc<dyn EventThread>) -> ConnectionHandle {
        let handle = ConnectionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        self.connections
            .lock()
            .insert(handle, Connection { thread });
        handle
    }

    fn thread(&self, handle: ConnectionHandle) -> Option<Arc<dyn EventThread>> {
        let connections = self.connections.lock();
        match connections.get(&handle) {
            Some(connection) => Some(Arc::clone(&connection.thread)),
            None => {
                error!(handle = handle.id, "invalid connection handle");
                None
            }
        }
    }

    /// Forwards a hotplug event.
    pub fn on_hotplug_received(
        &self,
        handle: ConnectionHandle,
        display: HwcDisplayId,
        connected: bool,
    ) {
        if let Some(thread) = self.thread(handle) {
            thread.on_hotplug_received(display, connected);
        }
    }

    /// Forwards a screen-acquired event.
    pub fn on_screen_acquired(&self, handle: ConnectionHandle) {
        if let Some(thread) = self.thread(handle) {
            thread.on_screen_acquired();
        }
    }

    /// Forwards a screen-released event.
    pub fn on_screen_released(&self, handle: ConnectionHandle) {
        if let Some(thread) = self.thread(handle) {
            thread.on_screen_released();
        }
    }

    /// Forwards a config change.
    pub fn on_config_changed(
        &self,
        handle: ConnectionHandle,
        display: HwcDisplayId,
        config_id: usize,
    ) {
        if let Some(thread) = self.thread(handle) {
            thread.on_config_changed(display, config_id);
        }
    }

    /// Forwards a phase-offset change.
    pub fn set_phase_offset(&self, handle: ConnectionHandle, phase_offset: Nanos) {
        if let Some(thread) = self.thread(handle) {
            thread.set_phase_offset(phase_offset);
        }
    }

    /// Returns the connection's debug dump, or `None` for unknown handles.
    #[must_use]
    pub fn dump(&self, handle: ConnectionHandle) -> Option<String> {
        self.thread(handle).map(|thread| thread.dump())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[derive(Default)]
    struct CountingThread {
        hotplugs: AtomicU32,
        acquired: AtomicU32,
        released: AtomicU32,
        config_changes: AtomicU32,
        phase_offsets: Mutex<Vec<Nanos>>,
    }

    impl EventThread for CountingThread {
        fn on_hotplug_received(&self, _display: HwcDisplayId, _connected: bool) {
            self.hotplugs.fetch_add(1, Ordering::SeqCst);
        }
        fn on_screen_acquired(&self) {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }
        fn on_screen_released(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        fn on_config_changed(&self, _display: HwcDisplayId, _config_id: usize) {
            self.config_changes.fetch_add(1, Ordering::SeqCst);
        }
        fn set_phase_offset(&self, phase_offset: Nanos) {
            self.phase_offsets.lock().push(phase_offset);
        }
        fn dump(&self) -> String {
            "counting-thread".to_owned()
        }
    }

    #[test]
    fn handles_are_distinct_and_monotonic() {
        let registry = ConnectionRegistry::new();
        let a = registry.create_connection(Arc::new(CountingThread::default()));
        let b = registry.create_connection(Arc::new(CountingThread::default()));
        assert_ne!(a, b);
        assert!(b.id > a.id);
    }

    #[test]
    fn events_forward_to_the_right_thread() {
        let registry = ConnectionRegistry::new();
        let thread = Arc::new(CountingThread::default());
        let other = Arc::new(CountingThread::default());
        let handle = registry.create_connection(Arc::clone(&thread) as Arc<dyn EventThread>);
        let _other_handle = registry.create_connection(Arc::clone(&other) as Arc<dyn EventThread>);

        registry.on_hotplug_received(handle, HwcDisplayId(1), true);
        registry.on_screen_acquired(handle);
        registry.on_screen_released(handle);
        registry.on_config_changed(handle, HwcDisplayId(1), 2);
        registry.set_phase_offset(handle, 1_000_000);

        assert_eq!(thread.hotplugs.load(Ordering::SeqCst), 1);
        assert_eq!(thread.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(thread.released.load(Ordering::SeqCst), 1);
        assert_eq!(thread.config_changes.load(Ordering::SeqCst), 1);
        assert_eq!(*thread.phase_offsets.lock(), vec![1_000_000]);
        assert_eq!(other.hotplugs.load(Ordering::SeqCst), 0);

        assert_eq!(registry.dump(handle).as_deref(), Some("counting-thread"));
    }

    #[test]
    fn unknown_handle_returns_typed_default() {
        let registry = ConnectionRegistry::new();
        let bogus = ConnectionHandle { id: 42 };
        // Nothing to observe beyond "does not panic" and the dump default.
        registry.on_screen_acquired(bogus);
        assert_eq!(registry.dump(bogus), None);
    }
}
