//! Configuration-flag store.
//!
//! Sinks are enabled and disabled at runtime through named boolean flags,
//! one per sink. The [`ConfigFlags`] trait is the boundary the enablement
//! monitor consumes; [`FlagStore`] is the in-process implementation backed
//! by a condition variable broadcast whenever any watched flag changes.
//!
//! Change detection is by per-flag version number, never by content, so
//! "changed since last observation" is a single integer compare.

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};

use crate::FlagError;

/// The flag-store boundary consumed by the enablement monitor.
///
/// Implementations must be safe to share across the monitor thread and any
/// control thread toggling flags.
pub trait ConfigFlags: Send + Sync {
    /// Registers `name`, creating it with `default` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::RegistrationFailed`] if the flag cannot be
    /// created. The monitor treats this as fatal to itself only.
    fn ensure(&self, name: &str, default: bool) -> Result<(), FlagError>;

    /// Current value of `name`, or `None` if it was never registered.
    fn get(&self, name: &str) -> Option<bool>;

    /// Version number of `name`. Starts at the store's version at creation
    /// time and advances on every [`set`](ConfigFlags::set).
    fn version(&self, name: &str) -> u64;

    /// Blocks until the store's global version exceeds `last_seen`, then
    /// returns the new global version.
    fn wait_any(&self, last_seen: u64) -> u64;

    /// Sets `name` to `value`, bumping its version and waking all waiters.
    ///
    /// Setting an unregistered flag registers it.
    fn set(&self, name: &str, value: bool);
}

#[derive(Debug, Clone, Copy)]
struct Flag {
    value: bool,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    flags: HashMap<String, Flag>,
    global_version: u64,
}

/// In-process [`ConfigFlags`] implementation.
///
/// A control thread calls [`set`](ConfigFlags::set) to toggle a sink; the
/// monitor thread sleeps in [`wait_any`](ConfigFlags::wait_any) until any
/// flag changes.
///
/// # Example
///
/// ```
/// use fanout_audio::flags::{ConfigFlags, FlagStore};
///
/// let store = FlagStore::new();
/// store.ensure("audio.hdmi_enabled", true).unwrap();
/// assert_eq!(store.get("audio.hdmi_enabled"), Some(true));
///
/// store.set("audio.hdmi_enabled", false);
/// assert_eq!(store.get("audio.hdmi_enabled"), Some(false));
/// ```
#[derive(Default)]
pub struct FlagStore {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl FlagStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigFlags for FlagStore {
    fn ensure(&self, name: &str, default: bool) -> Result<(), FlagError> {
        let mut inner = self.inner.lock();
        let version = inner.global_version;
        inner.flags.entry(name.to_string()).or_insert(Flag {
            value: default,
            version,
        });
        Ok(())
    }

    fn get(&self, name: &str) -> Option<bool> {
        self.inner.lock().flags.get(name).map(|f| f.value)
    }

    fn version(&self, name: &str) -> u64 {
        self.inner.lock().flags.get(name).map_or(0, |f| f.version)
    }

    fn wait_any(&self, last_seen: u64) -> u64 {
        let mut inner = self.inner.lock();
        while inner.global_version <= last_seen {
            self.changed.wait(&mut inner);
        }
        inner.global_version
    }

    fn set(&self, name: &str, value: bool) {
        let mut inner = self.inner.lock();
        inner.global_version += 1;
        let version = inner.global_version;
        inner
            .flags
            .entry(name.to_string())
            .and_modify(|f| {
                f.value = value;
                f.version = version;
            })
            .or_insert(Flag { value, version });
        drop(inner);
        self.changed.notify_all();
    }
}
