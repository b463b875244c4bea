//! Sink enablement monitor.
//!
//! A background thread watches one boolean flag per sink and publishes two
//! things streams read without locking: a per-sink enabled snapshot and a
//! monotonically increasing change counter. The counter is a cheap "has
//! anything changed since I last checked" token, compared by value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error};

use crate::flags::ConfigFlags;
use crate::sink::SinkId;

/// Lock-free enablement snapshot.
///
/// Written only by the monitor thread; read by streams on every write.
/// Each sink's flag and the counter are independent atomics, so an
/// unsynchronized reader can never observe a torn composite value.
pub struct Enablement {
    enabled: Vec<AtomicBool>,
    counter: AtomicU64,
}

impl Enablement {
    /// Creates a snapshot with every sink defaulting to enabled.
    #[must_use]
    pub fn new(sink_count: usize) -> Self {
        Self {
            enabled: (0..sink_count).map(|_| AtomicBool::new(true)).collect(),
            counter: AtomicU64::new(0),
        }
    }

    /// Whether `sink` is currently enabled. Out-of-range ids read as
    /// disabled.
    pub fn is_enabled(&self, sink: SinkId) -> bool {
        self.enabled
            .get(sink.0)
            .is_some_and(|e| e.load(Ordering::Acquire))
    }

    /// Current change-counter value.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, sink: SinkId, enabled: bool) {
        if let Some(e) = self.enabled.get(sink.0) {
            e.store(enabled, Ordering::Release);
        }
    }

    pub(crate) fn bump(&self) {
        self.counter.fetch_add(1, Ordering::Release);
    }
}

/// Process-scoped monitor thread for the enablement flags.
///
/// Runs once for the process lifetime with no explicit shutdown. A flag
/// that cannot be registered is fatal to this thread only: the thread
/// exits and every sink stays at its default-enabled value.
pub struct EnablementMonitor;

impl EnablementMonitor {
    /// Spawns the monitor over `flag_names[i]` governing sink `i`.
    ///
    /// Seeds each flag (creating it as enabled if absent), copies current
    /// values into the snapshot, then blocks on the store's
    /// wait-for-any-change primitive. Each wake cycle re-reads only the
    /// flags whose version changed and bumps the change counter exactly
    /// once if anything did.
    pub fn spawn(
        flags: Arc<dyn ConfigFlags>,
        enablement: Arc<Enablement>,
        flag_names: Vec<String>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || Self::run(&*flags, &enablement, &flag_names))
    }

    fn run(flags: &dyn ConfigFlags, enablement: &Enablement, names: &[String]) {
        let mut versions = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // Sample the version before registering: a set racing the
            // registration then shows up as a mismatch on the first wake
            // instead of being silently absorbed into the baseline.
            versions.push(flags.version(name));
            if let Err(e) = flags.ensure(name, true) {
                error!(flag = %name, error = %e, "enablement monitor init failed");
                return;
            }
            enablement.set_enabled(SinkId(i), flags.get(name).unwrap_or(true));
        }
        debug!(sinks = names.len(), "enablement monitor running");

        let mut seen = 0;
        loop {
            seen = flags.wait_any(seen);
            let mut changed = false;
            for (i, name) in names.iter().enumerate() {
                let version = flags.version(name);
                if version == versions[i] {
                    continue;
                }
                versions[i] = version;
                let enabled = flags.get(name).unwrap_or(true);
                enablement.set_enabled(SinkId(i), enabled);
                debug!(flag = %name, enabled, "sink enablement changed");
                changed = true;
            }
            if changed {
                enablement.bump();
            }
        }
    }
}
