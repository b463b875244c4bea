//! Fixed sink arena and per-stream handle reconciliation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::device::DeviceControl;
use crate::monitor::Enablement;
use crate::sink::{SinkDriver, SinkHandle, SinkId};
use crate::{StreamConfig, StreamEvent};

/// The closed set of sink drivers, fixed at device open, indexed by
/// [`SinkId`], never resized.
pub(crate) struct SinkRegistry {
    drivers: Vec<Arc<dyn SinkDriver>>,
    hw_volume: Option<SinkId>,
}

impl SinkRegistry {
    /// Builds the arena. The first driver reporting hardware volume becomes
    /// the published volume-control sink.
    pub(crate) fn new(drivers: Vec<Arc<dyn SinkDriver>>) -> Self {
        let hw_volume = drivers
            .iter()
            .position(|d| d.has_hardware_volume())
            .map(SinkId);
        Self { drivers, hw_volume }
    }

    pub(crate) fn len(&self) -> usize {
        self.drivers.len()
    }

    pub(crate) fn driver(&self, id: SinkId) -> &Arc<dyn SinkDriver> {
        &self.drivers[id.0]
    }

    /// The sink whose handle is published for hardware volume control.
    pub(crate) fn hw_volume_sink(&self) -> Option<SinkId> {
        self.hw_volume
    }
}

/// The handles a stream currently holds open, parallel to the registry.
///
/// Invariant: a slot is `Some` if and only if the sink was both enabled and
/// connected at the last reconciliation and its driver opened successfully.
pub(crate) struct SinkSet {
    handles: Vec<Option<Arc<dyn SinkHandle>>>,
}

impl SinkSet {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            handles: (0..count).map(|_| None).collect(),
        }
    }

    #[cfg(test)]
    fn handle(&self, id: SinkId) -> Option<&Arc<dyn SinkHandle>> {
        self.handles.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn open_count(&self) -> usize {
        self.handles.iter().filter(|h| h.is_some()).count()
    }

    /// The reference sink for pacing: the highest-index open sink, so
    /// pacing is anchored to one consistent sink per write even as the
    /// active set changes.
    pub(crate) fn reference(&self) -> Option<(SinkId, &Arc<dyn SinkHandle>)> {
        self.handles
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, h)| h.as_ref().map(|h| (SinkId(i), h)))
    }

    pub(crate) fn iter_open(&self) -> impl Iterator<Item = (SinkId, &Arc<dyn SinkHandle>)> {
        self.handles
            .iter()
            .enumerate()
            .filter_map(|(i, h)| h.as_ref().map(|h| (SinkId(i), h)))
    }

    /// Brings the open set in line with `enabled ∧ connected`.
    ///
    /// Open failures are absorbed: logged, pushed onto `events`, and the
    /// slot left empty - a partially available set of sinks is a valid
    /// operating state. The hardware-volume sink's handle is published
    /// into (or cleared from) the device control state, and the current
    /// master gain is pushed to it while published.
    ///
    /// Taking `&mut DeviceControl` means the caller holds the device lock;
    /// the stream lock is held by every caller as well, so no concurrent
    /// volume change can observe a half-updated handle. Events are only
    /// queued here, never delivered: the embedder's callback runs after
    /// both locks are released.
    pub(crate) fn reconcile(
        &mut self,
        registry: &SinkRegistry,
        enablement: &Enablement,
        config: &StreamConfig,
        control: &mut DeviceControl,
        events: &mut Vec<StreamEvent>,
    ) {
        for i in 0..registry.len() {
            let id = SinkId(i);
            let driver = registry.driver(id);
            let want = enablement.is_enabled(id) && driver.is_connected();

            match (want, self.handles[i].is_some()) {
                (false, true) => {
                    debug!(sink = %id, name = driver.name(), "closing sink");
                    self.handles[i] = None;
                }
                (true, false) => match driver.open(config) {
                    Ok(handle) => {
                        debug!(sink = %id, name = driver.name(), "opened sink");
                        self.handles[i] = Some(handle);
                    }
                    Err(e) => {
                        warn!(sink = %id, name = driver.name(), error = %e, "cannot open sink");
                        events.push(StreamEvent::SinkOpenFailed {
                            sink: id,
                            sink_name: driver.name().to_string(),
                            error: e.to_string(),
                        });
                    }
                },
                _ => {}
            }
        }

        if let Some(hw) = registry.hw_volume_sink() {
            control.hw_volume = self.handles[hw.0].clone();
            if let Some(handle) = &control.hw_volume {
                if let Err(e) = handle.set_hardware_volume(control.gain()) {
                    warn!(sink = %hw, error = %e, "cannot apply hardware volume");
                }
            }
        }
    }

    /// Closes every open handle and clears the published hardware-volume
    /// handle. Idempotent.
    pub(crate) fn close_all(&mut self, control: &mut DeviceControl) {
        control.hw_volume = None;
        for handle in &mut self.handles {
            *handle = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::mock::MockDriver;

    fn registry(count: usize) -> SinkRegistry {
        SinkRegistry::new(
            (0..count)
                .map(|i| Arc::new(MockDriver::new(&format!("mock{i}"))) as Arc<dyn SinkDriver>)
                .collect(),
        )
    }

    fn control() -> DeviceControl {
        DeviceControl::new()
    }

    #[test]
    fn test_reconcile_opens_enabled_connected() {
        let reg = registry(3);
        let enablement = Enablement::new(3);
        let mut set = SinkSet::new(3);
        let mut ctl = control();

        set.reconcile(&reg, &enablement, &StreamConfig::default(), &mut ctl, &mut Vec::new());
        assert_eq!(set.open_count(), 3);
    }

    #[test]
    fn test_reconcile_closes_disabled() {
        let reg = registry(3);
        let enablement = Enablement::new(3);
        let mut set = SinkSet::new(3);
        let mut ctl = control();
        let config = StreamConfig::default();

        set.reconcile(&reg, &enablement, &config, &mut ctl, &mut Vec::new());
        enablement.set_enabled(SinkId(1), false);
        set.reconcile(&reg, &enablement, &config, &mut ctl, &mut Vec::new());

        assert!(set.handle(SinkId(0)).is_some());
        assert!(set.handle(SinkId(1)).is_none());
        assert!(set.handle(SinkId(2)).is_some());
    }

    #[test]
    fn test_reconcile_skips_disconnected() {
        let drivers: Vec<Arc<dyn SinkDriver>> = vec![
            Arc::new(MockDriver::new("fixed")),
            Arc::new(MockDriver::new("amp").connected(false)),
        ];
        let reg = SinkRegistry::new(drivers);
        let enablement = Enablement::new(2);
        let mut set = SinkSet::new(2);
        let mut ctl = control();

        set.reconcile(&reg, &enablement, &StreamConfig::default(), &mut ctl, &mut Vec::new());
        assert!(set.handle(SinkId(0)).is_some());
        assert!(set.handle(SinkId(1)).is_none());
    }

    #[test]
    fn test_reconcile_absorbs_open_failure() {
        let drivers: Vec<Arc<dyn SinkDriver>> = vec![
            Arc::new(MockDriver::new("ok")),
            Arc::new(MockDriver::new("broken").fail_open()),
        ];
        let reg = SinkRegistry::new(drivers);
        let enablement = Enablement::new(2);
        let mut set = SinkSet::new(2);
        let mut ctl = control();

        let mut events = Vec::new();
        set.reconcile(&reg, &enablement, &StreamConfig::default(), &mut ctl, &mut events);
        assert_eq!(set.open_count(), 1);
        assert!(set.handle(SinkId(1)).is_none());
        assert!(matches!(
            events.as_slice(),
            [StreamEvent::SinkOpenFailed { sink: SinkId(1), .. }]
        ));
    }

    #[test]
    fn test_reconcile_publishes_hw_volume_handle() {
        let drivers: Vec<Arc<dyn SinkDriver>> = vec![
            Arc::new(MockDriver::new("hdmi")),
            Arc::new(MockDriver::new("amp").hardware_volume()),
        ];
        let reg = SinkRegistry::new(drivers);
        assert_eq!(reg.hw_volume_sink(), Some(SinkId(1)));

        let enablement = Enablement::new(2);
        let mut set = SinkSet::new(2);
        let mut ctl = control();
        set.reconcile(&reg, &enablement, &StreamConfig::default(), &mut ctl, &mut Vec::new());
        assert!(ctl.hw_volume.is_some());

        enablement.set_enabled(SinkId(1), false);
        set.reconcile(&reg, &enablement, &StreamConfig::default(), &mut ctl, &mut Vec::new());
        assert!(ctl.hw_volume.is_none());
    }

    #[test]
    fn test_reference_is_highest_open() {
        let reg = registry(3);
        let enablement = Enablement::new(3);
        let mut set = SinkSet::new(3);
        let mut ctl = control();
        let config = StreamConfig::default();

        set.reconcile(&reg, &enablement, &config, &mut ctl, &mut Vec::new());
        assert_eq!(set.reference().unwrap().0, SinkId(2));

        enablement.set_enabled(SinkId(2), false);
        set.reconcile(&reg, &enablement, &config, &mut ctl, &mut Vec::new());
        assert_eq!(set.reference().unwrap().0, SinkId(1));
    }

    #[test]
    fn test_close_all_idempotent() {
        let reg = registry(2);
        let enablement = Enablement::new(2);
        let mut set = SinkSet::new(2);
        let mut ctl = control();

        set.reconcile(&reg, &enablement, &StreamConfig::default(), &mut ctl, &mut Vec::new());
        set.close_all(&mut ctl);
        assert_eq!(set.open_count(), 0);
        set.close_all(&mut ctl);
        assert_eq!(set.open_count(), 0);
    }
}
