use std::sync::{Arc, Mutex, MutexGuard};

use board::BoardInfo;
use sensors::{CompassData, GpsData};

/// Observer of the tracker's lifecycle, sensor and axis events.
///
/// Every hook defaults to a no-op. Hooks run synchronously on whichever thread
/// raised the event (the control thread, or a sensor reader thread for the
/// two reading hooks) and must not block.
pub trait SystemListener: Send + Sync {
    fn board_connected(&self, _board: &BoardInfo) {}

    fn board_disconnected(&self) {}

    fn incompatible_board(&self, _board: &BoardInfo) {}

    fn gps_position_locked(&self, _data: &GpsData) {}

    fn compass_data_ready(&self, _data: &CompassData) {}

    fn x_axis_step_completed(&self, _current_step: i32) {}

    fn x_axis_reached_start_position(&self) {}

    fn x_axis_reached_end_position(&self) {}

    fn y_axis_step_completed(&self, _current_step: i32) {}

    fn y_axis_reached_start_position(&self) {}

    fn y_axis_reached_end_position(&self) {}
}

/// Registered listeners in registration order.
///
/// Fan-out iterates over a snapshot taken under the lock, so a listener may
/// register or unregister listeners from inside a hook. Changes apply from
/// the next event on.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Arc<dyn SystemListener>>>,
}

fn same_listener(a: &Arc<dyn SystemListener>, b: &Arc<dyn SystemListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn SystemListener>>> {
        self.listeners.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Returns `false` if `listener` was already registered.
    pub fn register(&self, listener: Arc<dyn SystemListener>) -> bool {
        let mut listeners = self.lock();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Returns `false` if `listener` was not registered.
    pub fn unregister(&self, listener: &Arc<dyn SystemListener>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Calls `event` once per listener, in registration order.
    pub fn notify<F>(&self, event: F)
    where
        F: Fn(&dyn SystemListener),
    {
        let snapshot: Vec<Arc<dyn SystemListener>> = self.lock().clone();
        for listener in &snapshot {
            event(listener.as_ref());
        }
    }
}

/// Writes every event to the log.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl SystemListener for LoggingListener {
    fn board_connected(&self, board: &BoardInfo) {
        log::info!("Board connected: {} (firmware {})", board.name, board.firmware);
    }

    fn board_disconnected(&self) {
        log::warn!("Board disconnected");
    }

    fn incompatible_board(&self, board: &BoardInfo) {
        log::error!("Incompatible board: {} (firmware {})", board.name, board.firmware);
    }

    fn gps_position_locked(&self, data: &GpsData) {
        log::info!(
            "GPS lock: lat {:.6}, lon {:.6}, alt {:.1} m, {} satellites",
            data.latitude(),
            data.longitude(),
            data.altitude(),
            data.satellites()
        );
    }

    fn compass_data_ready(&self, data: &CompassData) {
        log::debug!("Compass heading {:.1}", data.heading());
    }

    fn x_axis_step_completed(&self, current_step: i32) {
        log::trace!("x-axis at step {}", current_step);
    }

    fn x_axis_reached_start_position(&self) {
        log::info!("x-axis at start position");
    }

    fn x_axis_reached_end_position(&self) {
        log::info!("x-axis at end position");
    }

    fn y_axis_step_completed(&self, current_step: i32) {
        log::trace!("y-axis at step {}", current_step);
    }

    fn y_axis_reached_start_position(&self) {
        log::info!("y-axis at start position");
    }

    fn y_axis_reached_end_position(&self) {
        log::info!("y-axis at end position");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl SystemListener for Named {
        fn board_disconnected(&self) {
            self.log.lock().unwrap().push(self.name.to_string());
        }

        fn x_axis_step_completed(&self, current_step: i32) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, current_step));
        }
    }

    fn named(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn SystemListener> {
        Arc::new(Named {
            name,
            log: log.clone(),
        })
    }

    #[test]
    fn notifies_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        registry.register(named("a", &log));
        registry.register(named("b", &log));
        registry.register(named("c", &log));

        registry.notify(|l| l.x_axis_step_completed(4));
        registry.notify(|l| l.board_disconnected());

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:4", "b:4", "c:4", "a", "b", "c"]
        );
    }

    #[test]
    fn registering_twice_is_refused() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let listener = named("a", &log);
        assert!(registry.register(listener.clone()));
        assert!(!registry.register(listener.clone()));
        assert_eq!(registry.len(), 1);

        registry.notify(|l| l.board_disconnected());
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn unregister_removes_only_that_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let a = named("a", &log);
        let b = named("b", &log);
        registry.register(a.clone());
        registry.register(b.clone());

        assert!(registry.unregister(&a));
        assert!(!registry.unregister(&a));
        registry.notify(|l| l.board_disconnected());
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    struct SelfRemoving {
        registry: Arc<ListenerRegistry>,
        me: Mutex<Option<Arc<dyn SystemListener>>>,
        calls: Mutex<u32>,
    }

    impl SystemListener for SelfRemoving {
        fn board_disconnected(&self) {
            *self.calls.lock().unwrap() += 1;
            if let Some(me) = self.me.lock().unwrap().take() {
                self.registry.unregister(&me);
            }
        }
    }

    #[test]
    fn listener_may_unregister_itself_during_fan_out() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(ListenerRegistry::new());
        let remover = Arc::new(SelfRemoving {
            registry: registry.clone(),
            me: Mutex::new(None),
            calls: Mutex::new(0),
        });
        let as_listener: Arc<dyn SystemListener> = remover.clone();
        *remover.me.lock().unwrap() = Some(as_listener.clone());
        registry.register(as_listener);
        registry.register(named("b", &log));

        registry.notify(|l| l.board_disconnected());
        registry.notify(|l| l.board_disconnected());

        assert_eq!(*remover.calls.lock().unwrap(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["b", "b"]);
        assert_eq!(registry.len(), 1);
    }
}
