use crate::debug_if_enabled;
use crate::error::{FocusLockError, Result};
use crate::events::WindowHandle;
use crate::services::host::{Host, HookId};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub type ChangeCallback = Arc<dyn Fn(WindowHandle) + Send + Sync>;

struct MonitorSession {
    hook: HookId,
    active: Arc<AtomicBool>,
}

/// Слушатель системных уведомлений о смене активного окна
pub struct ForegroundMonitor {
    host: Arc<dyn Host>,
    session: Mutex<Option<MonitorSession>>,
}

impl ForegroundMonitor {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            session: Mutex::new(None),
        }
    }

    pub fn start<F>(&self, on_change: F) -> Result<()>
    where
        F: Fn(WindowHandle) + Send + Sync + 'static,
    {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(FocusLockError::AlreadyRunning("ForegroundMonitor"));
        }

        let active = Arc::new(AtomicBool::new(true));
        let handler_active = active.clone();
        let on_change: ChangeCallback = Arc::new(on_change);

        let hook = self.host.install_foreground_listener(Arc::new(move |window| {
            Self::dispatch(&handler_active, &on_change, window)
        }))?;

        info!("ForegroundMonitor запущен ({})", hook);
        *session = Some(MonitorSession { hook, active });
        Ok(())
    }

    pub fn stop(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };

        session.active.store(false, Ordering::Release);
        self.host.remove_foreground_listener(session.hook);
        info!("ForegroundMonitor остановлен ({})", session.hook);
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    fn dispatch(active: &AtomicBool, on_change: &ChangeCallback, window: WindowHandle) {
        if !active.load(Ordering::Acquire) {
            return;
        }

        // Переходы через рабочий стол/экран блокировки приходят без окна
        if window.is_null() {
            debug_if_enabled!("ForegroundMonitor: уведомление без окна пропущено");
            return;
        }

        debug_if_enabled!("ForegroundMonitor: активное окно {}", window);
        if panic::catch_unwind(AssertUnwindSafe(|| on_change(window))).is_err() {
            warn!("ForegroundMonitor: обработчик смены окна {} завершился паникой", window);
        }
    }
}

impl Drop for ForegroundMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::services::host::DryRunHost;

    fn setup() -> (Arc<DryRunHost>, ForegroundMonitor, Arc<Mutex<Vec<WindowHandle>>>) {
        let host = Arc::new(DryRunHost::new(SimulationConfig::default()));
        let monitor = ForegroundMonitor::new(host.clone());
        (host, monitor, Arc::new(Mutex::new(Vec::new())))
    }

    #[test]
    fn test_changes_are_routed() {
        let (host, monitor, seen) = setup();
        let sink = seen.clone();
        monitor.start(move |w| sink.lock().push(w)).unwrap();

        host.switch_foreground(WindowHandle::new(0xA)).unwrap();
        host.switch_foreground(WindowHandle::new(0xA)).unwrap();
        host.switch_foreground(WindowHandle::new(0xB)).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![WindowHandle::new(0xA), WindowHandle::new(0xA), WindowHandle::new(0xB)]
        );
    }

    #[test]
    fn test_null_handle_is_dropped() {
        let (host, monitor, seen) = setup();
        let sink = seen.clone();
        monitor.start(move |w| sink.lock().push(w)).unwrap();

        host.switch_foreground(WindowHandle::NULL).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_lifecycle() {
        let (host, monitor, _seen) = setup();
        monitor.stop();

        monitor.start(|_| {}).unwrap();
        assert!(matches!(
            monitor.start(|_| {}),
            Err(FocusLockError::AlreadyRunning(_))
        ));
        assert_eq!(host.foreground_listener_count(), 1);

        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());
        assert_eq!(host.foreground_listener_count(), 0);
    }

    #[test]
    fn test_events_after_stop_are_ignored() {
        let (host, monitor, seen) = setup();
        let sink = seen.clone();
        monitor.start(move |w| sink.lock().push(w)).unwrap();

        // Флаг сессии, который уже захватил обработчик в ОС до снятия хука
        let active = monitor
            .session
            .lock()
            .as_ref()
            .map(|s| s.active.clone())
            .unwrap();
        monitor.stop();

        let sink = seen.clone();
        let on_change: ChangeCallback = Arc::new(move |w| sink.lock().push(w));
        ForegroundMonitor::dispatch(&active, &on_change, WindowHandle::new(5));

        assert!(seen.lock().is_empty());
        assert_eq!(host.foreground_listener_count(), 0);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let (host, monitor, _seen) = setup();
        monitor.start(|_| panic!("boom")).unwrap();
        assert!(host.switch_foreground(WindowHandle::new(1)).is_ok());
    }

    #[test]
    fn test_registration_failure() {
        let (host, monitor, _seen) = setup();
        host.refuse_registrations(true);
        assert!(matches!(
            monitor.start(|_| {}),
            Err(FocusLockError::HostRegistrationFailed(_))
        ));
        assert!(!monitor.is_running());
    }
}
