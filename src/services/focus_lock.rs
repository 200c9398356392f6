use crate::config::Config;
use crate::error::Result;
use crate::services::host::Host;
use crate::services::{FocusGuard, ForegroundMonitor, KeyTap};
use std::sync::Arc;
use tracing::{error, info};

/// Сборка всех компонентов защиты фокуса с общим жизненным циклом.
///
/// `start` и `stop` нужно вызывать на потоке, который крутит `Host::pump`.
pub struct FocusLock {
    config: Arc<Config>,
    guard: Arc<FocusGuard>,
    key_tap: KeyTap,
    monitor: ForegroundMonitor,
}

impl FocusLock {
    pub fn new(config: Arc<Config>, host: Arc<dyn Host>) -> Self {
        let guard = Arc::new(FocusGuard::new(host.clone(), config.guard.throttle()));
        Self {
            key_tap: KeyTap::new(host.clone()),
            monitor: ForegroundMonitor::new(host),
            guard,
            config,
        }
    }

    pub fn start(&self) -> Result<()> {
        let activity_guard = self.guard.clone();
        let on_activity = move || activity_guard.on_key_activity();

        if self.config.activity.is_chord_mode() {
            let spec = self.config.activity.chord_spec()?;
            self.key_tap.start(spec, on_activity)?;
        } else {
            self.key_tap.start_any_key(on_activity)?;
        }

        let change_guard = self.guard.clone();
        if let Err(e) = self.monitor.start(move |window| {
            change_guard.on_foreground_change(window);
        }) {
            error!("Не удалось запустить ForegroundMonitor: {}", e);
            self.key_tap.stop();
            return Err(e);
        }

        info!("FocusLock запущен");
        Ok(())
    }

    pub fn stop(&self) {
        self.monitor.stop();
        self.key_tap.stop();

        let stats = self.guard.stats();
        info!(
            "FocusLock остановлен: принято смен окна - {}, отклонено попыток перехвата - {}",
            stats.accepted, stats.reverted
        );
    }

    #[allow(dead_code)]
    pub fn guard(&self) -> &Arc<FocusGuard> {
        &self.guard
    }

    #[allow(dead_code)]
    pub fn is_running(&self) -> bool {
        self.key_tap.is_running() && self.monitor.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FocusLockError;
    use crate::events::{Key, KeyDirection, WindowHandle};
    use crate::services::host::DryRunHost;

    const EDITOR: WindowHandle = WindowHandle(0x100);
    const POPUP: WindowHandle = WindowHandle(0x200);

    fn setup(config: Config) -> (Arc<DryRunHost>, FocusLock) {
        let host = Arc::new(DryRunHost::new(config.simulation.clone()));
        let focus_lock = FocusLock::new(Arc::new(config), host.clone());
        (host, focus_lock)
    }

    #[test]
    fn test_typing_then_steal_is_reverted() {
        let (host, focus_lock) = setup(Config::default());
        focus_lock.start().unwrap();

        host.switch_foreground(EDITOR).unwrap();
        host.tap_key(Key::from_name("a").unwrap()).unwrap();
        host.switch_foreground(POPUP).unwrap();

        assert_eq!(host.forced_windows(), vec![EDITOR]);
        assert_eq!(host.foreground(), EDITOR);
        assert_eq!(focus_lock.guard().last_accepted(), EDITOR);

        // Эхо от ОС после возврата фокуса принимается без повторного отката
        host.deliver_echoes();
        assert_eq!(host.forced_windows(), vec![EDITOR]);
    }

    #[test]
    fn test_switch_without_typing_is_accepted() {
        let (host, focus_lock) = setup(Config::default());
        focus_lock.start().unwrap();

        host.switch_foreground(EDITOR).unwrap();
        host.switch_foreground(POPUP).unwrap();

        assert!(host.forced_windows().is_empty());
        assert_eq!(focus_lock.guard().last_accepted(), POPUP);
    }

    #[test]
    fn test_chord_mode_only_counts_chord() {
        let mut config = Config::default();
        config.activity.mode = "chord".to_string();
        config.activity.keys = vec!["ctrl".to_string(), "l".to_string()];
        config.activity.modifiers = vec!["ctrl".to_string()];
        let (host, focus_lock) = setup(config);
        focus_lock.start().unwrap();

        host.switch_foreground(EDITOR).unwrap();
        host.tap_key(Key::from_name("a").unwrap()).unwrap();
        host.switch_foreground(POPUP).unwrap();
        assert!(host.forced_windows().is_empty());

        host.send_key(Key::CONTROL, KeyDirection::Down).unwrap();
        host.send_key(Key::from_name("l").unwrap(), KeyDirection::Down).unwrap();
        host.switch_foreground(EDITOR).unwrap();
        assert_eq!(host.forced_windows(), vec![POPUP]);
    }

    #[test]
    fn test_unknown_chord_key_fails_start() {
        let mut config = Config::default();
        config.activity.mode = "chord".to_string();
        config.activity.keys = vec!["nope".to_string()];
        let (host, focus_lock) = setup(config);

        let err = focus_lock.start().unwrap_err();
        assert!(matches!(err, FocusLockError::Config(_)));
        assert!(err.is_fatal());
        assert_eq!(host.keyboard_tap_count(), 0);
        assert_eq!(host.foreground_listener_count(), 0);
    }

    #[test]
    fn test_monitor_failure_rolls_back_key_tap() {
        let (host, focus_lock) = setup(Config::default());
        // Монитор уже занят, поэтому второй запуск внутри start() упадёт
        focus_lock.monitor.start(|_| {}).unwrap();

        assert!(matches!(
            focus_lock.start(),
            Err(FocusLockError::AlreadyRunning(_))
        ));
        assert!(!focus_lock.key_tap.is_running());
        assert_eq!(host.keyboard_tap_count(), 0);

        focus_lock.stop();
        assert!(!focus_lock.is_running());
        assert_eq!(host.foreground_listener_count(), 0);
    }

    #[test]
    fn test_registration_failure_leaves_nothing_installed() {
        let (host, focus_lock) = setup(Config::default());
        host.refuse_registrations(true);

        assert!(matches!(
            focus_lock.start(),
            Err(FocusLockError::HostRegistrationFailed(_))
        ));
        assert_eq!(host.keyboard_tap_count(), 0);
        assert_eq!(host.foreground_listener_count(), 0);
    }
}
