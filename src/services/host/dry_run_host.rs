use crate::config::SimulationConfig;
use crate::error::{FocusLockError, Result};
use crate::events::{Key, KeyDirection, KeyTransition, ModifierSet, WindowHandle};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::r#trait::{ForegroundHandler, Host, HookId, KeyboardHandler};

/// Окна, между которыми переключается эмуляция
const FAKE_WINDOWS: [(usize, &str); 3] = [
    (0x1001, "Editor - dry_run"),
    (0x1002, "Terminal - dry_run"),
    (0x1003, "Browser - dry_run"),
];

/// Окно, которое пытается украсть фокус сразу после набора текста
const THIEF_WINDOW: (usize, &str) = (0x2001, "Update notifier - dry_run");

// Клавиши, которые "печатает" эмуляция: h, e, l, o, space
const TYPED_KEYS: [u16; 5] = [0x48, 0x45, 0x4C, 0x4F, 0x20];

/// Хост без системных перехватчиков: события подаются вручную или скриптом эмуляции.
pub struct DryRunHost {
    simulation: SimulationConfig,
    next_id: AtomicU64,
    keyboard_handlers: DashMap<HookId, KeyboardHandler>,
    foreground_handlers: DashMap<HookId, ForegroundHandler>,
    modifiers: RwLock<ModifierSet>,
    foreground: RwLock<WindowHandle>,
    forced: Mutex<Vec<WindowHandle>>,
    // Уведомления, которые "ОС" пришлёт после force_foreground
    pending_echoes: Mutex<VecDeque<WindowHandle>>,
    refuse_registrations: AtomicBool,
    quit_requested: Mutex<bool>,
    quit_signal: Condvar,
}

impl DryRunHost {
    pub fn new(simulation: SimulationConfig) -> Self {
        info!("Инициализация DryRunHost");
        Self {
            simulation,
            next_id: AtomicU64::new(1),
            keyboard_handlers: DashMap::new(),
            foreground_handlers: DashMap::new(),
            modifiers: RwLock::new(ModifierSet::empty()),
            foreground: RwLock::new(WindowHandle::NULL),
            forced: Mutex::new(Vec::new()),
            pending_echoes: Mutex::new(VecDeque::new()),
            refuse_registrations: AtomicBool::new(false),
            quit_requested: Mutex::new(false),
            quit_signal: Condvar::new(),
        }
    }

    /// Эмулировать отказ системы в установке перехватчиков
    pub fn refuse_registrations(&self, refuse: bool) {
        self.refuse_registrations.store(refuse, Ordering::SeqCst);
    }

    /// Доставить переход клавиши всем установленным перехватчикам клавиатуры
    pub fn send_key(&self, key: Key, direction: KeyDirection) -> Result<()> {
        // Клонируем обработчики, чтобы не держать шард DashMap во время вызова
        let handlers: Vec<KeyboardHandler> = self
            .keyboard_handlers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if handlers.is_empty() {
            return Err(FocusLockError::NotRunning("перехватчик клавиатуры"));
        }

        let transition = KeyTransition::new(key, direction);
        for handler in handlers {
            handler(transition);
        }

        // Как и в ОС, состояние модификаторов обновляется уже после хука
        if let Some(flag) = key.as_modifier() {
            let mut modifiers = self.modifiers.write();
            match direction {
                KeyDirection::Down => modifiers.insert(flag),
                KeyDirection::Up => modifiers.remove(flag),
            }
        }

        Ok(())
    }

    /// Нажать и отпустить клавишу
    pub fn tap_key(&self, key: Key) -> Result<()> {
        self.send_key(key, KeyDirection::Down)?;
        self.send_key(key, KeyDirection::Up)
    }

    /// Сделать окно активным и уведомить слушателей
    pub fn switch_foreground(&self, window: WindowHandle) -> Result<()> {
        let handlers: Vec<ForegroundHandler> = self
            .foreground_handlers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if handlers.is_empty() {
            return Err(FocusLockError::NotRunning("слушатель смены окна"));
        }

        *self.foreground.write() = window;
        for handler in handlers {
            handler(window);
        }
        Ok(())
    }

    #[allow(dead_code)]
    pub fn set_modifiers(&self, modifiers: ModifierSet) {
        *self.modifiers.write() = modifiers;
    }

    pub fn foreground(&self) -> WindowHandle {
        *self.foreground.read()
    }

    /// Все окна, которым запрашивался принудительный фокус
    #[allow(dead_code)]
    pub fn forced_windows(&self) -> Vec<WindowHandle> {
        self.forced.lock().clone()
    }

    #[allow(dead_code)]
    pub fn keyboard_tap_count(&self) -> usize {
        self.keyboard_handlers.len()
    }

    #[allow(dead_code)]
    pub fn foreground_listener_count(&self) -> usize {
        self.foreground_handlers.len()
    }

    /// Доставить отложенные уведомления, вызванные force_foreground
    pub fn deliver_echoes(&self) {
        loop {
            let next = self.pending_echoes.lock().pop_front();
            let Some(window) = next else { break };
            debug!("Dry-run: ОС подтверждает смену окна на {}", window);
            if let Err(e) = self.switch_foreground(window) {
                debug!("Dry-run: уведомление не доставлено: {}", e);
            }
        }
    }

    fn next_hook_id(&self) -> HookId {
        HookId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn check_registration(&self, what: &str) -> Result<()> {
        if self.refuse_registrations.load(Ordering::SeqCst) {
            return Err(crate::focus_error!(registration, "dry-run отказ для {}", what));
        }
        Ok(())
    }

    /// Ждать `timeout` или запроса остановки. Возвращает `true`, если запрошена остановка.
    fn wait_for_quit(&self, timeout: Duration) -> bool {
        let mut quit = self.quit_requested.lock();
        if !*quit {
            let _ = self.quit_signal.wait_for(&mut quit, timeout);
        }
        *quit
    }

    fn run_scenario(&self) {
        let key_interval = Duration::from_millis(self.simulation.key_interval_ms);
        let window_interval = Duration::from_millis(self.simulation.window_interval_ms);
        let mut window_index = 0;

        loop {
            // Пользователь сам переключается на окно (давно ничего не печатал)
            let (raw, title) = FAKE_WINDOWS[window_index];
            info!("Dry-run: эмулируем смену окна на: {}", title);
            if let Err(e) = self.switch_foreground(WindowHandle::new(raw)) {
                warn!("Dry-run: {}", e);
            }
            if self.wait_for_quit(key_interval) {
                return;
            }

            // Набор текста в этом окне
            for i in 0..self.simulation.burst_len {
                let key = Key::from_virtual_key(TYPED_KEYS[i % TYPED_KEYS.len()]);
                if let Err(e) = self.tap_key(key) {
                    warn!("Dry-run: {}", e);
                }
                if self.wait_for_quit(key_interval) {
                    return;
                }
            }

            // Чужое окно пытается перехватить фокус посреди набора
            info!("Dry-run: окно \"{}\" пытается украсть фокус", THIEF_WINDOW.1);
            if let Err(e) = self.switch_foreground(WindowHandle::new(THIEF_WINDOW.0)) {
                warn!("Dry-run: {}", e);
            }
            self.deliver_echoes();
            info!("Dry-run: активное окно после попытки: {}", self.foreground());

            if self.wait_for_quit(window_interval) {
                return;
            }
            window_index = (window_index + 1) % FAKE_WINDOWS.len();
        }
    }
}

impl Host for DryRunHost {
    fn install_keyboard_tap(&self, handler: KeyboardHandler) -> Result<HookId> {
        self.check_registration("перехватчика клавиатуры")?;
        let id = self.next_hook_id();
        self.keyboard_handlers.insert(id, handler);
        debug!("Dry-run: установлен перехватчик клавиатуры {}", id);
        Ok(id)
    }

    fn remove_keyboard_tap(&self, id: HookId) {
        if self.keyboard_handlers.remove(&id).is_some() {
            debug!("Dry-run: снят перехватчик клавиатуры {}", id);
        }
    }

    fn install_foreground_listener(&self, handler: ForegroundHandler) -> Result<HookId> {
        self.check_registration("слушателя смены окна")?;
        let id = self.next_hook_id();
        self.foreground_handlers.insert(id, handler);
        debug!("Dry-run: установлен слушатель смены окна {}", id);
        Ok(id)
    }

    fn remove_foreground_listener(&self, id: HookId) {
        if self.foreground_handlers.remove(&id).is_some() {
            debug!("Dry-run: снят слушатель смены окна {}", id);
        }
    }

    fn force_foreground(&self, window: WindowHandle) -> bool {
        info!("[DRY RUN] SetForegroundWindow({})", window);
        self.forced.lock().push(window);
        *self.foreground.write() = window;
        self.pending_echoes.lock().push_back(window);
        true
    }

    fn live_modifiers(&self) -> ModifierSet {
        *self.modifiers.read()
    }

    fn pump(&self) -> Result<()> {
        info!("Dry-run режим - события клавиатуры и окон эмулируются");
        self.run_scenario();
        info!("Dry-run: эмуляция остановлена");
        Ok(())
    }

    fn quit(&self) {
        *self.quit_requested.lock() = true;
        self.quit_signal.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn host() -> DryRunHost {
        DryRunHost::new(SimulationConfig::default())
    }

    #[test]
    fn test_send_key_without_tap_fails() {
        let host = host();
        assert!(matches!(
            host.send_key(Key::CONTROL, KeyDirection::Down),
            Err(FocusLockError::NotRunning(_))
        ));
        assert!(host.switch_foreground(WindowHandle::new(1)).is_err());
    }

    #[test]
    fn test_modifier_state_follows_modifier_keys() {
        let host = host();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_handler = seen.clone();
        let id = host
            .install_keyboard_tap(Arc::new(move |t| seen_in_handler.lock().push(t)))
            .unwrap();

        host.send_key(Key::CONTROL, KeyDirection::Down).unwrap();
        assert_eq!(host.live_modifiers(), ModifierSet::CONTROL);
        host.send_key(Key::SHIFT, KeyDirection::Down).unwrap();
        host.send_key(Key::CONTROL, KeyDirection::Up).unwrap();
        assert_eq!(host.live_modifiers(), ModifierSet::SHIFT);
        assert_eq!(seen.lock().len(), 3);

        host.remove_keyboard_tap(id);
        host.remove_keyboard_tap(id);
        assert_eq!(host.keyboard_tap_count(), 0);
    }

    #[test]
    fn test_refused_registration() {
        let host = host();
        host.refuse_registrations(true);
        assert!(matches!(
            host.install_foreground_listener(Arc::new(|_| {})),
            Err(FocusLockError::HostRegistrationFailed(_))
        ));
        assert!(host.install_keyboard_tap(Arc::new(|_| {})).is_err());
    }

    #[test]
    fn test_force_foreground_queues_echo() {
        let host = host();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_handler = seen.clone();
        host.install_foreground_listener(Arc::new(move |w| seen_in_handler.lock().push(w)))
            .unwrap();

        assert!(host.force_foreground(WindowHandle::new(7)));
        assert_eq!(host.foreground(), WindowHandle::new(7));
        assert!(seen.lock().is_empty());

        host.deliver_echoes();
        assert_eq!(*seen.lock(), vec![WindowHandle::new(7)]);
        assert_eq!(host.forced_windows(), vec![WindowHandle::new(7)]);
    }

    #[test]
    fn test_quit_before_pump_wait() {
        let host = host();
        host.quit();
        assert!(host.wait_for_quit(Duration::from_secs(5)));
    }
}
