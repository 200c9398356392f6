use crate::debug_if_enabled;
use crate::events::{FocusDecision, WindowHandle};
use crate::services::host::Host;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Default)]
struct GuardState {
    // None - нажатий ещё не было ("бесконечно давно")
    last_activity: Option<Instant>,
    last_accepted: WindowHandle,
}

/// Счётчики решений за время работы
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    pub accepted: u64,
    pub reverted: u64,
}

/// Координатор защиты фокуса.
///
/// Единственный владелец времени последнего нажатия и последнего принятого окна.
/// Оба поля меняются только через `on_key_activity*` и `on_foreground_change*`.
pub struct FocusGuard {
    host: Arc<dyn Host>,
    throttle: Duration,
    state: Mutex<GuardState>,
    accepted: AtomicU64,
    reverted: AtomicU64,
}

impl FocusGuard {
    pub fn new(host: Arc<dyn Host>, throttle: Duration) -> Self {
        info!("Инициализация FocusGuard (окно троттлинга: {}мс)", throttle.as_millis());
        Self {
            host,
            throttle,
            state: Mutex::new(GuardState::default()),
            accepted: AtomicU64::new(0),
            reverted: AtomicU64::new(0),
        }
    }

    pub fn on_key_activity(&self) {
        self.on_key_activity_at(Instant::now());
    }

    /// Запомнить момент нажатия. Время активности никогда не уменьшается.
    pub fn on_key_activity_at(&self, now: Instant) {
        let mut state = self.state.lock();
        state.last_activity = Some(match state.last_activity {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    pub fn on_foreground_change(&self, window: WindowHandle) -> FocusDecision {
        self.on_foreground_change_at(window, Instant::now())
    }

    pub fn on_foreground_change_at(&self, window: WindowHandle, now: Instant) -> FocusDecision {
        let decision = {
            let mut state = self.state.lock();
            let typing = state
                .last_activity
                .is_some_and(|at| now.saturating_duration_since(at) < self.throttle);

            // Пока ни одно окно не принято, возвращать фокус некуда
            if typing && window != state.last_accepted && !state.last_accepted.is_null() {
                FocusDecision::Revert {
                    restore: state.last_accepted,
                }
            } else {
                state.last_accepted = window;
                FocusDecision::Accept
            }
        };

        match decision {
            FocusDecision::Accept => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                debug_if_enabled!("FocusGuard: окно {}: {}", window, decision);
            }
            FocusDecision::Revert { restore } => {
                self.reverted.fetch_add(1, Ordering::Relaxed);
                info!(
                    "FocusGuard: окно {} пытается перехватить фокус во время набора: {}",
                    window, decision
                );
                // Отказ ОС не ошибка: это лишь подсказка системе
                if !self.host.force_foreground(restore) {
                    warn!("FocusGuard: система отклонила возврат фокуса окну {}", restore);
                }
            }
        }

        decision
    }

    #[allow(dead_code)]
    pub fn last_accepted(&self) -> WindowHandle {
        self.state.lock().last_accepted
    }

    #[allow(dead_code)]
    pub fn last_activity(&self) -> Option<Instant> {
        self.state.lock().last_activity
    }

    #[allow(dead_code)]
    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn stats(&self) -> GuardStats {
        GuardStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            reverted: self.reverted.load(Ordering::Relaxed),
        }
    }
}
