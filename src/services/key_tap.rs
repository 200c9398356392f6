use crate::error::{FocusLockError, Result};
use crate::events::{KeyDirection, KeyTransition};
use crate::services::chord_matcher::{ChordMatcher, ChordSpec};
use crate::services::host::{Host, HookId};
use crate::{debug_if_enabled, trace_if_enabled};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Колбэк активации; вызывается из контекста системного хука
pub type ActivationCallback = Arc<dyn Fn() + Send + Sync>;

/// Что считается активацией
enum Trigger {
    /// Любое нажатие клавиши
    AnyKey,
    /// Срабатывание аккорда
    Chord(ChordMatcher),
}

/// Состояние одной сессии перехвата, разделяемое с обработчиком хука
struct TapState {
    host: Arc<dyn Host>,
    active: AtomicBool,
    trigger: Mutex<Trigger>,
    callback: ActivationCallback,
}

impl TapState {
    /// Обработчик каждого системного события.
    ///
    /// Не блокируется и не пропускает панику наружу: событие в любом случае
    /// уходит дальше по цепочке хуков без изменений.
    fn handle(&self, transition: KeyTransition) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }

        trace_if_enabled!("KeyTap: событие {}", transition);

        let activated = {
            // Блокировка занята только во время stop(), событие в этом случае не нужно
            let Some(mut trigger) = self.trigger.try_lock() else {
                debug_if_enabled!("KeyTap: состояние занято, событие {} пропущено", transition);
                return;
            };

            match (&mut *trigger, transition.direction) {
                (Trigger::AnyKey, KeyDirection::Down) => true,
                (Trigger::AnyKey, KeyDirection::Up) => false,
                (Trigger::Chord(matcher), KeyDirection::Down) => {
                    matcher.on_key_down(transition.key, self.host.live_modifiers())
                }
                (Trigger::Chord(matcher), KeyDirection::Up) => {
                    matcher.on_key_up(transition.key);
                    false
                }
            }
        };

        if activated {
            debug_if_enabled!("KeyTap: активация на {}", transition);
            if panic::catch_unwind(AssertUnwindSafe(|| (self.callback)())).is_err() {
                warn!("KeyTap: колбэк активации завершился паникой, событие пропущено дальше");
            }
        }
    }

    fn reset(&self) {
        if let Trigger::Chord(matcher) = &mut *self.trigger.lock() {
            matcher.reset();
        }
    }
}

struct TapSession {
    hook: HookId,
    state: Arc<TapState>,
}

/// Глобальный перехватчик клавиатуры: связывает системный поток ввода с [`ChordMatcher`].
///
/// Одновременно держит не больше одного системного перехватчика.
pub struct KeyTap {
    host: Arc<dyn Host>,
    session: Mutex<Option<TapSession>>,
}

impl KeyTap {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            session: Mutex::new(None),
        }
    }

    /// Запустить перехват аккорда `spec`; `callback` вызывается один раз на каждое срабатывание
    pub fn start<F>(&self, spec: ChordSpec, callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if spec.is_empty() {
            return Err(FocusLockError::NotConfigured);
        }
        let matcher = ChordMatcher::from_spec(&spec)?;
        info!("KeyTap: отслеживаем аккорд {}", spec);
        self.start_with(Trigger::Chord(matcher), Arc::new(callback))
    }

    /// Запустить перехват, в котором активацией считается любое нажатие
    pub fn start_any_key<F>(&self, callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        info!("KeyTap: отслеживаем любые нажатия");
        self.start_with(Trigger::AnyKey, Arc::new(callback))
    }

    fn start_with(&self, trigger: Trigger, callback: ActivationCallback) -> Result<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(FocusLockError::AlreadyRunning("KeyTap"));
        }

        let state = Arc::new(TapState {
            host: self.host.clone(),
            active: AtomicBool::new(true),
            trigger: Mutex::new(trigger),
            callback,
        });

        let handler_state = state.clone();
        let hook = self
            .host
            .install_keyboard_tap(Arc::new(move |transition| handler_state.handle(transition)))?;

        info!("KeyTap запущен ({})", hook);
        *session = Some(TapSession { hook, state });
        Ok(())
    }

    /// Снять перехватчик. Безопасно вызывать повторно и без предшествующего `start`.
    pub fn stop(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };

        // События, пришедшие после начала остановки, игнорируются
        session.state.active.store(false, Ordering::Release);
        self.host.remove_keyboard_tap(session.hook);
        session.state.reset();
        info!("KeyTap остановлен ({})", session.hook);
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }
}

impl Drop for KeyTap {
    fn drop(&mut self) {
        self.stop();
    }
}
