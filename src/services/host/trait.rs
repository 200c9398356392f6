use crate::config::Config;
use crate::error::Result;
use crate::events::{KeyTransition, ModifierSet, WindowHandle};
use std::fmt;
use std::sync::Arc;

/// Обработчик каждого системного перехода клавиши. Событие всегда пропускается дальше.
pub type KeyboardHandler = Arc<dyn Fn(KeyTransition) + Send + Sync>;

/// Обработчик уведомления о смене активного окна
pub type ForegroundHandler = Arc<dyn Fn(WindowHandle) + Send + Sync>;

/// Идентификатор установленного перехватчика
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Primitives the host OS provides for global input and window-focus interception.
///
/// Hooks must be installed on the thread that later calls [`Host::pump`].
pub trait Host: Send + Sync {
    /// Install a system-wide keyboard interception point
    fn install_keyboard_tap(&self, handler: KeyboardHandler) -> Result<HookId>;

    /// Remove a keyboard interception point; unknown ids are ignored
    fn remove_keyboard_tap(&self, id: HookId);

    /// Install a system-wide foreground-window-change listener
    fn install_foreground_listener(&self, handler: ForegroundHandler) -> Result<HookId>;

    /// Remove a foreground listener; unknown ids are ignored
    fn remove_foreground_listener(&self, id: HookId);

    /// Ask the OS to give input focus to `window`. `false` means the request was declined.
    fn force_foreground(&self, window: WindowHandle) -> bool;

    /// Instantaneous state of Shift/Control/Alt/Win
    fn live_modifiers(&self) -> ModifierSet;

    /// Run the event delivery loop on the current thread until [`Host::quit`]
    fn pump(&self) -> Result<()>;

    /// Make a running or upcoming `pump` return
    fn quit(&self);
}

/// Factory function to create an appropriate host based on the dry_run flag
pub fn create_host(config: &Config, dry_run: bool) -> Result<Arc<dyn Host>> {
    if dry_run {
        return Ok(Arc::new(super::dry_run_host::DryRunHost::new(
            config.simulation.clone(),
        )));
    }

    #[cfg(windows)]
    {
        Ok(Arc::new(super::windows_host::WindowsHost::new()))
    }

    #[cfg(not(windows))]
    {
        Err(crate::focus_error!(
            registration,
            "системные перехватчики доступны только в Windows, используйте --dry-run"
        ))
    }
}
