use crate::error::Result;
use crate::events::{Key, KeyDirection, KeyTransition, ModifierSet, WindowHandle};
use crate::focus_error;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HINSTANCE, HMODULE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, VIRTUAL_KEY, VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetForegroundWindow, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK,
    KBDLLHOOKSTRUCT, MSG, PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT,
    WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::r#trait::{ForegroundHandler, Host, HookId, KeyboardHandler};

// Win32 константы WinEvent
const EVENT_SYSTEM_FOREGROUND: u32 = 0x0003;
const WINEVENT_OUTOFCONTEXT: u32 = 0x0000;

// Процедуры хуков не получают контекста, поэтому обработчики живут в статических слотах
static KEYBOARD_SLOT: Lazy<RwLock<Option<(HookId, KeyboardHandler)>>> =
    Lazy::new(|| RwLock::new(None));
static FOREGROUND_SLOT: Lazy<RwLock<Option<(HookId, ForegroundHandler)>>> =
    Lazy::new(|| RwLock::new(None));

/// Хост на системных перехватчиках Win32 (WH_KEYBOARD_LL + EVENT_SYSTEM_FOREGROUND)
pub struct WindowsHost {
    next_id: AtomicU64,
    keyboard_hook: AtomicPtr<c_void>,
    foreground_hook: AtomicPtr<c_void>,
    pump_thread: AtomicU32,
    quit_requested: AtomicBool,
}

impl WindowsHost {
    pub fn new() -> Self {
        info!("Инициализация WindowsHost");
        Self {
            next_id: AtomicU64::new(1),
            keyboard_hook: AtomicPtr::new(null_mut()),
            foreground_hook: AtomicPtr::new(null_mut()),
            pump_thread: AtomicU32::new(0),
            quit_requested: AtomicBool::new(false),
        }
    }

    fn next_hook_id(&self) -> HookId {
        HookId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Host for WindowsHost {
    fn install_keyboard_tap(&self, handler: KeyboardHandler) -> Result<HookId> {
        let mut slot = KEYBOARD_SLOT.write();
        if slot.is_some() {
            return Err(focus_error!(registration, "перехватчик клавиатуры уже установлен"));
        }

        let hook = unsafe {
            let module = GetModuleHandleW(PCWSTR::null())
                .map_err(|e| focus_error!(registration, "GetModuleHandleW: {}", e))?;
            SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), HINSTANCE::from(module), 0)
        }
        .map_err(|e| focus_error!(registration, "SetWindowsHookExW(WH_KEYBOARD_LL): {}", e))?;

        self.keyboard_hook.store(hook.0, Ordering::SeqCst);
        let id = self.next_hook_id();
        *slot = Some((id, handler));
        info!("Установлен низкоуровневый хук клавиатуры ({})", id);
        Ok(id)
    }

    fn remove_keyboard_tap(&self, id: HookId) {
        let mut slot = KEYBOARD_SLOT.write();
        if !matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            return;
        }
        *slot = None;

        let hook = self.keyboard_hook.swap(null_mut(), Ordering::SeqCst);
        if !hook.is_null() {
            if let Err(e) = unsafe { UnhookWindowsHookEx(HHOOK(hook)) } {
                warn!("UnhookWindowsHookEx завершился ошибкой: {}", e);
            }
        }
        info!("Хук клавиатуры снят ({})", id);
    }

    fn install_foreground_listener(&self, handler: ForegroundHandler) -> Result<HookId> {
        let mut slot = FOREGROUND_SLOT.write();
        if slot.is_some() {
            return Err(focus_error!(registration, "слушатель смены окна уже установлен"));
        }

        let hook = unsafe {
            SetWinEventHook(
                EVENT_SYSTEM_FOREGROUND,
                EVENT_SYSTEM_FOREGROUND,
                HMODULE::default(),
                Some(foreground_proc),
                0,
                0,
                WINEVENT_OUTOFCONTEXT,
            )
        };
        if hook.is_invalid() {
            return Err(focus_error!(
                registration,
                "SetWinEventHook(EVENT_SYSTEM_FOREGROUND): {}",
                windows::core::Error::from_win32()
            ));
        }

        self.foreground_hook.store(hook.0, Ordering::SeqCst);
        let id = self.next_hook_id();
        *slot = Some((id, handler));
        info!("Установлен хук смены активного окна ({})", id);
        Ok(id)
    }

    fn remove_foreground_listener(&self, id: HookId) {
        let mut slot = FOREGROUND_SLOT.write();
        if !matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            return;
        }
        *slot = None;

        let hook = self.foreground_hook.swap(null_mut(), Ordering::SeqCst);
        if !hook.is_null() && !unsafe { UnhookWinEvent(HWINEVENTHOOK(hook)) }.as_bool() {
            warn!("UnhookWinEvent завершился ошибкой");
        }
        info!("Хук смены активного окна снят ({})", id);
    }

    fn force_foreground(&self, window: WindowHandle) -> bool {
        unsafe { SetForegroundWindow(HWND(window.value() as *mut c_void)) }.as_bool()
    }

    fn live_modifiers(&self) -> ModifierSet {
        let mut modifiers = ModifierSet::empty();
        if is_key_down(VK_SHIFT) {
            modifiers.insert(ModifierSet::SHIFT);
        }
        if is_key_down(VK_CONTROL) {
            modifiers.insert(ModifierSet::CONTROL);
        }
        if is_key_down(VK_MENU) {
            modifiers.insert(ModifierSet::ALT);
        }
        if is_key_down(VK_LWIN) || is_key_down(VK_RWIN) {
            modifiers.insert(ModifierSet::SUPER);
        }
        modifiers
    }

    fn pump(&self) -> Result<()> {
        self.pump_thread
            .store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

        // Очередь сообщений потока создаётся первым Peek; до этого WM_QUIT не доставить
        let mut msg = MSG::default();
        unsafe {
            let _ = PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_NOREMOVE);
        }

        if self.quit_requested.load(Ordering::SeqCst) {
            self.pump_thread.store(0, Ordering::SeqCst);
            return Ok(());
        }

        info!("Цикл сообщений Win32 запущен");
        let result = loop {
            let status = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
            match status.0 {
                0 => break Ok(()),
                -1 => {
                    break Err(focus_error!(
                        internal,
                        "GetMessageW: {}",
                        windows::core::Error::from_win32()
                    ))
                }
                _ => unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                },
            }
        };

        self.pump_thread.store(0, Ordering::SeqCst);
        info!("Цикл сообщений Win32 завершён");
        result
    }

    fn quit(&self) {
        self.quit_requested.store(true, Ordering::SeqCst);

        let thread_id = self.pump_thread.load(Ordering::SeqCst);
        if thread_id != 0 {
            if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
                debug!("PostThreadMessageW(WM_QUIT) не доставлен: {}", e);
            }
        }
    }
}

fn is_key_down(vk: VIRTUAL_KEY) -> bool {
    // Старший бит означает, что клавиша сейчас нажата
    unsafe { GetAsyncKeyState(vk.0 as i32) } < 0
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let direction = match wparam.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyDirection::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyDirection::Up),
            _ => None,
        };

        if let Some(direction) = direction {
            // lparam при HC_ACTION указывает на KBDLLHOOKSTRUCT
            let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            let transition =
                KeyTransition::new(Key::from_virtual_key(info.vkCode as u16), direction);

            // Не ждём блокировку: занята только установкой/снятием хука
            let handler = KEYBOARD_SLOT
                .try_read()
                .and_then(|slot| slot.as_ref().map(|(_, handler)| handler.clone()));
            if let Some(handler) = handler {
                handler(transition);
            }
        }
    }

    // Событие всегда уходит дальше без изменений
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

unsafe extern "system" fn foreground_proc(
    _hook: HWINEVENTHOOK,
    event: u32,
    hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _id_event_thread: u32,
    _dwms_event_time: u32,
) {
    if event != EVENT_SYSTEM_FOREGROUND {
        return;
    }

    let handler = FOREGROUND_SLOT
        .try_read()
        .and_then(|slot| slot.as_ref().map(|(_, handler)| handler.clone()));
    if let Some(handler) = handler {
        handler(WindowHandle::new(hwnd.0 as usize));
    }
}
