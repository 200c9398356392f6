use std::fmt;

/// Непрозрачный дескриптор окна (HWND)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub usize);

impl WindowHandle {
    pub const NULL: WindowHandle = WindowHandle(0);

    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    #[allow(dead_code)]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "NULL")
        } else {
            write!(f, "0x{:X}", self.0)
        }
    }
}

/// Решение по смене активного окна
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDecision {
    /// Новое окно принято и запомнено как последнее принятое
    Accept,
    /// Попытка перехвата фокуса отклонена, фокус возвращается окну `restore`
    Revert { restore: WindowHandle },
}

impl FocusDecision {
    #[allow(dead_code)]
    pub fn is_revert(&self) -> bool {
        matches!(self, FocusDecision::Revert { .. })
    }
}

impl fmt::Display for FocusDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocusDecision::Accept => write!(f, "ACCEPT"),
            FocusDecision::Revert { restore } => write!(f, "REVERT -> {}", restore),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_handle_display() {
        assert_eq!(WindowHandle::NULL.to_string(), "NULL");
        assert_eq!(WindowHandle::new(0x1A2B).to_string(), "0x1A2B");
        assert!(WindowHandle::default().is_null());
    }

    #[test]
    fn test_focus_decision() {
        let decision = FocusDecision::Revert {
            restore: WindowHandle::new(0x10),
        };
        assert!(decision.is_revert());
        assert_eq!(decision.to_string(), "REVERT -> 0x10");
        assert!(!FocusDecision::Accept.is_revert());
    }
}
