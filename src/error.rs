use thiserror::Error;

#[derive(Error, Debug)]
pub enum FocusLockError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Некорректная конфигурация аккорда: {0}")]
    InvalidConfiguration(String),

    #[error("Не задано ни одной клавиши для отслеживания")]
    NotConfigured,

    #[error("{0} уже запущен")]
    AlreadyRunning(&'static str),

    #[error("{0} не запущен")]
    NotRunning(&'static str),

    #[error("Система отказала в установке перехватчика: {0}")]
    HostRegistrationFailed(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl FocusLockError {
    pub fn invalid_configuration<T>(msg: impl Into<String>) -> Result<T> {
        Err(FocusLockError::InvalidConfiguration(msg.into()))
    }

    /// Ошибки регистрации и конфигурации фатальны для компонента и не лечатся повтором
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FocusLockError::HostRegistrationFailed(_)
                | FocusLockError::InvalidConfiguration(_)
                | FocusLockError::NotConfigured
                | FocusLockError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FocusLockError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! focus_error {
    (invalid_configuration, $($arg:tt)*) => {
        $crate::error::FocusLockError::InvalidConfiguration(format!($($arg)*))
    };
    (registration, $($arg:tt)*) => {
        $crate::error::FocusLockError::HostRegistrationFailed(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::FocusLockError::Internal(format!($($arg)*))
    };
}
