use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrouperError {
    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка сериализации: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Перечисление окон не удалось: {0}")]
    Enumeration(String),

    #[error("Окно {0} недоступно")]
    WindowGone(String),

    #[error("Процесс {0} недоступен")]
    ProcessGone(u32),

    #[error("Мониторы не обнаружены")]
    NoMonitors,

    #[error("Основной монитор не найден")]
    NoPrimaryMonitor,

    #[error("Ошибка системного вызова {call}: {message}")]
    Os { call: &'static str, message: String },

    #[error("Таймаут: {0}")]
    Timeout(String),

    #[error("Некорректная команда: {0}")]
    Command(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl GrouperError {
    pub fn os(call: &'static str, message: impl Into<String>) -> Self {
        GrouperError::Os {
            call,
            message: message.into(),
        }
    }

    /// Ошибка касается одного окна и не должна прерывать снимок целиком
    pub fn is_per_window(&self) -> bool {
        matches!(
            self,
            GrouperError::WindowGone(_) | GrouperError::ProcessGone(_) | GrouperError::Os { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GrouperError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! grouper_error {
    (enumeration, $($arg:tt)*) => {
        $crate::error::GrouperError::Enumeration(format!($($arg)*))
    };
    (timeout, $($arg:tt)*) => {
        $crate::error::GrouperError::Timeout(format!($($arg)*))
    };
    (command, $($arg:tt)*) => {
        $crate::error::GrouperError::Command(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::GrouperError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::GrouperError::Internal(format!($($arg)*))
    };
}
