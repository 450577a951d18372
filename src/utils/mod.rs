use std::cmp::Ordering;

// ✅ Макросы условного логирования для оптимизации производительности
#[macro_export]
macro_rules! debug_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! trace_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!($($arg)*);
        }
    };
}

/// Имя процесса в канонической форме: без пробелов по краям, в нижнем регистре, без `.exe`
pub fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

/// Регистронезависимое ординальное сравнение: посимвольно после приведения к верхнему регистру
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let fold = |s: &str| s.chars().flat_map(char::to_uppercase).collect::<Vec<char>>();
    fold(a).cmp(&fold(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_process_name() {
        assert_eq!(normalize_process_name("Code.EXE"), "code");
        assert_eq!(normalize_process_name("  Notepad++ "), "notepad++");
        assert_eq!(normalize_process_name("idea64"), "idea64");
        assert_eq!(normalize_process_name(".exe"), "");
    }

    #[test]
    fn test_cmp_ignore_case() {
        assert_eq!(cmp_ignore_case("alpha", "ALPHA"), Ordering::Equal);
        assert_eq!(cmp_ignore_case("Alpha", "beta"), Ordering::Less);
        assert_eq!(cmp_ignore_case("zeta", "Beta"), Ordering::Greater);
        // '_' идёт после букв при сравнении в верхнем регистре
        assert_eq!(cmp_ignore_case("_tmp", "zeta"), Ordering::Greater);
    }
}
