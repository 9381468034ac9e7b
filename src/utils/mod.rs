pub mod shell;

use std::path::PathBuf;
use which::which;

use crate::errors::{AppError, Result};

/// Finds a client tool (`pg_dump`, `pg_restore`, `aws`) in the system PATH.
pub fn find_executable(name: &str) -> Result<PathBuf> {
    which(name).map_err(|_| {
        AppError::Configuration(format!(
            "{} executable not found in PATH. Please ensure it is installed and in your PATH.",
            name
        ))
    })
}

/// Quotes `value` for a POSIX shell. Values made only of safe characters
/// are returned unchanged.
pub fn shell_quote(value: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c);
    if !value.is_empty() && value.chars().all(safe) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("postgresql://app@localhost:5432/orders"), "postgresql://app@localhost:5432/orders");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("my dumps/x.dump"), "'my dumps/x.dump'");
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
    }

    #[test]
    fn test_find_executable_missing() {
        assert!(matches!(
            find_executable("pgswap-definitely-not-installed"),
            Err(AppError::Configuration(_))
        ));
    }
}
