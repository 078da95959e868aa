//! Command Validation Module
//!
//! Commands are never handed to a shell: every tool runs from an argument
//! vector. Validation therefore guards against the two injection paths that
//! remain when arguments come from a caller:
//!
//! - **Program whitelist**: only the registered scanner binaries may run
//! - **Option injection**: positional values (targets, URLs, ports, ...) may
//!   not start with `-`, so a "target" can never become a flag
//! - **Metacharacters in free-form options**: tokens carrying shell syntax
//!   are rejected outright, they can only be an attempt at shell features

use std::path::Path;

use super::registry::ToolKind;

/// Error types for command validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandValidationError {
    #[error("Command '{0}' is not in the allowed whitelist")]
    NotAllowed(String),

    #[error("Command path is absolute and potentially unsafe: '{0}'")]
    AbsolutePath(String),

    #[error("Command path contains directory traversal: '{0}'")]
    DirectoryTraversal(String),

    #[error("Argument '{field}' contains shell metacharacter '{found}'")]
    ShellMetacharacter { field: String, found: char },

    #[error("Argument '{field}' must not start with '-': '{value}'")]
    OptionInjection { field: String, value: String },

    #[error("Argument '{field}' contains control characters")]
    ControlCharacter { field: String },

    #[error("Argument '{field}' must not be empty")]
    Empty { field: String },

    #[error("Argument '{field}' must be alphanumeric: '{value}'")]
    InvalidFlag { field: String, value: String },
}

/// Characters that only mean something to a shell
const SHELL_METACHARACTERS: [char; 11] = [';', '|', '&', '$', '`', '\n', '\r', '(', ')', '<', '>'];

/// Validate a positional value (target, URL, port list, ...)
///
/// Returns the value unchanged so builders can chain on it.
pub fn check_positional<'a>(field: &str, value: &'a str) -> Result<&'a str, CommandValidationError> {
    if value.trim().is_empty() {
        return Err(CommandValidationError::Empty {
            field: field.to_string(),
        });
    }
    if value.starts_with('-') {
        return Err(CommandValidationError::OptionInjection {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    if value.chars().any(char::is_control) {
        return Err(CommandValidationError::ControlCharacter {
            field: field.to_string(),
        });
    }
    Ok(value)
}

/// Validate a short flag body such as nmap's `sV` or `sS`
pub fn check_flag<'a>(field: &str, value: &'a str) -> Result<&'a str, CommandValidationError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CommandValidationError::InvalidFlag {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Split a free-form option string into argument tokens
///
/// Tokens are separated by whitespace. A token containing a shell
/// metacharacter rejects the whole string.
pub fn split_options(field: &str, raw: &str) -> Result<Vec<String>, CommandValidationError> {
    if let Some(found) = raw.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(CommandValidationError::ShellMetacharacter {
            field: field.to_string(),
            found,
        });
    }
    if raw.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return Err(CommandValidationError::ControlCharacter {
            field: field.to_string(),
        });
    }
    Ok(raw.split_whitespace().map(str::to_string).collect())
}

/// Program whitelist enforced by the process runner
#[derive(Debug, Clone)]
pub struct CommandValidator {
    /// Whitelist of allowed programs
    allowed_commands: Vec<String>,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::with_default_whitelist()
    }
}

impl CommandValidator {
    /// Create a validator allowing every registered scanner binary
    pub fn with_default_whitelist() -> Self {
        Self {
            allowed_commands: ToolKind::ALL
                .iter()
                .map(|kind| kind.binary().to_string())
                .collect(),
        }
    }

    /// Create a new validator with a custom whitelist
    pub fn with_whitelist(allowed: Vec<String>) -> Self {
        Self {
            allowed_commands: allowed,
        }
    }

    /// Validate the program a command will execute
    ///
    /// # Example
    ///
    /// ```
    /// use kalidocker::tools::CommandValidator;
    ///
    /// let validator = CommandValidator::default();
    /// assert!(validator.validate_program("nmap").is_ok());
    /// assert!(validator.validate_program("bash").is_err());
    /// ```
    pub fn validate_program(&self, program: &str) -> Result<(), CommandValidationError> {
        if Path::new(program).is_absolute() {
            return Err(CommandValidationError::AbsolutePath(program.to_string()));
        }
        if program.contains("..") {
            return Err(CommandValidationError::DirectoryTraversal(program.to_string()));
        }
        if !self.is_allowed(program) {
            return Err(CommandValidationError::NotAllowed(program.to_string()));
        }
        Ok(())
    }

    /// Check if a program is in the whitelist
    pub fn is_allowed(&self, program: &str) -> bool {
        self.allowed_commands.iter().any(|allowed| allowed == program)
    }
}
