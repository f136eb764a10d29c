//! Structured Error Handling for fuzzdrive
//!
//! Provides a unified error type with:
//! - Error codes for programmatic handling
//! - Structured error responses (JSON-friendly)
//! - Context preservation through error chains
//!
//! # Error Categories
//!
//! - Declaration errors (1xxx) - raised while building the registry, rule base or bands
//! - Evaluation errors (2xxx) - raised per input tuple
//! - Rule text errors (3xxx) - syntax errors in textual rules
//! - Configuration and data errors (7xxx)
//!
//! Declaration errors are meant to be caught before any evaluation happens.
//! Evaluation errors are reported per input so batch callers can skip,
//! default or abort on a single record.
//!
//! # Example
//!
//! ```rust,ignore
//! use fuzzdrive::error::{EngineError, ErrorCode};
//!
//! fn check(name: &str) -> Result<(), EngineError> {
//!     if name.is_empty() {
//!         return Err(EngineError::new(ErrorCode::UnknownVariable, "empty variable name")
//!             .with_context("variable", name));
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Error Codes
// ============================================================================

/// Unique error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Declaration errors (1xxx)
    /// Variable name already declared
    DuplicateVariable = 1001,
    /// Set name already declared on the variable
    DuplicateSet = 1002,
    /// Variable not declared
    UnknownVariable = 1003,
    /// Set not declared on the variable
    UnknownSet = 1004,
    /// Consequent missing or a second consequent variable used
    InvalidConsequent = 1005,
    /// Antecedent references the consequent variable
    InvalidAntecedent = 1006,
    /// Universe with non-positive step or empty range
    InvalidUniverse = 1007,
    /// Membership break points out of order or malformed
    InvalidMembership = 1008,
    /// Overlapping or malformed action band
    InvalidBand = 1009,
    /// Declaration attempted after the registry was frozen
    RegistryFrozen = 1010,
    /// Rule base without rules
    EmptyRuleBase = 1011,
    /// Rule weight outside [0, 1]
    InvalidRuleWeight = 1012,

    // Evaluation errors (2xxx)
    /// Input tuple lacks a value for an antecedent variable
    MissingInput = 2001,
    /// Input value is not a finite number
    InvalidInput = 2002,
    /// Every rule fired with strength zero
    NoRuleFired = 2003,
    /// No action band contains the crisp output
    Unclassifiable = 2004,

    // Rule text errors (3xxx)
    /// Rule text does not follow the rule grammar
    RuleSyntax = 3001,

    // Config and data errors (7xxx)
    /// Generic config error
    ConfigError = 7000,
    /// Config file not found
    ConfigNotFound = 7001,
    /// Invalid config syntax
    InvalidConfigSyntax = 7002,
    /// Driving log could not be read
    DatasetError = 7003,

    // Internal errors (9xxx)
    /// Internal error
    InternalError = 9000,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a short description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateVariable => "Duplicate variable",
            ErrorCode::DuplicateSet => "Duplicate fuzzy set",
            ErrorCode::UnknownVariable => "Unknown variable",
            ErrorCode::UnknownSet => "Unknown fuzzy set",
            ErrorCode::InvalidConsequent => "Invalid consequent",
            ErrorCode::InvalidAntecedent => "Invalid antecedent",
            ErrorCode::InvalidUniverse => "Invalid universe",
            ErrorCode::InvalidMembership => "Invalid membership function",
            ErrorCode::InvalidBand => "Invalid action band",
            ErrorCode::RegistryFrozen => "Registry is frozen",
            ErrorCode::EmptyRuleBase => "Empty rule base",
            ErrorCode::InvalidRuleWeight => "Invalid rule weight",

            ErrorCode::MissingInput => "Missing input",
            ErrorCode::InvalidInput => "Invalid input",
            ErrorCode::NoRuleFired => "No rule fired",
            ErrorCode::Unclassifiable => "Unclassifiable output",

            ErrorCode::RuleSyntax => "Rule syntax error",

            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ConfigNotFound => "Configuration file not found",
            ErrorCode::InvalidConfigSyntax => "Invalid configuration syntax",
            ErrorCode::DatasetError => "Dataset error",

            ErrorCode::InternalError => "Internal error",
        }
    }

    /// True for codes raised while declaring variables, rules or bands
    pub fn is_declaration(&self) -> bool {
        (1000..2000).contains(&self.code()) || *self == ErrorCode::RuleSyntax
    }

    /// True for codes raised while evaluating one input tuple
    pub fn is_evaluation(&self) -> bool {
        (2000..3000).contains(&self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Error Context
// ============================================================================

/// Additional context information for an error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Key-value pairs of context information
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
    /// Source location (file:line)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Stack of error causes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for fuzzdrive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineError {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
    /// Hint for resolving the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl EngineError {
    /// Create a new error with a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
        }
    }

    // ========================================================================
    // Factory methods
    // ========================================================================

    pub fn duplicate_variable(name: &str) -> Self {
        Self::new(ErrorCode::DuplicateVariable, format!("variable '{}' is already declared", name))
            .with_context("variable", name)
    }

    pub fn duplicate_set(variable: &str, set: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateSet,
            format!("set '{}' is already declared on variable '{}'", set, variable),
        )
        .with_context("variable", variable)
        .with_context("set", set)
    }

    pub fn unknown_variable(name: &str) -> Self {
        Self::new(ErrorCode::UnknownVariable, format!("variable '{}' is not declared", name))
            .with_context("variable", name)
    }

    pub fn unknown_set(variable: &str, set: &str) -> Self {
        Self::new(
            ErrorCode::UnknownSet,
            format!("variable '{}' has no set named '{}'", variable, set),
        )
        .with_context("variable", variable)
        .with_context("set", set)
    }

    pub fn invalid_consequent(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConsequent, message)
    }

    pub fn missing_input(variable: &str) -> Self {
        Self::new(ErrorCode::MissingInput, format!("no input value for variable '{}'", variable))
            .with_context("variable", variable)
    }

    pub fn no_rule_fired() -> Self {
        Self::new(ErrorCode::NoRuleFired, "every rule fired with strength 0; centroid is undefined")
            .with_hint("choose a fallback such as holding the last output or a neutral action")
    }

    pub fn unclassifiable(value: f64) -> Self {
        Self::new(ErrorCode::Unclassifiable, format!("no action band contains {}", value))
            .with_context("value", value.to_string())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Create a dataset error
    pub fn dataset(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatasetError, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Set the error code
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.fields.insert(key.into(), value.into());
        self
    }

    /// Add a cause to the error chain
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.causes.push(cause.into());
        self
    }

    /// Add source location
    pub fn at(mut self, location: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.location = Some(location.into());
        self
    }

    /// Add a hint for resolving the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Raised while declaring variables, sets, rules or bands
    pub fn is_declaration_error(&self) -> bool {
        self.code.is_declaration()
    }

    /// Raised while evaluating a single input tuple
    pub fn is_evaluation_error(&self) -> bool {
        self.code.is_evaluation()
    }

    /// Look up a context field
    pub fn context_field(&self, key: &str) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|c| c.fields.get(key))
            .map(String::as_str)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":"INTERNAL_ERROR","message":"{}"}}"#, self.message)
        })
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;

        if let Some(ref ctx) = self.context {
            if let Some(ref loc) = ctx.location {
                write!(f, " at {}", loc)?;
            }
            if !ctx.causes.is_empty() {
                write!(f, "\nCaused by:")?;
                for cause in &ctx.causes {
                    write!(f, "\n  - {}", cause)?;
                }
            }
        }

        if let Some(ref hint) = self.hint {
            write!(f, "\nHint: {}", hint)?;
        }

        Ok(())
    }
}

impl std::error::Error for EngineError {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::ConfigNotFound,
            _ => ErrorCode::InternalError,
        };
        EngineError::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::internal(err.to_string()).with_context("format", "JSON")
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::config(err.to_string()).with_code(ErrorCode::InvalidConfigSyntax)
    }
}

/// A Result type using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Macros for convenient error creation
// ============================================================================

/// Create an EngineError with context from the current location
#[macro_export]
macro_rules! engine_error {
    ($code:expr, $msg:expr) => {
        $crate::error::EngineError::new($code, $msg)
            .at(format!("{}:{}", file!(), line!()))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::EngineError::new($code, format!($fmt, $($arg)*))
            .at(format!("{}:{}", file!(), line!()))
    };
}

/// Bail out early with an error
#[macro_export]
macro_rules! engine_bail {
    ($code:expr, $msg:expr) => {
        return Err($crate::engine_error!($code, $msg))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::engine_error!($code, $fmt, $($arg)*))
    };
}

/// Ensure a condition holds, or return an error
#[macro_export]
macro_rules! engine_ensure {
    ($cond:expr, $code:expr, $msg:expr) => {
        if !$cond {
            $crate::engine_bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::engine_bail!($code, $fmt, $($arg)*);
        }
    };
}
