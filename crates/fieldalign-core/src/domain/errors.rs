use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AlignResult<T> = Result<T, AlignError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignErrorCategory {
    ConfigurationError,
    SafetyLimitViolation,
    HardwareError,
    InternalError,
}

impl AlignErrorCategory {
    pub const fn exit_mapping(self) -> ExitCodeMapping {
        match self {
            Self::ConfigurationError => ExitCodeMapping {
                exit_code: 2,
                rust_category: "ConfigurationError",
                operator_class: "CONFIG_FATAL",
            },
            Self::SafetyLimitViolation => ExitCodeMapping {
                exit_code: 3,
                rust_category: "SafetyLimitViolation",
                operator_class: "SAFETY_FATAL",
            },
            Self::HardwareError => ExitCodeMapping {
                exit_code: 4,
                rust_category: "HardwareError",
                operator_class: "HW_FATAL",
            },
            Self::InternalError => ExitCodeMapping {
                exit_code: 5,
                rust_category: "InternalError",
                operator_class: "SYS_FATAL",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.exit_mapping().exit_code
    }

    pub const fn rust_category(self) -> &'static str {
        self.exit_mapping().rust_category
    }

    pub const fn operator_class(self) -> &'static str {
        self.exit_mapping().operator_class
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodeMapping {
    pub exit_code: i32,
    pub rust_category: &'static str,
    pub operator_class: &'static str,
}

/// Fatal error raised by any alignment operation.
///
/// Every variant aborts the call that produced it; ramps already completed
/// are left where they stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignError {
    category: AlignErrorCategory,
    code: &'static str,
    message: String,
}

impl AlignError {
    pub fn new(category: AlignErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn configuration(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AlignErrorCategory::ConfigurationError, code, message)
    }

    pub fn safety_limit(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AlignErrorCategory::SafetyLimitViolation, code, message)
    }

    pub fn hardware(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AlignErrorCategory::HardwareError, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AlignErrorCategory::InternalError, code, message)
    }

    pub const fn category(&self) -> AlignErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!(
            "FATAL EXIT CODE: {} ({})",
            self.exit_code(),
            self.category.operator_class()
        )
    }
}

impl Display for AlignError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.rust_category(),
            self.code,
            self.message
        )
    }
}

impl Error for AlignError {}

#[cfg(test)]
mod tests {
    use super::{AlignError, AlignErrorCategory};

    #[test]
    fn exit_mapping_is_stable() {
        let cases = [
            (
                AlignErrorCategory::ConfigurationError,
                2,
                "ConfigurationError",
                "CONFIG_FATAL",
            ),
            (
                AlignErrorCategory::SafetyLimitViolation,
                3,
                "SafetyLimitViolation",
                "SAFETY_FATAL",
            ),
            (
                AlignErrorCategory::HardwareError,
                4,
                "HardwareError",
                "HW_FATAL",
            ),
            (
                AlignErrorCategory::InternalError,
                5,
                "InternalError",
                "SYS_FATAL",
            ),
        ];

        for (category, exit_code, rust_category, operator_class) in cases {
            let mapping = category.exit_mapping();
            assert_eq!(mapping.exit_code, exit_code);
            assert_eq!(mapping.rust_category, rust_category);
            assert_eq!(mapping.operator_class, operator_class);
        }
    }

    #[test]
    fn safety_error_renders_operator_lines() {
        let error = AlignError::safety_limit(
            "SAFETY.FIELD_CEILING",
            "target field 2.000 T exceeds ceiling 1.500 T",
        );

        assert_eq!(error.exit_code(), 3);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [SAFETY.FIELD_CEILING] target field 2.000 T exceeds ceiling 1.500 T"
        );
        assert_eq!(error.fatal_exit_line(), "FATAL EXIT CODE: 3 (SAFETY_FATAL)");
        assert_eq!(
            error.to_string(),
            "SafetyLimitViolation [SAFETY.FIELD_CEILING] target field 2.000 T exceeds ceiling 1.500 T"
        );
    }
}
