use thiserror::Error;

/// A language-level exception.
///
/// These surface from user-visible hooks (such as `const_missing`) and are
/// propagated by the IR unmodified.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RubyError {
    #[error("uninitialized constant {module}::{name}")]
    NameError { module: String, name: String },
    #[error("{class}: {message}")]
    Raised { class: String, message: String },
}

impl RubyError {
    pub fn raised(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            class: class.into(),
            message: message.into(),
        }
    }
}
