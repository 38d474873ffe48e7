use strum::EnumIs;
use thiserror::Error;

/// Failures reported by symbolic collection operations.
///
/// None of these are retried at this layer. Feature gaps (see
/// [`Error::abandons_trace`]) mean the interpreter must fall back to running the
/// offending region without tracing.
#[derive(Debug, EnumIs, Error)]
pub enum Error {
    /// The value cannot be used as a mapping key.
    #[error("A value of kind `{kind}` cannot be used as a mapping key.")]
    UnhashableValue { kind: String },

    /// Lookup of a missing key with no default available.
    #[error("Key `{key}` is not present in the {container}.")]
    KeyNotFound { container: String, key: String },

    /// The value cannot be modelled as an element of a symbolic set.
    #[error("Sets holding values of kind `{kind}` are not supported: {reason}")]
    UnsupportedSetElement { kind: String, reason: String },

    /// The method is not modelled for this container.
    #[error("Method `{name}` is not supported on {container}.")]
    UnsupportedMethod { container: String, name: String },

    /// Bound constructor arguments do not match the declared record fields.
    #[error(
        "Arguments bound for record `{class}` do not match its declared fields. Expected `{expected:?}`, found `{found:?}`."
    )]
    SchemaMismatch {
        class: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Literal extraction was requested on a value that is not a compile-time constant.
    #[error("A value of kind `{kind}` is not a compile-time constant.")]
    NotALiteral { kind: String },

    /// The container cannot be indexed.
    #[error("Values of kind `{kind}` are not subscriptable.")]
    NotSubscriptable { kind: String },

    /// Attribute lookup failed on a record or customized mapping.
    #[error("`{class}` has no attribute `{name}`.")]
    AttributeNotFound { class: String, name: String },

    /// A mutator was invoked on an instance that is not flagged mutable. This
    /// is never reachable through well-formed calls and indicates an internal bug.
    #[error("Method `{method}` mutates an immutable {container}.")]
    MutationOfImmutable { container: String, method: String },

    /// Any other construct the symbolic model does not cover.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParse {
        source: toml::de::Error,
        file: String,
    },
}

impl Error {
    /// Internal contract violations. These are bugs, not user errors.
    pub fn is_fatal(&self) -> bool {
        self.is_mutation_of_immutable()
    }

    /// Feature gaps after which tracing of the current program path is abandoned.
    pub fn abandons_trace(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedSetElement { .. }
                | Error::UnsupportedMethod { .. }
                | Error::Unsupported(_)
        )
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }
}

pub type SymResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_of_failures() {
        let err = Error::MutationOfImmutable {
            container: "dict".into(),
            method: "__setitem__".into(),
        };
        assert!(err.is_fatal());
        assert!(!err.abandons_trace());

        let err = Error::UnsupportedMethod {
            container: "set".into(),
            name: "discard".into(),
        };
        assert!(err.abandons_trace());
        assert!(!err.is_fatal());

        let err = Error::KeyNotFound {
            container: "dict".into(),
            key: "'x'".into(),
        };
        assert!(err.is_key_not_found());
        assert!(!err.abandons_trace());
    }
}
