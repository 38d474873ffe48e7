//! Compile-time constants extracted from abstract values.
use strum::{AsRefStr, Display, EnumIs, EnumIter, EnumString};

/// A 64-bit float compared and hashed by its canonical bit pattern.
///
/// `-0.0` is folded onto `0.0` and every NaN onto a single quiet NaN so that
/// equal floats always hash equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct F64(u64);

impl F64 {
    pub fn get(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl From<f64> for F64 {
    fn from(value: f64) -> Self {
        if value == 0.0 {
            F64(0.0f64.to_bits())
        } else if value.is_nan() {
            F64(f64::NAN.to_bits())
        } else {
            F64(value.to_bits())
        }
    }
}

/// Builtin callables of the host runtime that the model knows by name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinFn {
    Dict,
    List,
    Tuple,
    Set,
    Len,
    Isinstance,
    Getattr,
    Hash,
    Id,
    Print,
}

/// A member of a runtime enumeration, e.g. `Color.RED`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumMember {
    pub class: String,
    pub name: String,
}

impl EnumMember {
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
        }
    }
}

/// The result of literal extraction on an abstract value.
///
/// Only the first five variants are *literals* in the narrow sense (see
/// [`Constant::is_literal`]); the rest are constants that can still be named in
/// generated code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(F64),
    Str(String),
    Tuple(Vec<Constant>),
    Enum(EnumMember),
    Builtin(BuiltinFn),
    /// A bound method wrapper of a builtin type, identified by its qualified name.
    Method(String),
}

impl Constant {
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Constant::None
                | Constant::Bool(_)
                | Constant::Int(_)
                | Constant::Float(_)
                | Constant::Str(_)
        )
    }

    pub fn type_name(&self) -> String {
        match self {
            Constant::None => "NoneType".into(),
            Constant::Bool(_) => "bool".into(),
            Constant::Int(_) => "int".into(),
            Constant::Float(_) => "float".into(),
            Constant::Str(_) => "str".into(),
            Constant::Tuple(_) => "tuple".into(),
            Constant::Enum(member) => member.class.clone(),
            Constant::Builtin(_) => "builtin_function_or_method".into(),
            Constant::Method(_) => "method-wrapper".into(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::None => write!(f, "None"),
            Constant::Bool(true) => write!(f, "True"),
            Constant::Bool(false) => write!(f, "False"),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Float(x) => write!(f, "{:?}", x.get()),
            Constant::Str(s) => write!(f, "'{}'", s),
            Constant::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Constant::Enum(member) => write!(f, "{}.{}", member.class, member.name),
            Constant::Builtin(builtin) => write!(f, "{}", builtin),
            Constant::Method(name) => write!(f, "<method-wrapper {}>", name),
        }
    }
}

impl From<bool> for Constant {
    fn from(value: bool) -> Self {
        Constant::Bool(value)
    }
}

impl From<i64> for Constant {
    fn from(value: i64) -> Self {
        Constant::Int(value)
    }
}

impl From<i32> for Constant {
    fn from(value: i32) -> Self {
        Constant::Int(value as i64)
    }
}

impl From<usize> for Constant {
    fn from(value: usize) -> Self {
        Constant::Int(value as i64)
    }
}

impl From<f64> for Constant {
    fn from(value: f64) -> Self {
        Constant::Float(value.into())
    }
}

impl From<&str> for Constant {
    fn from(value: &str) -> Self {
        Constant::Str(value.to_string())
    }
}

impl From<String> for Constant {
    fn from(value: String) -> Self {
        Constant::Str(value)
    }
}

impl From<EnumMember> for Constant {
    fn from(value: EnumMember) -> Self {
        Constant::Enum(value)
    }
}

impl From<BuiltinFn> for Constant {
    fn from(value: BuiltinFn) -> Self {
        Constant::Builtin(value)
    }
}
