//! Symbolic collection values for a speculative trace compiler.
//!
//! While a program is traced, the collections it touches (`dict`, `OrderedDict`,
//! `defaultdict`, `set`, records of schema libraries, user `OrderedDict`
//! subclasses and the host's module registry) are modelled by immutable
//! abstract [`value::Value`]s. Each query attaches the guards under which its
//! answer stays valid, each mutation produces a new version substituted through
//! the [`trace::TraceState`], and every modelled collection can be turned back
//! into build operations by [`codegen`].
//!
//! Most consumers start from [`trace::TraceState`], wrap runtime values with
//! [`trace::TraceState::wrap_raw`] and then use [`value::Value::call_method`],
//! [`value::Value::var_getattr`] and [`value::Value::call_function`].

pub mod builder;
pub mod codegen;
pub mod collections;
pub mod hashable;
pub mod magic;
pub mod skip;
pub mod trace;
pub mod utils;
pub mod value;

pub use utils::error::{Error, SymResult};
