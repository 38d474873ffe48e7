//! Interpreter-side state of one trace.
//!
//! Only what the collection model needs is kept: the frame's locals, its value
//! stack and the log of substitutions performed when collections are mutated.
use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    builder::ValueBuilder,
    collections::{
        mapping::{Items, MappingLike},
        mapping_like,
        registry::GlobalRegistrySnapshot,
    },
    utils::{
        conf::TraceConfig,
        error::{Error, SymResult},
    },
    value::{
        Kwargs, PlaceholderId, Value, ValueKind, VarId,
        class::UserFunction,
        origin::Origin,
        raw::{ModuleRegistry, RawTensor, RawValue},
    },
};

/// One `old -> new` redirection performed by [`TraceState::replace_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution {
    pub old: VarId,
    pub new: VarId,
}

#[derive(Debug)]
pub struct TraceState {
    config: TraceConfig,
    locals: IndexMap<String, Value>,
    stack: Vec<Value>,
    substitutions: Vec<Substitution>,
    placeholders: HashMap<u64, PlaceholderId>,
}

impl TraceState {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            config,
            locals: IndexMap::new(),
            stack: Vec::new(),
            substitutions: Vec::new(),
            placeholders: HashMap::new(),
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn store_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    /// Redirect every live reference to `old`, including references nested in
    /// containers held by the frame, to `new`.
    ///
    /// Either every reference is redirected or, on error, none is.
    pub fn replace_all(&mut self, old: &Value, new: Value) -> SymResult<Value> {
        if !old.is_mutable() {
            return Err(Error::MutationOfImmutable {
                container: old.type_name(),
                method: "replace_all".into(),
            });
        }

        let locals = self
            .locals
            .iter()
            .map(|(name, value)| (name.clone(), substitute(value, old, &new)))
            .collect();
        let stack = self
            .stack
            .iter()
            .map(|value| substitute(value, old, &new))
            .collect();

        self.locals = locals;
        self.stack = stack;
        self.substitutions.push(Substitution {
            old: old.id(),
            new: new.id(),
        });
        debug!("Replaced {} with {}", old.id(), new.id());
        Ok(new)
    }

    /// Trace a call of `function` by running its body against this state.
    pub fn inline_user_function(
        &mut self,
        function: &UserFunction,
        args: Vec<Value>,
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        trace!(
            "Inlining `{}` with {} arguments",
            function.name,
            args.len() + kwargs.len()
        );
        function.invoke(self, &args, kwargs)
    }

    /// Model a concrete runtime value met for the first time.
    pub fn wrap_raw(&mut self, raw: &RawValue, origin: Option<Origin>) -> SymResult<Value> {
        ValueBuilder::new(self, origin).wrap(raw)
    }

    /// The view over `registry`, found at the configured registry path.
    pub fn registry_view(&self, registry: ModuleRegistry) -> Value {
        let name = self.config.registry_name.clone();
        let mut segments = name.split('.');
        let root = Origin::global(segments.next().unwrap_or_default());
        let origin = segments.fold(root, |origin, segment| origin.attr(segment));
        GlobalRegistrySnapshot::new(registry, name).into_value(origin)
    }

    /// Placeholder of a runtime tensor; the same tensor always gets the same placeholder.
    pub fn placeholder_for(&mut self, tensor: RawTensor) -> PlaceholderId {
        *self
            .placeholders
            .entry(tensor.id)
            .or_insert_with(PlaceholderId::fresh)
    }
}

/// `value` with every occurrence of `old` replaced by `new`. Containers that
/// hold `old` keep their identity.
fn substitute(value: &Value, old: &Value, new: &Value) -> Value {
    if value.is(old) {
        return new.clone();
    }

    let substitute_all = |items: &[Value]| -> Option<Vec<Value>> {
        let replaced: Vec<Value> = items.iter().map(|v| substitute(v, old, new)).collect();
        let changed = replaced.iter().zip(items).any(|(a, b)| !a.is(b));
        changed.then_some(replaced)
    };

    match value.kind() {
        ValueKind::Tuple(items) => substitute_all(items.as_slice())
            .map(|items| value.with_kind(ValueKind::Tuple(items)))
            .unwrap_or_else(|| value.clone()),
        ValueKind::List(items) => substitute_all(items.as_slice())
            .map(|items| value.with_kind(ValueKind::List(items)))
            .unwrap_or_else(|| value.clone()),
        _ => match mapping_like(value) {
            Some(mapping) => {
                let base = mapping.base();
                let values: Vec<Value> = base.values().cloned().collect();
                match substitute_all(values.as_slice()) {
                    Some(values) => {
                        let items: Items = base.items().keys().cloned().zip(values).collect();
                        value.with_kind(mapping.with_items(items))
                    }
                    None => value.clone(),
                }
            }
            // set elements and keys are hashable, hence never mutable containers
            None => value.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::mapping::{MappingType, SymbolicMapping};

    #[test]
    fn nested_references_are_redirected_in_place() {
        let mut tx = TraceState::new(TraceConfig::default());
        let inner = Value::list(vec![Value::literal(1)]);
        let outer = SymbolicMapping::from_items(
            MappingType::Dict,
            [(Value::literal("inner"), inner.clone())],
        )
        .unwrap()
        .into_value();
        tx.store_local("outer", outer.clone());
        tx.push(Value::tuple(vec![inner.clone()]));

        let next = inner.next_version(ValueKind::List(vec![]));
        tx.replace_all(&inner, next.clone()).unwrap();

        let outer_now = tx.local("outer").unwrap();
        assert!(outer_now.is(&outer));
        let nested = crate::collections::as_mapping(outer_now)
            .unwrap()
            .values()
            .next()
            .unwrap()
            .clone();
        assert!(nested.is(&next));
        let ValueKind::Tuple(on_stack) = tx.stack()[0].kind() else {
            panic!("expected a tuple on the stack");
        };
        assert!(on_stack[0].is(&next));
        assert_eq!(
            tx.substitutions(),
            &[Substitution {
                old: inner.id(),
                new: next.id()
            }]
        );
    }

    #[test]
    fn immutable_values_cannot_be_replaced() {
        let mut tx = TraceState::new(TraceConfig::default());
        let tuple = Value::tuple(vec![]);
        tx.store_local("t", tuple.clone());
        let err = tx
            .replace_all(&tuple, Value::tuple(vec![Value::literal(1)]))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(tx.local("t").unwrap().is(&tuple));
        assert!(tx.substitutions().is_empty());
    }

    #[test]
    fn registry_view_origin_follows_the_configured_path() {
        let tx = TraceState::new(TraceConfig::default());
        let view = tx.registry_view(ModuleRegistry::new());
        assert_eq!(view.origin().unwrap().to_string(), "G['sys'].modules");
    }
}
