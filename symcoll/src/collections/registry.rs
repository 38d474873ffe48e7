//! Lazy view over the host's module registry.
//!
//! The registry is owned and mutated by the host, so nothing is copied up
//! front: every membership query reads the live table and records the answer
//! as a guard on the registry's origin.
use log::info;

use crate::{
    builder::ValueBuilder,
    codegen::{BuildOp, Codegen},
    collections::{MethodName, expect_args, propagate_call},
    trace::TraceState,
    utils::error::{Error, SymResult},
    value::{
        Kwargs, Value, ValueKind, constant::Constant, guard::GuardKind, origin::Origin,
        raw::{ModuleRegistry, RawValue},
    },
};

#[derive(Debug, Clone)]
pub struct GlobalRegistrySnapshot {
    registry: ModuleRegistry,
    /// Dotted path of the registry, e.g. `sys.modules`.
    name: String,
}

impl GlobalRegistrySnapshot {
    pub fn new(registry: ModuleRegistry, name: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
        }
    }

    pub fn into_value(self, origin: Origin) -> Value {
        Value::from_parts(
            ValueKind::Registry(self),
            Some(origin),
            Default::default(),
            false,
        )
    }

    /// Live membership of `key`, together with the guard recording it.
    ///
    /// Any literal key may be asked about; only strings can ever be present.
    fn contains_helper(&self, this: &Value, key: &Value) -> SymResult<(Constant, bool, Value)> {
        let key = key.as_constant().map_err(|_| {
            Error::unsupported(format!(
                "{} lookup with a `{}` key",
                self.name,
                key.type_name()
            ))
        })?;
        let present = key.as_str().is_some_and(|name| self.registry.contains(name));
        let guard = this.origin().map(|origin| {
            origin.make_guard(GuardKind::DictContains {
                key: key.clone(),
                invert: !present,
            })
        });
        let answer = Value::literal(present).with_guards(guard.as_ref());
        Ok((key, present, answer))
    }

    fn load_module(&self, tx: &mut TraceState, this: &Value, name: &str) -> SymResult<Value> {
        let module = self.registry.get(name).ok_or_else(|| Error::KeyNotFound {
            container: self.name.clone(),
            key: name.to_string(),
        })?;
        let origin = this.origin().map(|origin| origin.item(name));
        ValueBuilder::new(tx, origin).wrap(&RawValue::Module(module))
    }

    pub fn call_method(
        &self,
        tx: &mut TraceState,
        this: &Value,
        method: MethodName,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        let options = propagate_call(this, args, kwargs);

        let result = match method {
            MethodName::Contains => {
                let [key] = expect_args::<1>(this, method, args, kwargs)?;
                self.contains_helper(this, key)?.2
            }
            MethodName::GetItem => {
                let [key] = expect_args::<1>(this, method, args, kwargs)?;
                let (key, present, answer) = self.contains_helper(this, key)?;
                let Some(name) = key.as_str().filter(|_| present) else {
                    return Err(Error::KeyNotFound {
                        container: self.name.clone(),
                        key: key.to_string(),
                    });
                };
                self.load_module(tx, this, name)?
                    .with_guards(answer.guards())
            }
            MethodName::Get if (1..=2).contains(&args.len()) && kwargs.is_empty() => {
                let (key, present, answer) = self.contains_helper(this, &args[0])?;
                let value = match key.as_str().filter(|_| present) {
                    Some(name) => self.load_module(tx, this, name)?,
                    None => args.get(1).cloned().unwrap_or_else(Value::none),
                };
                value.with_guards(answer.guards())
            }
            _ => {
                info!(
                    "Materializing {} to model `{}`; this is imprecise",
                    self.name, method
                );
                let snapshot = tx.wrap_raw(&self.registry.snapshot(), this.origin().cloned())?;
                return snapshot.call_method(tx, method.as_ref(), args, kwargs);
            }
        };

        Ok(result.with_guards(&options))
    }

    /// Reload the registry itself, e.g. `sys.modules`.
    pub fn reconstruct(&self, codegen: &mut Codegen) {
        let (module, attr) = self.name.rsplit_once('.').unwrap_or(("builtins", self.name.as_str()));
        codegen.push(BuildOp::load_global(module, attr));
    }
}
