#![allow(dead_code)]

use symcoll::{
    codegen::{BuildOp, reconstruct},
    trace::TraceState,
    utils::conf::TraceConfig,
    value::{
        Kwargs, Value, ValueKind,
        constant::Constant,
        raw::{DictKind, RawValue},
    },
};

pub fn new_trace() -> TraceState {
    TraceState::new(TraceConfig::default())
}

pub fn lit(c: impl Into<Constant>) -> Value {
    Value::literal(c)
}

pub fn kwargs<const N: usize>(pairs: [(&str, Value); N]) -> Kwargs {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// `this.name(*args)` with no keyword arguments.
pub fn call(tx: &mut TraceState, this: &Value, name: &str, args: &[Value]) -> Value {
    this.call_method(tx, name, args, &Kwargs::new())
        .unwrap_or_else(|err| panic!("{}() on {} failed: {}", name, this, err))
}

pub fn constant(value: &Value) -> Constant {
    value
        .as_constant()
        .unwrap_or_else(|err| panic!("{} is not a literal: {}", value, err))
}

/// Literal keys of any iterable value, in iteration order.
pub fn constants_of(value: &Value) -> Vec<Constant> {
    value
        .unpack_sequence()
        .expect("iterable value")
        .iter()
        .map(constant)
        .collect()
}

pub fn is_tensor(value: &Value) -> bool {
    matches!(value.kind(), ValueKind::Tensor { .. })
}

#[derive(Debug)]
enum Slot {
    Value(RawValue),
    Callable(String),
}

/// Execute build operations against concrete values and return what is left on
/// the stack. Keyword calls of classes produce an ordered dict of their
/// keyword arguments.
pub fn replay(ops: &[BuildOp]) -> RawValue {
    let mut stack: Vec<Slot> = Vec::new();

    fn pop_values(stack: &mut Vec<Slot>, n: usize) -> Vec<RawValue> {
        let values = stack.split_off(stack.len() - n);
        values
            .into_iter()
            .map(|slot| match slot {
                Slot::Value(value) => value,
                Slot::Callable(name) => panic!("`{}` used as a value", name),
            })
            .collect()
    }

    fn pop_callable(stack: &mut Vec<Slot>) -> String {
        match stack.pop() {
            Some(Slot::Callable(name)) => name,
            other => panic!("expected a callable, found {:?}", other),
        }
    }

    fn items_of(value: RawValue) -> Vec<(RawValue, RawValue)> {
        match value {
            RawValue::Dict { items, .. } => items,
            other => panic!("expected a dict, found {:?}", other),
        }
    }

    for op in ops {
        match op {
            BuildOp::LoadConst(c) => stack.push(Slot::Value(RawValue::Constant(c.clone()))),
            BuildOp::LoadGlobal { module, attr } => {
                stack.push(Slot::Callable(format!("{}.{}", module, attr)))
            }
            BuildOp::LoadClass { module, name } => {
                stack.push(Slot::Callable(format!("{}.{}", module, name)))
            }
            BuildOp::BuildTuple(n) => {
                let items = pop_values(&mut stack, *n);
                stack.push(Slot::Value(RawValue::Tuple(items)));
            }
            BuildOp::BuildList(n) => {
                let items = pop_values(&mut stack, *n);
                stack.push(Slot::Value(RawValue::List(items)));
            }
            BuildOp::BuildMap(n) => {
                let flat = pop_values(&mut stack, 2 * n);
                let mut pairs = Vec::with_capacity(*n);
                let mut flat = flat.into_iter();
                while let (Some(k), Some(v)) = (flat.next(), flat.next()) {
                    pairs.push((k, v));
                }
                stack.push(Slot::Value(RawValue::dict(pairs)));
            }
            BuildOp::BuildSet(n) => {
                let items = pop_values(&mut stack, *n);
                stack.push(Slot::Value(RawValue::Set(items)));
            }
            BuildOp::CallFunction(n) => {
                let mut args = pop_values(&mut stack, *n).into_iter();
                let callee = pop_callable(&mut stack);
                let result = match (callee.as_str(), args.next(), args.next()) {
                    ("builtins.set", Some(set @ RawValue::Set(_)), None) => set,
                    ("collections.OrderedDict", Some(dict), None) => RawValue::Dict {
                        kind: DictKind::OrderedDict,
                        default_factory: None,
                        items: items_of(dict),
                    },
                    ("collections.defaultdict", Some(factory), Some(dict)) => RawValue::Dict {
                        kind: DictKind::DefaultDict,
                        default_factory: (!factory.is_none()).then(|| Box::new(factory)),
                        items: items_of(dict),
                    },
                    (callee, ..) => panic!("cannot replay a call of `{}`", callee),
                };
                stack.push(Slot::Value(result));
            }
            BuildOp::CallFunctionKw { argc, names } => {
                assert_eq!(*argc, names.len(), "only keyword arguments are replayed");
                let values = pop_values(&mut stack, *argc);
                pop_callable(&mut stack);
                let items = names
                    .iter()
                    .map(|name| RawValue::from(name.as_str()))
                    .zip(values)
                    .collect();
                stack.push(Slot::Value(RawValue::Dict {
                    kind: DictKind::OrderedDict,
                    default_factory: None,
                    items,
                }));
            }
            BuildOp::LoadSource(_) | BuildOp::LoadGraphOutput(_) => {
                panic!("replay of {:?} needs a runtime frame", op)
            }
        }
    }

    assert_eq!(stack.len(), 1, "replay must leave exactly one value");
    match stack.pop() {
        Some(Slot::Value(value)) => value,
        other => panic!("replay left {:?}", other),
    }
}

pub fn replay_value(value: &Value) -> RawValue {
    replay(&reconstruct(value).expect("reconstructible value"))
}
