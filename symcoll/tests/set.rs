mod common;

use common::*;
use symcoll::{
    collections::set::SymbolicSet,
    value::{
        Kwargs, Value, ValueKind,
        constant::{BuiltinFn, Constant},
        guard::{Guard, GuardKind},
        origin::Origin,
        raw::{RawTensor, RawValue},
    },
};

fn set_of(tx: &mut symcoll::trace::TraceState, items: Vec<Value>) -> Value {
    Value::builtin(BuiltinFn::Set)
        .call_function(tx, &[Value::list(items)], &Kwargs::new())
        .expect("set construction")
}

fn elements(set: &Value) -> &[Value] {
    match set.kind() {
        ValueKind::Set(set) => set.items(),
        _ => panic!("{} is not a set", set),
    }
}

fn duplicate_guards(value: &Value) -> Vec<&Guard> {
    value
        .guards()
        .iter()
        .filter(|g| matches!(g.kind, GuardKind::Duplicate { .. }))
        .collect()
}

#[test]
fn equal_literals_are_stored_once() {
    let mut tx = new_trace();
    let set = set_of(&mut tx, vec![lit("x"), lit("x"), lit(1)]);
    assert_eq!(constant(&call(&mut tx, &set, "__len__", &[])), Constant::Int(2));
    assert_eq!(constants_of(&set), vec![Constant::from("x"), 1.into()]);
}

#[test]
fn one_tensor_seen_through_two_origins_gets_an_alias_guard() {
    let mut tx = new_trace();
    let raw = RawValue::Tensor(RawTensor { id: 11 });
    let a = tx.wrap_raw(&raw, Some(Origin::local("a"))).unwrap();
    let b = tx.wrap_raw(&raw, Some(Origin::local("b"))).unwrap();

    let set = SymbolicSet::new().into_value();
    tx.store_local("s", set.clone());
    call(&mut tx, &set, "add", &[a]);
    let set = tx.local("s").unwrap().clone();
    call(&mut tx, &set, "add", &[b]);
    let set = tx.local("s").unwrap().clone();

    let items = elements(&set);
    assert_eq!(items.len(), 1);
    assert_eq!(
        duplicate_guards(&items[0]),
        vec![&Guard {
            origin: Origin::local("a"),
            kind: GuardKind::Duplicate {
                other: Origin::local("b")
            },
        }]
    );
}

#[test]
fn value_compared_duplicates_get_no_alias_guard() {
    let mut tx = new_trace();
    let x = tx.wrap_raw(&"x".into(), Some(Origin::local("x"))).unwrap();
    let y = tx.wrap_raw(&"x".into(), Some(Origin::local("y"))).unwrap();
    let set = set_of(&mut tx, vec![x, y]);
    assert_eq!(elements(&set).len(), 1);
    assert!(duplicate_guards(&elements(&set)[0]).is_empty());
}

#[test]
fn same_origin_tensor_added_twice_needs_no_guard() {
    let mut tx = new_trace();
    let raw = RawValue::Tensor(RawTensor { id: 3 });
    let a = tx.wrap_raw(&raw, Some(Origin::local("a"))).unwrap();
    let set = set_of(&mut tx, vec![a.clone(), a]);
    assert_eq!(elements(&set).len(), 1);
    assert!(duplicate_guards(&elements(&set)[0]).is_empty());
}

#[test]
fn unsupported_elements_are_rejected() {
    let mut tx = new_trace();
    let err = Value::builtin(BuiltinFn::Set)
        .call_function(
            &mut tx,
            &[Value::list(vec![Value::unresolved_tensor()])],
            &Kwargs::new(),
        )
        .unwrap_err();
    assert!(err.is_unsupported_set_element());

    let err = Value::builtin(BuiltinFn::Set)
        .call_function(
            &mut tx,
            &[Value::list(vec![Value::list(vec![])])],
            &Kwargs::new(),
        )
        .unwrap_err();
    assert!(err.is_unsupported_set_element());
    assert!(err.abandons_trace());
}

#[test]
fn membership_uses_per_kind_equality() {
    let mut tx = new_trace();
    let raw = RawTensor { id: 5 };
    let placeholder = tx.placeholder_for(raw);
    let set = set_of(&mut tx, vec![Value::tensor(placeholder), lit(2)]);

    let same_tensor = Value::tensor(placeholder);
    let other_tensor = Value::tensor(tx.placeholder_for(RawTensor { id: 6 }));
    let mut contains = |item: Value| constant(&call(&mut tx, &set, "__contains__", &[item]));
    assert_eq!(contains(same_tensor), Constant::Bool(true));
    assert_eq!(contains(other_tensor), Constant::Bool(false));
    assert_eq!(contains(lit(2)), Constant::Bool(true));
    assert_eq!(contains(lit("2")), Constant::Bool(false));
}

#[test]
fn pop_removes_the_last_inserted_element() {
    let mut tx = new_trace();
    let set = set_of(&mut tx, vec![lit(1), lit(2)]);
    tx.store_local("s", set.clone());

    assert_eq!(constant(&call(&mut tx, &set, "pop", &[])), Constant::Int(2));
    let set = tx.local("s").unwrap().clone();
    assert_eq!(constant(&call(&mut tx, &set, "pop", &[])), Constant::Int(1));
    let set = tx.local("s").unwrap().clone();

    let err = set
        .call_method(&mut tx, "pop", &[], &Kwargs::new())
        .unwrap_err();
    assert!(err.is_key_not_found());
}

#[test]
fn sets_are_not_subscriptable() {
    let mut tx = new_trace();
    let set = set_of(&mut tx, vec![lit(1)]);
    let err = set
        .call_method(&mut tx, "__getitem__", &[lit(0)], &Kwargs::new())
        .unwrap_err();
    assert!(err.is_not_subscriptable());

    let err = set
        .call_method(&mut tx, "discard", &[lit(1)], &Kwargs::new())
        .unwrap_err();
    assert!(err.is_unsupported_method());
}

#[test]
fn reconstruction_builds_a_builtin_set() {
    let mut tx = new_trace();
    let set = set_of(&mut tx, vec![lit("a"), lit(3), lit("a")]);
    assert_eq!(
        replay_value(&set),
        RawValue::Set(vec!["a".into(), 3.into()])
    );
}
