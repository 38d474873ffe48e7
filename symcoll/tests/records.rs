mod common;

use std::{cell::Cell, rc::Rc};

use common::*;
use indexmap::IndexMap;
use symcoll::{
    codegen::{BuildOp, reconstruct},
    collections::{
        as_mapping,
        mapping::{MappingType, SymbolicMapping},
    },
    skip,
    trace::TraceState,
    utils::conf::TraceConfig,
    value::{
        Kwargs, Value, ValueKind,
        class::{FieldDecl, RuntimeClass, UserFunction},
        constant::Constant,
        origin::Origin,
        raw::{RawRecord, RawTensor, RawValue},
    },
};

fn model_output() -> RuntimeClass {
    RuntimeClass::new("transformers.modeling_outputs", "BaseModelOutput")
        .with_base("ModelOutput")
        .with_base("OrderedDict")
        .with_fields([
            FieldDecl::with_default("last_hidden_state", Constant::None),
            FieldDecl::with_default("hidden_states", Constant::None),
            FieldDecl::with_default("attentions", Constant::None),
            FieldDecl::with_default("loss", Constant::None),
        ])
}

fn tensor(tx: &mut TraceState, id: u64) -> Value {
    Value::tensor(tx.placeholder_for(RawTensor { id }))
}

#[test]
fn absent_fields_are_dropped() {
    let mut tx = new_trace();
    let class = Value::class(model_output());
    let record = class.call_function(&mut tx, &[], &Kwargs::new()).unwrap();

    assert!(matches!(record.kind(), ValueKind::Record(_)));
    assert_eq!(constant(&call(&mut tx, &record, "__len__", &[])), Constant::Int(0));
    assert!(skip::is_skipped(
        "transformers.modeling_outputs.BaseModelOutput",
        "__init__"
    ));
}

#[test]
fn one_supplied_field_and_defaults_through_getattr() {
    let mut tx = new_trace();
    let class = Value::class(model_output());
    let hidden = tensor(&mut tx, 1);
    let record = class
        .call_function(&mut tx, &[], &kwargs([("last_hidden_state", hidden.clone())]))
        .unwrap();

    assert_eq!(constant(&call(&mut tx, &record, "__len__", &[])), Constant::Int(1));
    let got = record.var_getattr(&mut tx, "last_hidden_state").unwrap();
    assert!(got.is(&hidden));
    let loss = record.var_getattr(&mut tx, "loss").unwrap();
    assert_eq!(constant(&loss), Constant::None);

    let err = record.var_getattr(&mut tx, "logits").unwrap_err();
    assert!(err.is_attribute_not_found());
}

#[test]
fn positional_arguments_bind_in_declaration_order() {
    let mut tx = new_trace();
    let class = Value::class(model_output());
    let (a, b) = (tensor(&mut tx, 1), tensor(&mut tx, 2));
    let record = class
        .call_function(&mut tx, &[a.clone(), b.clone()], &Kwargs::new())
        .unwrap();

    let by_index = call(&mut tx, &record, "__getitem__", &[lit(1)]);
    assert!(by_index.is(&b));
    let by_name = call(&mut tx, &record, "__getitem__", &[lit("last_hidden_state")]);
    assert!(by_name.is(&a));
    let tuple = call(&mut tx, &record, "to_tuple", &[]);
    assert!(matches!(tuple.kind(), ValueKind::Tuple(items) if items.len() == 2));
}

#[test]
fn single_non_tensor_field_is_unsupported() {
    let mut tx = new_trace();
    let class = Value::class(model_output());
    let err = class
        .call_function(&mut tx, &[], &kwargs([("loss", lit(0.5))]))
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(err.abandons_trace());
}

#[test]
fn arguments_must_match_the_schema() {
    let mut tx = new_trace();
    let class = Value::class(model_output());
    let err = class
        .call_function(&mut tx, &[], &kwargs([("logits", lit(1))]))
        .unwrap_err();
    assert!(err.is_schema_mismatch());

    let too_many: Vec<Value> = (0..5).map(|i| tensor(&mut tx, i)).collect();
    let err = class
        .call_function(&mut tx, &too_many, &Kwargs::new())
        .unwrap_err();
    assert!(err.is_schema_mismatch());
}

#[test]
fn include_none_materializes_defaults() {
    let config = TraceConfig {
        record_include_none: true,
        ..TraceConfig::default()
    };
    let mut tx = TraceState::new(config);
    let class = Value::class(model_output());
    let record = class.call_function(&mut tx, &[], &Kwargs::new()).unwrap();

    assert_eq!(constant(&call(&mut tx, &record, "__len__", &[])), Constant::Int(4));
    let loss = record.var_getattr(&mut tx, "loss").unwrap();
    assert_eq!(constant(&loss), Constant::None);
}

#[test]
fn wrapped_records_read_present_fields_only() {
    let mut tx = new_trace();
    let class = Rc::new(model_output());
    let mut attrs = IndexMap::new();
    attrs.insert(
        "last_hidden_state".to_string(),
        RawValue::Tensor(RawTensor { id: 9 }),
    );
    attrs.insert("loss".to_string(), RawValue::none());
    let raw = RawValue::Record(RawRecord { class, attrs });

    let origin = Origin::local("out");
    let record = tx.wrap_raw(&raw, Some(origin.clone())).unwrap();
    let mapping = as_mapping(&record).unwrap();
    assert_eq!(mapping.len(), 1);
    let hidden = mapping.values().next().unwrap();
    assert_eq!(hidden.origin(), Some(&origin.attr("last_hidden_state")));

    // attribute writes go through item assignment
    tx.store_local("out", record.clone());
    let loss = tensor(&mut tx, 10);
    call(&mut tx, &record, "__setattr__", &[lit("loss"), loss]);
    let record = tx.local("out").unwrap().clone();
    assert!(matches!(record.kind(), ValueKind::Record(_)));
    assert_eq!(as_mapping(&record).unwrap().len(), 2);
}

#[test]
fn records_reconstruct_as_keyword_calls() {
    let mut tx = new_trace();
    let class = Value::class(model_output());
    let record = class
        .call_function(&mut tx, &[], &kwargs([("attentions", lit(1)), ("loss", lit(2))]))
        .unwrap();
    let ops = reconstruct(&record).unwrap();
    assert_eq!(
        ops.first(),
        Some(&BuildOp::LoadClass {
            module: "transformers.modeling_outputs".into(),
            name: "BaseModelOutput".into(),
        })
    );
    assert!(matches!(
        ops.last(),
        Some(BuildOp::CallFunctionKw { argc: 2, names })
            if names.as_slice() == ["attentions", "loss"]
    ));
}

fn params_class() -> RuntimeClass {
    RuntimeClass::new("app.config", "Params").with_base("OrderedDict")
}

#[test]
fn customized_mapping_behaves_like_a_plain_mapping() {
    let mut tx = new_trace();
    let items = [("a", lit(1)), ("b", lit(2))];
    let custom = Value::class(params_class())
        .call_function(&mut tx, &[], &kwargs(items.clone()))
        .unwrap();
    let plain = SymbolicMapping::from_items(
        MappingType::Dict,
        items.iter().map(|(k, v)| (lit(*k), v.clone())),
    )
    .unwrap()
    .into_value();
    assert!(matches!(custom.kind(), ValueKind::Customized(_)));

    let probes: [(&str, Vec<Value>); 6] = [
        ("items", vec![]),
        ("values", vec![]),
        ("__len__", vec![]),
        ("get", vec![lit("b")]),
        ("__contains__", vec![lit("z")]),
        ("__getitem__", vec![lit("a")]),
    ];
    for (name, args) in probes {
        assert_eq!(
            constant(&call(&mut tx, &custom, name, &args)),
            constant(&call(&mut tx, &plain, name, &args)),
            "{} differs",
            name
        );
    }
    assert_eq!(
        constants_of(&call(&mut tx, &custom, "keys", &[])),
        constants_of(&call(&mut tx, &plain, "keys", &[]))
    );

    tx.store_local("p", custom.clone());
    call(&mut tx, &custom, "pop", &[lit("a")]);
    let custom = tx.local("p").unwrap().clone();
    assert!(matches!(custom.kind(), ValueKind::Customized(_)));
    assert_eq!(constants_of(&custom), vec![Constant::from("b")]);
}

#[test]
fn customized_overrides_are_inlined() {
    let mut tx = new_trace();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let getitem = UserFunction::new("__getitem__", move |tx, args, kwargs| {
        counter.set(counter.get() + 1);
        // self.get(key, "missing")
        args[0].call_method(tx, "get", &[args[1].clone(), Value::literal("missing")], kwargs)
    });
    let class = params_class().with_method("__getitem__", getitem.clone());
    let custom = Value::class(class)
        .call_function(&mut tx, &[], &kwargs([("a", lit(1))]))
        .unwrap();

    assert_eq!(constant(&call(&mut tx, &custom, "__getitem__", &[lit("a")])), Constant::Int(1));
    assert_eq!(
        constant(&call(&mut tx, &custom, "__getitem__", &[lit("z")])),
        Constant::from("missing")
    );
    assert_eq!(constant(&custom.var_getattr(&mut tx, "a").unwrap()), Constant::Int(1));
    assert_eq!(calls.get(), 3);

    let class = params_class().with_method("keys", getitem);
    let custom = Value::class(class)
        .call_function(&mut tx, &[], &Kwargs::new())
        .unwrap();
    let err = custom
        .call_method(&mut tx, "keys", &[], &Kwargs::new())
        .unwrap_err();
    assert!(err.is_unsupported_method());
    let err = custom
        .call_method(&mut tx, "popitem", &[], &Kwargs::new())
        .unwrap_err();
    assert!(err.is_unsupported_method());
}

#[test]
fn customized_construction_variants() {
    let mut tx = new_trace();
    let source = SymbolicMapping::from_items(MappingType::Dict, [(lit("k"), lit(1))])
        .unwrap()
        .into_value();
    let copy = Value::class(params_class())
        .call_function(&mut tx, &[source], &Kwargs::new())
        .unwrap();
    assert_eq!(constants_of(&copy), vec![Constant::from("k")]);

    let err = Value::class(params_class())
        .call_function(&mut tx, &[lit(1), lit(2)], &Kwargs::new())
        .unwrap_err();
    assert!(err.is_unsupported());

    let dataclass = params_class().with_fields([
        FieldDecl::required("lr"),
        FieldDecl::with_default("momentum", 0.9),
    ]);
    let params = Value::class(dataclass)
        .call_function(&mut tx, &[lit(0.1)], &Kwargs::new())
        .unwrap();
    assert_eq!(
        constant(&call(&mut tx, &params, "items", &[])),
        Constant::Tuple(vec![
            Constant::Tuple(vec!["lr".into(), 0.1.into()]),
            Constant::Tuple(vec!["momentum".into(), 0.9.into()]),
        ])
    );
    assert_eq!(
        replay_value(&params),
        RawValue::Dict {
            kind: symcoll::value::raw::DictKind::OrderedDict,
            default_factory: None,
            items: vec![("lr".into(), 0.1.into()), ("momentum".into(), 0.9.into())],
        }
    );

    let own_init = params_class().with_attribute("__init__", "user");
    let err = Value::class(own_init)
        .call_function(&mut tx, &[], &Kwargs::new())
        .unwrap_err();
    assert!(err.is_unsupported());
}
