//! Modelling of concrete runtime values.
//!
//! [`ValueBuilder`] turns a [`RawValue`] met at some [`Origin`] into an abstract
//! [`Value`], installing the guards that make the model valid for later runs:
//! literals are pinned to their value, containers to their type, modules and
//! classes to their identity.
use crate::{
    collections::{
        CollectionClass, classify_class,
        customized::CustomizedMapping,
        hash_key::HashKey,
        mapping::{DefaultMapping, Items, MappingType, SymbolicMapping},
        record::StructuredRecordMapping,
        set::SymbolicSet,
    },
    trace::TraceState,
    utils::error::{Error, SymResult},
    value::{
        Value, ValueKind,
        guard::GuardKind,
        origin::Origin,
        raw::{DictKind, RawRecord, RawValue},
    },
};

pub struct ValueBuilder<'a> {
    tx: &'a mut TraceState,
    origin: Option<Origin>,
}

impl<'a> ValueBuilder<'a> {
    pub fn new(tx: &'a mut TraceState, origin: Option<Origin>) -> Self {
        Self { tx, origin }
    }

    fn child(&mut self, raw: &RawValue, origin: Option<Origin>) -> SymResult<Value> {
        ValueBuilder::new(self.tx, origin).wrap(raw)
    }

    /// Attach the origin and a guard of `kind` on it, when the origin is known.
    fn guarded(&self, value: Value, kind: GuardKind) -> Value {
        match &self.origin {
            Some(origin) => value
                .with_origin(origin.clone())
                .with_guards([&origin.make_guard(kind)]),
            None => value,
        }
    }

    pub fn wrap(&mut self, raw: &RawValue) -> SymResult<Value> {
        let value = match raw {
            RawValue::Constant(constant) => self.guarded(
                Value::literal(constant.clone()),
                GuardKind::ConstantMatch(constant.clone()),
            ),
            RawValue::Tensor(tensor) => {
                let placeholder = self.tx.placeholder_for(*tensor);
                self.guarded(Value::tensor(placeholder), GuardKind::TensorMatch)
            }
            RawValue::Tuple(items) => {
                let items = self.wrap_sequence(items)?;
                self.guarded(Value::tuple(items), GuardKind::TypeMatch("tuple".into()))
            }
            RawValue::List(items) => {
                let items = self.wrap_sequence(items)?;
                self.guarded(Value::list(items), GuardKind::TypeMatch("list".into()))
            }
            RawValue::Dict {
                kind,
                default_factory,
                items,
            } => self.wrap_dict(*kind, default_factory.as_deref(), items)?,
            RawValue::Set(items) => {
                let items = items
                    .iter()
                    .map(|item| self.child(item, None))
                    .collect::<SymResult<Vec<_>>>()?;
                self.guarded(
                    SymbolicSet::from_items(items)?.into_value(),
                    GuardKind::TypeMatch("set".into()),
                )
            }
            RawValue::Record(record) => self.wrap_record(record)?,
            RawValue::Module(module) => self.guarded(
                Value::new(ValueKind::Module(module.name.clone())),
                GuardKind::IdMatch,
            ),
            RawValue::Class(class) => self.guarded(
                Value::new(ValueKind::Class(class.clone())),
                GuardKind::IdMatch,
            ),
        };
        Ok(value)
    }

    fn wrap_sequence(&mut self, items: &[RawValue]) -> SymResult<Vec<Value>> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let origin = self.origin.as_ref().map(|o| o.item(i as i64));
                self.child(item, origin)
            })
            .collect()
    }

    fn wrap_items(&mut self, items: &[(RawValue, RawValue)]) -> SymResult<Items> {
        let mut keyed = Items::new();
        for (raw_key, raw_value) in items {
            let key = HashKey::wrap(&self.child(raw_key, None)?)?;
            let origin = match (&self.origin, key.as_constant()) {
                (Some(origin), Some(constant)) => Some(origin.item(constant.clone())),
                _ => None,
            };
            let value = self.child(raw_value, origin)?;
            keyed.insert(key, value);
        }
        Ok(keyed)
    }

    fn wrap_dict(
        &mut self,
        kind: DictKind,
        default_factory: Option<&RawValue>,
        items: &[(RawValue, RawValue)],
    ) -> SymResult<Value> {
        let keyed = self.wrap_items(items)?;
        let (value, type_name) = match kind {
            DictKind::Dict => (
                SymbolicMapping::from_keyed(MappingType::Dict, keyed).into_value(),
                "dict",
            ),
            DictKind::OrderedDict => (
                SymbolicMapping::from_keyed(MappingType::OrderedDict, keyed).into_value(),
                "OrderedDict",
            ),
            DictKind::DefaultDict => {
                let factory = match default_factory {
                    Some(raw) if !raw.is_none() => {
                        let origin = self.origin.as_ref().map(|o| o.attr("default_factory"));
                        Some(self.child(raw, origin)?)
                    }
                    _ => None,
                };
                (
                    DefaultMapping::new(keyed, factory)?.into_value(),
                    "defaultdict",
                )
            }
        };
        Ok(self.guarded(value, GuardKind::TypeMatch(type_name.into())))
    }

    fn wrap_record(&mut self, record: &RawRecord) -> SymResult<Value> {
        let type_guard = GuardKind::TypeMatch(record.class.qualified_name());
        match classify_class(&record.class, self.tx.config()) {
            CollectionClass::StructuredRecord => {
                let value = StructuredRecordMapping::wrap(self.tx, record, self.origin.clone())?;
                Ok(self.guarded(value, type_guard))
            }
            CollectionClass::Customized => {
                let mut items = Items::new();
                for (name, raw) in &record.attrs {
                    let origin = self.origin.as_ref().map(|o| o.item(name.as_str()));
                    items.insert(HashKey::str(name), self.child(raw, origin)?);
                }
                let value = CustomizedMapping::from_items(&record.class, items).into_value(None);
                Ok(self.guarded(value, type_guard))
            }
            _ => Err(Error::unsupported(format!(
                "instance of `{}`",
                record.class.qualified_name()
            ))),
        }
    }
}
