//! Reconstruction of abstract values into build operations.
//!
//! The operations form a small stack language: loads push one value, `Build*`
//! pop their operands, calls pop the callable followed by its arguments. The
//! instruction-emission layer maps them onto the host's instruction stream.
use smallvec::SmallVec;

use crate::{
    utils::error::{Error, SymResult},
    value::{PlaceholderId, Value, ValueKind, constant::Constant, origin::Origin},
};

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOp {
    LoadConst(Constant),
    /// Reload the runtime value found at an origin.
    LoadSource(Origin),
    /// A tensor produced by the traced computation graph.
    LoadGraphOutput(PlaceholderId),
    /// Load `module.attr`, e.g. a container type or a global table.
    LoadGlobal { module: String, attr: String },
    LoadClass { module: String, name: String },
    BuildTuple(usize),
    BuildList(usize),
    /// Pop `n` key/value pairs pushed key first, in insertion order.
    BuildMap(usize),
    BuildSet(usize),
    /// Call with `n` positional arguments.
    CallFunction(usize),
    /// Call with `argc` arguments, the last `names.len()` of which are passed by keyword.
    CallFunctionKw {
        argc: usize,
        names: SmallVec<[String; 4]>,
    },
}

impl BuildOp {
    pub fn load_global(module: &str, attr: &str) -> Self {
        BuildOp::LoadGlobal {
            module: module.to_string(),
            attr: attr.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Codegen {
    ops: Vec<BuildOp>,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: BuildOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[BuildOp] {
        &self.ops
    }

    pub fn finish(self) -> Vec<BuildOp> {
        self.ops
    }

    pub fn emit_all<'a>(&mut self, values: impl IntoIterator<Item = &'a Value>) -> SymResult<()> {
        for value in values {
            self.emit(value)?;
        }
        Ok(())
    }

    /// Emit the operations that leave `value` on top of the stack.
    pub fn emit(&mut self, value: &Value) -> SymResult<()> {
        match value.kind() {
            ValueKind::Constant(c) => self.push(BuildOp::LoadConst(c.clone())),
            ValueKind::Enum(_) | ValueKind::Builtin(_) | ValueKind::MethodWrapper(_) => {
                self.push(BuildOp::LoadConst(value.as_constant()?))
            }
            ValueKind::Tuple(items) => {
                self.emit_all(items)?;
                self.push(BuildOp::BuildTuple(items.len()));
            }
            ValueKind::List(items) => {
                self.emit_all(items)?;
                self.push(BuildOp::BuildList(items.len()));
            }
            ValueKind::Mapping(m) => m.reconstruct(self)?,
            ValueKind::DefaultMapping(m) => m.reconstruct(self)?,
            ValueKind::Set(s) => s.reconstruct(self)?,
            ValueKind::Record(r) => r.reconstruct(self)?,
            ValueKind::Customized(c) => c.reconstruct(self)?,
            ValueKind::Registry(r) => r.reconstruct(self),
            ValueKind::Tensor { placeholder } => match (value.origin(), placeholder) {
                (Some(origin), _) => self.push(BuildOp::LoadSource(origin.clone())),
                (None, Some(placeholder)) => self.push(BuildOp::LoadGraphOutput(*placeholder)),
                (None, None) => {
                    return Err(Error::unsupported(
                        "cannot reconstruct a tensor without origin or placeholder",
                    ));
                }
            },
            ValueKind::Class(class) => match value.origin() {
                Some(origin) => self.push(BuildOp::LoadSource(origin.clone())),
                None => self.push(BuildOp::LoadClass {
                    module: class.module.clone(),
                    name: class.name.clone(),
                }),
            },
            ValueKind::SymNumber { .. } | ValueKind::UserFunction(_) | ValueKind::Module(_) => {
                match value.origin() {
                    Some(origin) => self.push(BuildOp::LoadSource(origin.clone())),
                    None => {
                        return Err(Error::unsupported(format!(
                            "cannot reconstruct a `{}` without an origin",
                            value.type_name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Build operations that recreate `value` at runtime.
pub fn reconstruct(value: &Value) -> SymResult<Vec<BuildOp>> {
    let mut codegen = Codegen::new();
    codegen.emit(value)?;
    Ok(codegen.finish())
}
