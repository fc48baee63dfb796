//! The frozen, immutable module representation.
//!
//! A [`Module`] is produced exclusively by [`ModuleBuilder::build`] and is
//! never mutated afterwards. The encoder and the runtime both read it
//! directly; all structural invariants (index validity, import-before-local
//! ordering, at most one memory and table) were enforced while staging, so
//! consumers may treat the contents as well-formed.
//!
//! [`ModuleBuilder::build`]: crate::builder::ModuleBuilder::build

use std::collections::BTreeMap;

use wasmith_types::{FuncType, Node, ValueType};

/// Size bounds for a memory or table, in pages resp. elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

/// One entry in the function index space. Imports always precede local
/// definitions, matching the binary-format index assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum FuncDecl {
    Import {
        module: String,
        field: String,
        type_index: u32,
    },
    Local(FuncBody),
}

impl FuncDecl {
    pub fn type_index(&self) -> u32 {
        match self {
            FuncDecl::Import { type_index, .. } => *type_index,
            FuncDecl::Local(body) => body.type_index,
        }
    }
}

/// The body of a locally defined function. Parameters live in the signature;
/// `locals` lists only the extra slots, indexed after the parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    pub type_index: u32,
    pub locals: Vec<ValueType>,
    pub body: Vec<Node>,
}

/// The module's single funcref table, imported or defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDecl {
    Import {
        module: String,
        field: String,
        limits: Limits,
    },
    Local {
        limits: Limits,
    },
}

impl TableDecl {
    pub fn limits(&self) -> Limits {
        match self {
            TableDecl::Import { limits, .. } | TableDecl::Local { limits } => *limits,
        }
    }
}

/// The module's single linear memory, imported or defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryDecl {
    Import {
        module: String,
        field: String,
        limits: Limits,
    },
    Local {
        limits: Limits,
    },
}

impl MemoryDecl {
    pub fn limits(&self) -> Limits {
        match self {
            MemoryDecl::Import { limits, .. } | MemoryDecl::Local { limits } => *limits,
        }
    }
}

/// One entry in the global index space. Local globals carry their
/// initializer expression; it is evaluated at instantiation and encoded as
/// a constant expression in the binary format.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalDecl {
    Import {
        module: String,
        field: String,
        ty: ValueType,
        mutable: bool,
    },
    Local {
        ty: ValueType,
        mutable: bool,
        init: Node,
    },
}

impl GlobalDecl {
    pub fn ty(&self) -> ValueType {
        match self {
            GlobalDecl::Import { ty, .. } | GlobalDecl::Local { ty, .. } => *ty,
        }
    }

    pub fn mutable(&self) -> bool {
        match self {
            GlobalDecl::Import { mutable, .. } | GlobalDecl::Local { mutable, .. } => *mutable,
        }
    }
}

/// What an export name resolves to. The memory and table need no index
/// since the module holds at most one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Export {
    Func(u32),
    Table,
    Memory,
    Global(u32),
}

/// An active element segment: function indices placed into the table at a
/// computed offset during instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub offset: Node,
    pub funcs: Vec<u32>,
}

/// A data segment. Active segments (`offset` present) are copied into
/// memory at instantiation; passive segments are carried for later use.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub offset: Option<Node>,
    pub bytes: Vec<u8>,
}

impl DataSegment {
    pub fn is_active(&self) -> bool {
        self.offset.is_some()
    }
}

/// A frozen module. Field order mirrors the binary-format section order.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub types: Vec<FuncType>,
    pub funcs: Vec<FuncDecl>,
    pub table: Option<TableDecl>,
    pub memory: Option<MemoryDecl>,
    pub globals: Vec<GlobalDecl>,
    pub exports: BTreeMap<String, Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment>,
}

impl Module {
    /// Structural lookup into the deduplicated type list.
    pub fn type_index_of(&self, ty: &FuncType) -> Option<u32> {
        self.types.iter().position(|t| t == ty).map(|i| i as u32)
    }

    /// Signature of the function at `index` in the combined index space.
    pub fn func_type(&self, index: u32) -> &FuncType {
        &self.types[self.funcs[index as usize].type_index() as usize]
    }

    /// How many functions are imported. Imports occupy the low indices.
    pub fn imported_func_count(&self) -> u32 {
        self.funcs
            .iter()
            .take_while(|f| matches!(f, FuncDecl::Import { .. }))
            .count() as u32
    }

    /// Locally defined functions with their absolute indices.
    pub fn local_funcs(&self) -> impl Iterator<Item = (u32, &FuncBody)> {
        self.funcs.iter().enumerate().filter_map(|(i, f)| match f {
            FuncDecl::Local(body) => Some((i as u32, body)),
            FuncDecl::Import { .. } => None,
        })
    }

    pub fn export(&self, name: &str) -> Option<Export> {
        self.exports.get(name).copied()
    }
}
