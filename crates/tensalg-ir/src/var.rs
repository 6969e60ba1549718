//! Index and tensor variables.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tensalg_core::{Datatype, Format};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// A value-semantic index variable.
///
/// Identity is structural on name *and* generation: clones of one variable
/// compare equal, two separately constructed variables never do, even with
/// the same name.
///
/// ```
/// use tensalg_ir::IndexVar;
///
/// let i = IndexVar::named("i");
/// assert_eq!(i, i.clone());
/// assert_ne!(i, IndexVar::named("i"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexVar {
    name: Rc<str>,
    generation: u64,
}

impl IndexVar {
    /// A fresh variable with a generated name.
    pub fn new() -> IndexVar {
        let generation = next_generation();
        IndexVar {
            name: Rc::from(format!("i{generation}")),
            generation,
        }
    }

    /// A fresh variable with the given display name.
    pub fn named(name: &str) -> IndexVar {
        IndexVar {
            name: Rc::from(name),
            generation: next_generation(),
        }
    }

    /// The display name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for IndexVar {
    fn default() -> Self {
        IndexVar::new()
    }
}

impl fmt::Display for IndexVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The metadata an expression carries about a tensor operand: a stable id
/// plus name, component type, logical dimensions and storage format.
///
/// Equality and hashing are by id; two tensor variables with the same id
/// refer to the same tensor.
#[derive(Debug, Clone)]
pub struct TensorVar {
    id: u64,
    name: String,
    dtype: Datatype,
    dims: Vec<usize>,
    format: Format,
}

impl TensorVar {
    /// A fresh tensor variable with a unique id.
    pub fn new(name: &str, dtype: Datatype, dims: Vec<usize>, format: Format) -> TensorVar {
        TensorVar {
            id: next_generation(),
            name: name.to_string(),
            dtype,
            dims,
            format,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn dtype(&self) -> Datatype {
        self.dtype
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of modes.
    #[inline]
    pub fn order(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn format(&self) -> &Format {
        &self.format
    }
}

impl PartialEq for TensorVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TensorVar {}

impl std::hash::Hash for TensorVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TensorVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
