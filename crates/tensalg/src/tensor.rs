//! The user-visible tensor handle.
//!
//! A [`Tensor`] is a shared reference to one tensor's content plus a
//! per-handle coordinate staging buffer. Copying a handle copies the
//! reference: mutations through any handle are visible through all of
//! them, while each handle stages its own insertions (the content tracks
//! the most recent inserter's buffer, so packing through any handle
//! drains the right staging area).
//!
//! Reads never observe stale values: iteration, value lookup, comparison
//! and printing all synchronize first, packing pending insertions or
//! compiling, assembling and computing a pending assignment.
//!
//! # Examples
//!
//! ```
//! use tensalg::prelude::*;
//!
//! let mut b = Tensor::new("B", Datatype::Float64, &[2, 3], Format::csr()).unwrap();
//! b.insert(&[0, 1], 2.0).unwrap();
//! b.insert(&[1, 2], 3.0).unwrap();
//!
//! let mut a = Tensor::new("a", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
//! let (i, j) = (IndexVar::named("i"), IndexVar::named("j"));
//! a.assign(&[i.clone()], b.access(&[i, j]).unwrap()).unwrap();
//!
//! // reading synchronizes: pack, compile, assemble, compute
//! assert_eq!(a.get_value::<f64>(&[0]).unwrap(), 2.0);
//! assert_eq!(a.get_value::<f64>(&[1]).unwrap(), 3.0);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use anyhow::{bail, Result};
use tracing::debug;

use tensalg_core::{
    pack_buffer, with_component, Component, CoordinateBuffer, Datatype, Format, FormatError,
    Storage, TensorError,
};
use tensalg_ir::{
    make_reduction_notation, operand_vars, Access, Assignment, BinaryOp, IndexExpr, IndexVar,
    TensorVar,
};

use crate::backend::{FuncHandle, KernelBackend, Property};
use crate::ffi::{unpack_tensor_data, RawTensorArg};
use crate::interp::Interpreter;
use crate::transpose::apply_transpose_rewrite;

const DEFAULT_ALLOC_SIZE: usize = 1 << 20;

static NEXT_NAME: AtomicU64 = AtomicU64::new(0);

/// A generated tensor name with the given prefix.
pub(crate) fn fresh_name(prefix: char) -> String {
    format!("{prefix}{}", NEXT_NAME.fetch_add(1, AtomicOrdering::Relaxed))
}

/// A tensor that must be resynchronized when its input mutates.
pub(crate) struct DependentRef {
    content: Weak<RefCell<TensorContent>>,
}

/// The shared payload behind every handle to one tensor.
pub(crate) struct TensorContent {
    pub(crate) name: String,
    pub(crate) dtype: Datatype,
    pub(crate) dims: Vec<usize>,
    pub(crate) storage: Storage,
    pub(crate) tensor_var: TensorVar,
    pub(crate) assignment: Option<Assignment>,
    pub(crate) lowered: Option<Assignment>,
    pub(crate) alloc_size: usize,
    pub(crate) values_size: usize,
    pub(crate) assemble_func: Option<FuncHandle>,
    pub(crate) compute_func: Option<FuncHandle>,
    pub(crate) assemble_while_compute: bool,
    pub(crate) module: Box<dyn KernelBackend>,
    pub(crate) needs_pack: bool,
    pub(crate) needs_compute: bool,
    pub(crate) dependents: Vec<DependentRef>,
    pub(crate) operands: Vec<Tensor>,
    /// The staging buffer of the handle that inserted last.
    pub(crate) active_staging: Weak<RefCell<CoordinateBuffer>>,
}

impl Drop for TensorContent {
    fn drop(&mut self) {
        let id = self.tensor_var.id();
        let _ = REGISTRY.try_with(|registry| {
            registry.borrow_mut().remove(&id);
        });
    }
}

thread_local! {
    /// Arena mapping tensor-var ids to live contents, used to resolve the
    /// operands an expression names.
    static REGISTRY: RefCell<HashMap<u64, Weak<RefCell<TensorContent>>>> =
        RefCell::new(HashMap::new());
}

fn register(id: u64, content: &Rc<RefCell<TensorContent>>) {
    REGISTRY.with(|registry| {
        registry.borrow_mut().insert(id, Rc::downgrade(content));
    });
}

fn resolve(id: u64) -> Option<Tensor> {
    let content = REGISTRY.with(|registry| registry.borrow().get(&id).cloned())?;
    content.upgrade().map(Tensor::from_content)
}

/// The user handle to a tensor.
pub struct Tensor {
    pub(crate) content: Rc<RefCell<TensorContent>>,
    staging: Rc<RefCell<CoordinateBuffer>>,
}

impl Clone for Tensor {
    /// Copies the reference to the shared content; the new handle starts
    /// with its own empty staging buffer.
    fn clone(&self) -> Tensor {
        let staging = {
            let inner = self.content.borrow();
            Rc::new(RefCell::new(CoordinateBuffer::new(
                inner.dims.len(),
                inner.dtype,
            )))
        };
        Tensor {
            content: Rc::clone(&self.content),
            staging,
        }
    }
}

impl PartialEq for Tensor {
    /// Handle identity: true iff both handles refer to the same tensor.
    fn eq(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.content, &other.content)
    }
}

impl Eq for Tensor {}

impl std::fmt::Debug for Tensor {
    /// Handle identity: mirrors `PartialEq`'s pointer-based equality.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("content_ptr", &Rc::as_ptr(&self.content))
            .finish()
    }
}

impl Tensor {
    /// Creates a tensor with the given component type, dimensions and
    /// format, backed by the reference interpreter.
    pub fn new(name: &str, dtype: Datatype, dims: &[usize], format: Format) -> Result<Tensor> {
        Tensor::with_backend(name, dtype, dims, format, Box::new(Interpreter::new()))
    }

    /// Creates a tensor with an explicit kernel backend.
    pub fn with_backend(
        name: &str,
        dtype: Datatype,
        dims: &[usize],
        format: Format,
        module: Box<dyn KernelBackend>,
    ) -> Result<Tensor> {
        if format.order() != dims.len() {
            bail!(TensorError::Format(FormatError::OrderMismatch {
                format_order: format.order(),
                dims: dims.len(),
            }));
        }
        let tensor_var = TensorVar::new(name, dtype, dims.to_vec(), format.clone());
        let id = tensor_var.id();
        let content = Rc::new(RefCell::new(TensorContent {
            name: name.to_string(),
            dtype,
            dims: dims.to_vec(),
            storage: Storage::new(dtype, dims, format),
            tensor_var,
            assignment: None,
            lowered: None,
            alloc_size: DEFAULT_ALLOC_SIZE,
            values_size: 0,
            assemble_func: None,
            compute_func: None,
            assemble_while_compute: false,
            module,
            needs_pack: false,
            needs_compute: false,
            dependents: Vec::new(),
            operands: Vec::new(),
            active_staging: Weak::new(),
        }));
        register(id, &content);
        let tensor = Tensor::from_content(content);
        tensor.content.borrow_mut().active_staging = Rc::downgrade(&tensor.staging);
        Ok(tensor)
    }

    /// Creates a scalar (order zero) tensor.
    pub fn scalar(name: &str, dtype: Datatype) -> Result<Tensor> {
        Tensor::new(name, dtype, &[], Format::scalar())
    }

    /// Creates a packed scalar holding `value`.
    pub fn from_value<T: Component>(name: &str, value: T) -> Result<Tensor> {
        let mut tensor = Tensor::scalar(name, T::DTYPE)?;
        tensor.insert(&[], value)?;
        tensor.pack()?;
        Ok(tensor)
    }

    fn from_content(content: Rc<RefCell<TensorContent>>) -> Tensor {
        let staging = {
            let inner = content.borrow();
            match inner.active_staging.upgrade() {
                Some(staging) => staging,
                None => Rc::new(RefCell::new(CoordinateBuffer::new(
                    inner.dims.len(),
                    inner.dtype,
                ))),
            }
        };
        Tensor { content, staging }
    }

    /// The tensor's name.
    pub fn name(&self) -> String {
        self.content.borrow().name.clone()
    }

    /// Renames the tensor.
    pub fn set_name(&self, name: &str) {
        self.content.borrow_mut().name = name.to_string();
    }

    /// Number of modes.
    pub fn order(&self) -> usize {
        self.content.borrow().dims.len()
    }

    /// The logical dimensions.
    pub fn dims(&self) -> Vec<usize> {
        self.content.borrow().dims.clone()
    }

    /// The extent of one mode.
    pub fn dim(&self, mode: usize) -> Result<usize> {
        let content = self.content.borrow();
        match content.dims.get(mode) {
            Some(&dim) => Ok(dim),
            None => bail!(TensorError::ArityMismatch {
                expected: content.dims.len(),
                got: mode,
            }),
        }
    }

    /// The component type.
    pub fn dtype(&self) -> Datatype {
        self.content.borrow().dtype
    }

    /// The storage format.
    pub fn format(&self) -> Format {
        self.content.borrow().storage.format().clone()
    }

    /// The tensor variable expressions refer to this tensor by.
    pub fn tensor_var(&self) -> TensorVar {
        self.content.borrow().tensor_var.clone()
    }

    /// The assignment installed on this tensor, if any.
    pub fn assignment(&self) -> Option<Assignment> {
        self.content.borrow().assignment.clone()
    }

    /// The allocation hint handed to lowered kernels.
    pub fn alloc_size(&self) -> usize {
        self.content.borrow().alloc_size
    }

    /// Sets the allocation hint; must be a power of two.
    pub fn set_alloc_size(&mut self, alloc_size: usize) -> Result<()> {
        if !alloc_size.is_power_of_two() {
            bail!("allocation size must be a power of two, got {alloc_size}");
        }
        self.content.borrow_mut().alloc_size = alloc_size;
        Ok(())
    }

    /// Total bytes held by the packed storage.
    pub fn size_in_bytes(&self) -> usize {
        self.content.borrow().storage.size_in_bytes()
    }

    /// Grows the staging buffer by `additional` records.
    pub fn reserve(&mut self, additional: usize) {
        self.staging.borrow_mut().reserve(additional);
    }

    /// Stages a value at a coordinate. Dependent tensors are synchronized
    /// first so they observe the pre-mutation state.
    pub fn insert<T: Component>(&mut self, coord: &[usize], value: T) -> Result<()> {
        {
            let content = self.content.borrow();
            if coord.len() != content.dims.len() {
                bail!(TensorError::ArityMismatch {
                    expected: content.dims.len(),
                    got: coord.len(),
                });
            }
            if T::DTYPE != content.dtype {
                bail!(TensorError::TypeMismatch {
                    expected: content.dtype,
                    got: T::DTYPE,
                });
            }
            for (&c, &dim) in coord.iter().zip(&content.dims) {
                if c >= dim {
                    bail!(TensorError::OutOfBounds {
                        coord: coord.to_vec(),
                        dims: content.dims.clone(),
                    });
                }
            }
        }
        self.notify_dependents()?;
        self.staging.borrow_mut().push(coord, value)?;
        let mut content = self.content.borrow_mut();
        content.active_staging = Rc::downgrade(&self.staging);
        content.needs_pack = true;
        Ok(())
    }

    /// Synchronizes every dependent so it observes the pre-mutation state,
    /// marks it for recomputation, and clears the list. Dependents
    /// re-register when their assignment compiles again, so later
    /// mutations keep finding them.
    fn notify_dependents(&self) -> Result<()> {
        let dependents = std::mem::take(&mut self.content.borrow_mut().dependents);
        for dependent in dependents {
            if let Some(content) = dependent.content.upgrade() {
                let handle = Tensor::from_content(content);
                handle.sync_values()?;
                let mut inner = handle.content.borrow_mut();
                if inner.assignment.is_some() {
                    inner.needs_compute = true;
                }
            }
        }
        Ok(())
    }

    /// Registers this tensor as a dependent of each of its operands.
    fn register_on_operands(&self) {
        let operands = self.content.borrow().operands.clone();
        for operand in operands {
            if Rc::ptr_eq(&operand.content, &self.content) {
                continue;
            }
            let mut inner = operand.content.borrow_mut();
            let registered = inner
                .dependents
                .iter()
                .any(|dependent| std::ptr::eq(dependent.content.as_ptr(), Rc::as_ptr(&self.content)));
            if !registered {
                inner.dependents.push(DependentRef {
                    content: Rc::downgrade(&self.content),
                });
            }
        }
    }

    /// Packs the staged coordinates into the storage the format mandates.
    /// A no-op when nothing was staged since the last pack.
    pub fn pack(&mut self) -> Result<()> {
        self.pack_internal()
    }

    fn pack_internal(&self) -> Result<()> {
        if !self.content.borrow().needs_pack {
            return Ok(());
        }
        let staging = {
            let content = self.content.borrow();
            content
                .active_staging
                .upgrade()
                .unwrap_or_else(|| Rc::clone(&self.staging))
        };
        let packed = {
            let content = self.content.borrow();
            let buffer = staging.borrow();
            pack_buffer(&content.dims, content.storage.format(), &buffer)?
        };
        staging.borrow_mut().clear();
        let mut content = self.content.borrow_mut();
        content.needs_pack = false;
        content.values_size = packed.values.len();
        content.storage.set_index(packed.index);
        content.storage.set_values(packed.values);
        Ok(())
    }

    /// An expression reading this tensor at the given index variables.
    pub fn access(&self, indices: &[IndexVar]) -> Result<IndexExpr> {
        let access = Access::new(self.tensor_var(), indices.to_vec())?;
        Ok(IndexExpr::from(access))
    }

    /// Installs the assignment `self(indices) = rhs`.
    pub fn assign(&mut self, indices: &[IndexVar], rhs: IndexExpr) -> Result<()> {
        self.assign_with(indices, None, rhs)
    }

    /// Installs the compound assignment `self(indices) op= rhs`. The
    /// output structure is not reassembled; values fold into the existing
    /// contents.
    pub fn assign_compound(
        &mut self,
        indices: &[IndexVar],
        op: BinaryOp,
        rhs: IndexExpr,
    ) -> Result<()> {
        self.assign_with(indices, Some(op), rhs)
    }

    fn assign_with(
        &mut self,
        indices: &[IndexVar],
        op: Option<BinaryOp>,
        rhs: IndexExpr,
    ) -> Result<()> {
        let lhs = Access::new(self.tensor_var(), indices.to_vec())?;

        // this tensor's values are about to be redefined
        self.notify_dependents()?;

        let operands = resolve_operands(&rhs)?;
        for operand in &operands {
            operand.sync_values()?;
        }

        let assignment = match op {
            None => Assignment::new(lhs, rhs),
            Some(op) => Assignment::compound(lhs, op, rhs),
        };
        let mut content = self.content.borrow_mut();
        content.assignment = Some(make_reduction_notation(&assignment));
        content.lowered = None;
        content.assemble_func = None;
        content.compute_func = None;
        content.operands = operands;
        content.needs_pack = false;
        content.needs_compute = true;
        drop(content);
        self.register_on_operands();
        Ok(())
    }

    /// Compiles the installed assignment: rewrites operand accesses whose
    /// storage ordering disagrees with the global iteration order, lowers
    /// the assemble and compute kernels, and caches them.
    pub fn compile(&mut self, assemble_while_compute: bool) -> Result<()> {
        self.compile_internal(assemble_while_compute)
    }

    fn compile_internal(&self, assemble_while_compute: bool) -> Result<()> {
        if self.content.borrow().assignment.is_none() {
            bail!(TensorError::CompileWithoutExpression);
        }
        apply_transpose_rewrite(self)?;

        let (lowered, alloc_size) = {
            let content = self.content.borrow();
            (content.lowered.clone().expect("lowered assignment"), content.alloc_size)
        };
        debug!(tensor = %self.name(), statement = %lowered, "compiling");

        let assemble_props = [Property::Assemble];
        let compute_props: &[Property] = if assemble_while_compute {
            &[Property::Compute, Property::Assemble]
        } else {
            &[Property::Compute]
        };
        let mut content = self.content.borrow_mut();
        content.assemble_while_compute = assemble_while_compute;
        let assemble =
            content
                .module
                .lower_assemble(&lowered, "assemble", &assemble_props, alloc_size)?;
        let compute = content
            .module
            .lower_compute(&lowered, "compute", compute_props, alloc_size)?;
        content.module.add_function(assemble.clone())?;
        content.module.add_function(compute.clone())?;
        content.module.compile_module()?;
        content.assemble_func = Some(assemble);
        content.compute_func = Some(compute);
        drop(content);
        self.register_on_operands();
        Ok(())
    }

    /// Runs the assemble kernel and adopts the index arrays it built.
    pub fn assemble(&mut self) -> Result<()> {
        self.assemble_internal()
    }

    fn assemble_internal(&self) -> Result<()> {
        if self.content.borrow().assemble_func.is_none() {
            bail!(TensorError::AssembleWithoutCompile);
        }
        let mut args = self.pack_arguments()?;
        {
            let mut pointers: Vec<_> = args.iter_mut().map(|arg| arg.as_mut_ptr()).collect();
            self.content
                .borrow_mut()
                .module
                .invoke("assemble", &mut pointers)?;
        }
        if !self.content.borrow().assemble_while_compute {
            let values_size = {
                let mut content = self.content.borrow_mut();
                let storage = &mut content.storage;
                unpack_tensor_data(&args[0], storage)?
            };
            self.content.borrow_mut().values_size = values_size;
        }
        Ok(())
    }

    /// Runs the compute kernel, filling the values array.
    pub fn compute(&mut self) -> Result<()> {
        self.compute_internal()
    }

    fn compute_internal(&self) -> Result<()> {
        if self.content.borrow().compute_func.is_none() {
            bail!(TensorError::ComputeWithoutCompile);
        }
        self.content.borrow_mut().needs_compute = false;
        let mut args = self.pack_arguments()?;
        {
            let mut pointers: Vec<_> = args.iter_mut().map(|arg| arg.as_mut_ptr()).collect();
            self.content
                .borrow_mut()
                .module
                .invoke("compute", &mut pointers)?;
        }
        if self.content.borrow().assemble_while_compute {
            let values_size = {
                let mut content = self.content.borrow_mut();
                let storage = &mut content.storage;
                unpack_tensor_data(&args[0], storage)?
            };
            self.content.borrow_mut().values_size = values_size;
        }
        Ok(())
    }

    /// Compiles, assembles and computes as needed. Assembly is skipped for
    /// compound assignments, which fold into the existing structure.
    pub fn evaluate(&mut self) -> Result<()> {
        let has_op = {
            let content = self.content.borrow();
            content
                .assignment
                .as_ref()
                .and_then(Assignment::op)
                .is_some()
        };
        self.compile_internal(false)?;
        if !has_op {
            self.assemble_internal()?;
        }
        self.compute_internal()
    }

    /// Brings the tensor's observable values up to date: packs pending
    /// insertions, otherwise compiles, assembles and computes a pending
    /// assignment. Idempotent.
    pub fn sync_values(&self) -> Result<()> {
        let (needs_pack, needs_compute) = {
            let content = self.content.borrow();
            (content.needs_pack, content.needs_compute)
        };
        if needs_pack {
            self.pack_internal()
        } else if needs_compute {
            let has_op = {
                let content = self.content.borrow();
                content
                    .assignment
                    .as_ref()
                    .and_then(Assignment::op)
                    .is_some()
            };
            self.compile_internal(false)?;
            if !has_op {
                self.assemble_internal()?;
            }
            self.compute_internal()
        } else {
            Ok(())
        }
    }

    /// The value at a coordinate; the component's zero when absent.
    pub fn get_value<T: Component>(&self, coord: &[usize]) -> Result<T> {
        {
            let content = self.content.borrow();
            if coord.len() != content.dims.len() {
                bail!(TensorError::ArityMismatch {
                    expected: content.dims.len(),
                    got: coord.len(),
                });
            }
            if T::DTYPE != content.dtype {
                bail!(TensorError::TypeMismatch {
                    expected: content.dtype,
                    got: T::DTYPE,
                });
            }
            for (&c, &dim) in coord.iter().zip(&content.dims) {
                if c >= dim {
                    bail!(TensorError::OutOfBounds {
                        coord: coord.to_vec(),
                        dims: content.dims.clone(),
                    });
                }
            }
        }
        self.sync_values()?;
        let content = self.content.borrow();
        for (at, value) in tensalg_core::entries::<T>(&content.storage)? {
            if at.as_slice() == coord {
                return Ok(value);
            }
        }
        Ok(T::zero())
    }

    /// Every `(coordinate, value)` pair in storage order, coordinates in
    /// logical mode order.
    pub fn entries<T: Component>(&self) -> Result<Vec<(Vec<usize>, T)>> {
        self.sync_values()?;
        let content = self.content.borrow();
        Ok(tensalg_core::entries::<T>(&content.storage)?
            .into_iter()
            .map(|(coord, value)| (coord.to_vec(), value))
            .collect())
    }

    /// Empties the values and index arrays and clears all pending state.
    pub fn zero(&mut self) {
        self.staging.borrow_mut().clear();
        let mut content = self.content.borrow_mut();
        let format = content.storage.format().clone();
        let dims = content.dims.clone();
        let dtype = content.dtype;
        content.storage = Storage::new(dtype, &dims, format);
        content.values_size = 0;
        content.needs_pack = false;
        content.needs_compute = false;
    }

    /// Packs a fresh tensor whose mode `m` is this tensor's mode
    /// `new_mode_ordering[m]`, keeping the storage format.
    pub fn transpose(&self, new_mode_ordering: &[usize]) -> Result<Tensor> {
        self.transpose_with_format(&fresh_name('A'), new_mode_ordering, self.format())
    }

    /// [`Tensor::transpose`] with an explicit name and format.
    pub fn transpose_with_format(
        &self,
        name: &str,
        new_mode_ordering: &[usize],
        format: Format,
    ) -> Result<Tensor> {
        let dims = self.dims();
        if new_mode_ordering.len() != dims.len() {
            bail!(TensorError::ArityMismatch {
                expected: dims.len(),
                got: new_mode_ordering.len(),
            });
        }
        self.sync_values()?;
        let new_dims: Vec<usize> = new_mode_ordering.iter().map(|&m| dims[m]).collect();
        let mut transposed = Tensor::new(name, self.dtype(), &new_dims, format)?;
        with_component!(self.dtype(), T => {
            let entries = self.entries::<T>()?;
            transposed.reserve(entries.len());
            for (coord, value) in entries {
                let permuted: Vec<usize> =
                    new_mode_ordering.iter().map(|&m| coord[m]).collect();
                transposed.insert(&permuted, value)?;
            }
        });
        transposed.pack()?;
        Ok(transposed)
    }

    /// Packs an equivalent tensor stored under a new mode ordering: same
    /// logical coordinates, different storage order.
    pub fn change_mode_ordering(&self, new_mode_ordering: &[usize]) -> Result<Tensor> {
        let format = {
            let content = self.content.borrow();
            Format::from_packs(
                content.storage.format().packs().to_vec(),
                new_mode_ordering.to_vec(),
            )?
        };
        self.sync_values()?;
        let dims = self.dims();
        let mut reordered = Tensor::new(&fresh_name('A'), self.dtype(), &dims, format)?;
        with_component!(self.dtype(), T => {
            let entries = self.entries::<T>()?;
            reordered.reserve(entries.len());
            for (coord, value) in entries {
                reordered.insert(&coord, value)?;
            }
        });
        reordered.pack()?;
        Ok(reordered)
    }

    /// Builds the kernel argument list: the result descriptor followed by
    /// the operand descriptors in rhs discovery order.
    fn pack_arguments(&self) -> Result<Vec<RawTensorArg>> {
        let (lowered, dims) = {
            let content = self.content.borrow();
            let Some(lowered) = content.lowered.clone() else {
                bail!(TensorError::ComputeWithoutCompile);
            };
            (lowered, content.dims.clone())
        };
        let mut args = Vec::new();
        {
            let content = self.content.borrow();
            args.push(RawTensorArg::from_storage(&content.storage, &dims));
        }
        for operand in self.resolve_operand_handles(&lowered)? {
            if !Rc::ptr_eq(&operand.content, &self.content) {
                operand.sync_values()?;
            }
            let content = operand.content.borrow();
            args.push(RawTensorArg::from_storage(&content.storage, &content.dims));
        }
        Ok(args)
    }

    /// Finds live handles for the operands the lowered rhs reads.
    fn resolve_operand_handles(&self, lowered: &Assignment) -> Result<Vec<Tensor>> {
        let cached = self.content.borrow().operands.clone();
        operand_vars(lowered.rhs())
            .into_iter()
            .map(|var| {
                cached
                    .iter()
                    .find(|operand| operand.tensor_var() == var)
                    .cloned()
                    .or_else(|| resolve(var.id()))
                    .ok_or_else(|| {
                        TensorError::UnknownOperand(var.name().to_string()).into()
                    })
            })
            .collect()
    }
}

/// Resolves the tensors an expression reads through the id arena.
pub(crate) fn resolve_operands(rhs: &IndexExpr) -> Result<Vec<Tensor>> {
    operand_vars(rhs)
        .into_iter()
        .map(|var| {
            resolve(var.id())
                .ok_or_else(|| TensorError::UnknownOperand(var.name().to_string()).into())
        })
        .collect()
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sync_values().is_err() {
            writeln!(f, "{} <unsynchronized>", self.name())?;
        }
        let content = self.content.borrow();
        let dims: Vec<String> = content.dims.iter().map(|d| d.to_string()).collect();
        writeln!(
            f,
            "{} ({}) {}:",
            content.name,
            dims.join("x"),
            content.storage.format()
        )?;
        if !content.dtype.is_numeric() {
            return Ok(());
        }
        with_component!(content.dtype, T => {
            match tensalg_core::entries::<T>(&content.storage) {
                Ok(entries) => {
                    for (coord, value) in entries {
                        let coord: Vec<String> =
                            coord.iter().map(|c| c.to_string()).collect();
                        writeln!(f, "({}): {:?}", coord.join(","), value)?;
                    }
                }
                Err(_) => writeln!(f, "<no values>")?,
            }
            Ok(())
        })
    }
}
