//! The reference kernel backend.
//!
//! [`Interpreter`] stands in for a loop-lowering backend: lowering
//! captures the assignment, and invocation evaluates it directly. Operand
//! descriptors are walked level-by-level into coordinate maps, the
//! right-hand side is evaluated over the free-variable grid with
//! reductions folded over their variable's extent, and the result is
//! packed with the core packer. An assemble call writes freshly allocated
//! index arrays through the wire descriptor; a compute call fills the
//! previously assembled values buffer in place.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{bail, Result};
use smallvec::SmallVec;
use tracing::debug;

use tensalg_core::{
    pack_entries, with_component, Array, Component, ModeFormat, Shape, TensorError,
};
use tensalg_ir::{
    operand_vars, Access, Assignment, ExprNode, IndexExpr, IndexVar, TensorVar,
};

use crate::backend::{FuncHandle, KernelBackend, Property};
use crate::ffi::{read_int, RawTensor};

struct LoweredKernel {
    assignment: Assignment,
    props: Vec<Property>,
}

/// A [`KernelBackend`] that interprets assignments instead of lowering
/// them to native code.
#[derive(Default)]
pub struct Interpreter {
    functions: HashMap<String, Rc<LoweredKernel>>,
    compiled: bool,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::default()
    }

    fn lower(&self, stmt: &Assignment, name: &str, props: &[Property]) -> FuncHandle {
        FuncHandle::new(
            name,
            Rc::new(LoweredKernel {
                assignment: stmt.clone(),
                props: props.to_vec(),
            }),
        )
    }
}

impl KernelBackend for Interpreter {
    fn lower_assemble(
        &mut self,
        stmt: &Assignment,
        name: &str,
        props: &[Property],
        _alloc_size: usize,
    ) -> Result<FuncHandle> {
        Ok(self.lower(stmt, name, props))
    }

    fn lower_compute(
        &mut self,
        stmt: &Assignment,
        name: &str,
        props: &[Property],
        _alloc_size: usize,
    ) -> Result<FuncHandle> {
        Ok(self.lower(stmt, name, props))
    }

    fn add_function(&mut self, func: FuncHandle) -> Result<()> {
        let Some(kernel) = func.payload::<LoweredKernel>() else {
            bail!(TensorError::Backend(
                "function was lowered by a different backend".to_string()
            ));
        };
        self.functions.insert(func.name().to_string(), kernel);
        self.compiled = false;
        Ok(())
    }

    fn compile_module(&mut self) -> Result<()> {
        self.compiled = true;
        Ok(())
    }

    fn invoke(&mut self, name: &str, args: &mut [*mut RawTensor]) -> Result<()> {
        if !self.compiled {
            bail!(TensorError::Backend("module is not compiled".to_string()));
        }
        let Some(kernel) = self.functions.get(name).cloned() else {
            bail!(TensorError::Backend(format!("unknown function '{name}'")));
        };
        debug!(function = name, "interpreting kernel");
        let dtype = kernel.assignment.lhs().tensor.dtype();
        with_component!(dtype, T => { run_kernel::<T>(&kernel, args) })
    }
}

fn run_kernel<T: Component>(kernel: &LoweredKernel, args: &mut [*mut RawTensor]) -> Result<()> {
    let assignment = &kernel.assignment;
    let lhs = assignment.lhs();
    let operands = operand_vars(assignment.rhs());
    if args.len() != operands.len() + 1 {
        bail!(TensorError::Backend(format!(
            "expected {} arguments, got {}",
            operands.len() + 1,
            args.len()
        )));
    }

    // Operand coordinate maps, converted into the output component type.
    let mut maps: HashMap<u64, HashMap<Vec<usize>, T>> = HashMap::new();
    for (&arg, var) in args[1..].iter().zip(&operands) {
        let raw = unsafe { &*arg };
        let mut map = HashMap::new();
        for (coord, slot) in raw_slots(raw, var)? {
            let value = unsafe { read_component(var.dtype(), raw.vals, slot) };
            map.insert(coord, T::from_val(value));
        }
        maps.insert(var.id(), map);
    }

    // Index-variable extents, from the lhs and every rhs access.
    let mut extents: HashMap<IndexVar, usize> = HashMap::new();
    for (var, &dim) in lhs.indices.iter().zip(lhs.tensor.dims()) {
        extents.entry(var.clone()).or_insert(dim);
    }
    collect_extents(assignment.rhs(), &mut extents);

    // Evaluate over the free-variable grid.
    let free = assignment.free_vars();
    let free_dims: Vec<usize> = lhs.tensor.dims().to_vec();
    let mut env: HashMap<IndexVar, usize> = HashMap::new();
    let mut computed: Vec<(Shape, T)> = Vec::new();
    let mut grid: Vec<usize> = vec![0; free.len()];
    // a zero-extent dimension leaves the grid empty
    while free_dims.iter().all(|&dim| dim > 0) {
        for (var, &at) in free.iter().zip(&grid) {
            env.insert(var.clone(), at);
        }
        let value = eval::<T>(assignment.rhs(), &maps, &extents, &mut env)?;
        if !value.is_zero() {
            computed.push((SmallVec::from_slice(&grid), value));
        }
        // odometer over the free dimensions
        let mut at = free.len();
        loop {
            if at == 0 {
                break;
            }
            at -= 1;
            grid[at] += 1;
            if grid[at] < free_dims[at] {
                break;
            }
            grid[at] = 0;
        }
        if grid.iter().all(|&g| g == 0) {
            break;
        }
    }

    // A compound assignment folds into the output's existing contents.
    if let Some(op) = assignment.op() {
        let out = unsafe { &*args[0] };
        let mut existing: HashMap<Vec<usize>, T> = HashMap::new();
        for (coord, slot) in raw_slots(out, &lhs.tensor)? {
            let value = unsafe { read_component(lhs.tensor.dtype(), out.vals, slot) };
            existing.insert(coord, T::from_val(value));
        }
        let mut combined: HashMap<Vec<usize>, T> = existing;
        for (coord, value) in computed {
            let entry = combined.entry(coord.to_vec()).or_insert_with(T::zero);
            *entry = op.apply(*entry, value);
        }
        computed = combined
            .into_iter()
            .filter(|(_, value)| !value.is_zero())
            .map(|(coord, value)| (SmallVec::from_slice(&coord), value))
            .collect();
        computed.sort_by(|a, b| a.0.cmp(&b.0));
    }

    write_output::<T>(kernel, lhs, computed, args[0])
}

fn write_output<T: Component>(
    kernel: &LoweredKernel,
    lhs: &Access,
    computed: Vec<(Shape, T)>,
    out: *mut RawTensor,
) -> Result<()> {
    let assemble = kernel.props.contains(&Property::Assemble);
    let compute = kernel.props.contains(&Property::Compute);
    let format = lhs.tensor.format();
    let dims = lhs.tensor.dims();
    let raw = unsafe { &mut *out };

    if assemble {
        // Replace the sparse levels and the values buffer with freshly
        // allocated blocks; the caller adopts them when unpacking. Dense
        // extents already live in the caller's storage.
        let packed = pack_entries::<T>(dims, format, computed)?;
        let slots = packed.values.len();
        unsafe {
            for (level, mode_index) in packed.index.into_mode_indices().into_iter().enumerate() {
                if let ModeFormat::Sparse = format.mode_formats()[level] {
                    let level_table = *raw.indices.add(level);
                    for (slot, array) in mode_index.into_arrays().into_iter().enumerate() {
                        *level_table.add(slot) = array.into_raw_parts().0;
                    }
                }
            }
            let values = if compute {
                packed.values
            } else {
                Array::zeroed(T::DTYPE, slots)
            };
            raw.vals = values.into_raw_parts().0;
            raw.vals_size = slots as i64;
        }
        return Ok(());
    }

    // Compute into the existing structure: walk the assembled output and
    // fill each slot with the value computed for its coordinate.
    let map: HashMap<Vec<usize>, T> = computed
        .into_iter()
        .map(|(coord, value)| (coord.to_vec(), value))
        .collect();
    let out_slots = raw_slots(raw, &lhs.tensor)?;
    if (raw.vals_size as usize) < out_slots.len() {
        bail!(TensorError::Backend(
            "output values buffer is smaller than its index".to_string()
        ));
    }
    unsafe {
        for (coord, slot) in out_slots {
            let value = map.get(&coord).copied().unwrap_or_else(T::zero);
            (raw.vals as *mut T).add(slot).write_unaligned(value);
        }
    }
    Ok(())
}

/// Collects `(logical coordinate, value slot)` pairs by walking a wire
/// descriptor's level structure, in storage order.
fn raw_slots(raw: &RawTensor, var: &TensorVar) -> Result<Vec<(Vec<usize>, usize)>> {
    let format = var.format();
    let order = var.order();
    if raw.order as usize != order {
        bail!(TensorError::Backend(format!(
            "descriptor order {} does not match tensor order {}",
            raw.order, order
        )));
    }
    if order == 0 {
        return Ok(if raw.vals_size > 0 && !raw.vals.is_null() {
            vec![(Vec::new(), 0)]
        } else {
            Vec::new()
        });
    }

    let mode_formats = format.mode_formats();
    let level_types = format.level_array_types().to_vec();
    let ordering = format.mode_ordering().to_vec();
    let mut out = Vec::new();
    let mut coords = vec![0usize; order];

    fn descend(
        raw: &RawTensor,
        mode_formats: &[ModeFormat],
        level_types: &[Vec<tensalg_core::Datatype>],
        ordering: &[usize],
        level: usize,
        position: usize,
        coords: &mut Vec<usize>,
        out: &mut Vec<(Vec<usize>, usize)>,
    ) -> Result<()> {
        if level == mode_formats.len() {
            let mut logical = vec![0usize; coords.len()];
            for (at, &coord) in coords.iter().enumerate() {
                logical[ordering[at]] = coord;
            }
            out.push((logical, position));
            return Ok(());
        }
        unsafe {
            let level_table = *raw.indices.add(level);
            match mode_formats[level] {
                ModeFormat::Dense(_) => {
                    let extent_ptr = *level_table.add(0);
                    if extent_ptr.is_null() {
                        return Ok(());
                    }
                    let extent = read_int(level_types[level][0], extent_ptr, 0) as usize;
                    for coord in 0..extent {
                        coords[level] = coord;
                        descend(
                            raw,
                            mode_formats,
                            level_types,
                            ordering,
                            level + 1,
                            position * extent + coord,
                            coords,
                            out,
                        )?;
                    }
                }
                ModeFormat::Sparse => {
                    let pos_ptr = *level_table.add(0);
                    let crd_ptr = *level_table.add(1);
                    if pos_ptr.is_null() || crd_ptr.is_null() {
                        return Ok(());
                    }
                    let start = read_int(level_types[level][0], pos_ptr, position) as usize;
                    let end = read_int(level_types[level][0], pos_ptr, position + 1) as usize;
                    for at in start..end {
                        coords[level] = read_int(level_types[level][1], crd_ptr, at) as usize;
                        descend(
                            raw,
                            mode_formats,
                            level_types,
                            ordering,
                            level + 1,
                            at,
                            coords,
                            out,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    descend(
        raw,
        &mode_formats,
        &level_types,
        &ordering,
        0,
        0,
        &mut coords,
        &mut out,
    )?;
    Ok(out)
}

/// Reads one component of the given type from a values buffer.
unsafe fn read_component(
    dtype: tensalg_core::Datatype,
    vals: *const u8,
    slot: usize,
) -> tensalg_core::ComponentVal {
    with_component!(dtype, S => {
        let value = (vals as *const S).add(slot).read_unaligned();
        <S as Component>::to_val(value)
    })
}

fn collect_extents(expr: &IndexExpr, extents: &mut HashMap<IndexVar, usize>) {
    struct Extents<'a>(&'a mut HashMap<IndexVar, usize>);
    impl tensalg_ir::ExprVisitor for Extents<'_> {
        fn visit_access(&mut self, access: &Access) {
            for (var, &dim) in access.indices.iter().zip(access.tensor.dims()) {
                self.0.entry(var.clone()).or_insert(dim);
            }
        }
    }
    expr.accept(&mut Extents(extents));
}

fn eval<T: Component>(
    expr: &IndexExpr,
    maps: &HashMap<u64, HashMap<Vec<usize>, T>>,
    extents: &HashMap<IndexVar, usize>,
    env: &mut HashMap<IndexVar, usize>,
) -> Result<T> {
    match expr.node() {
        ExprNode::Access(access) => {
            let mut coord = Vec::with_capacity(access.indices.len());
            for var in &access.indices {
                let Some(&at) = env.get(var) else {
                    bail!(TensorError::Backend(format!(
                        "index variable {var} is not bound"
                    )));
                };
                coord.push(at);
            }
            Ok(maps
                .get(&access.tensor.id())
                .and_then(|map| map.get(&coord))
                .copied()
                .unwrap_or_else(T::zero))
        }
        ExprNode::Literal(value) => Ok(T::from_val(*value)),
        ExprNode::Neg(arg) => Ok(T::neg(eval(arg, maps, extents, env)?)),
        ExprNode::Sqrt(arg) => Ok(T::sqrt(eval(arg, maps, extents, env)?)),
        ExprNode::Add(lhs, rhs) => Ok(T::add(
            eval(lhs, maps, extents, env)?,
            eval(rhs, maps, extents, env)?,
        )),
        ExprNode::Sub(lhs, rhs) => Ok(T::sub(
            eval(lhs, maps, extents, env)?,
            eval(rhs, maps, extents, env)?,
        )),
        ExprNode::Mul(lhs, rhs) => Ok(T::mul(
            eval(lhs, maps, extents, env)?,
            eval(rhs, maps, extents, env)?,
        )),
        ExprNode::Div(lhs, rhs) => Ok(T::div(
            eval(lhs, maps, extents, env)?,
            eval(rhs, maps, extents, env)?,
        )),
        ExprNode::Reduction(reduction) => {
            let Some(&extent) = extents.get(&reduction.var) else {
                bail!(TensorError::Backend(format!(
                    "no extent known for reduction variable {}",
                    reduction.var
                )));
            };
            let mut acc = reduction.op.identity::<T>();
            for at in 0..extent {
                env.insert(reduction.var.clone(), at);
                acc = reduction.op.apply(acc, eval(&reduction.body, maps, extents, env)?);
            }
            env.remove(&reduction.var);
            Ok(acc)
        }
    }
}
