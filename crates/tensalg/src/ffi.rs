//! The wire layout between the core and generated kernels.
//!
//! [`RawTensor`] is the bit-exact C layout a compiled kernel consumes:
//! order, dimension and mode-ordering tables, per-level raw index-array
//! pointers, and the values buffer. [`RawTensorArg`] materializes one from
//! a tensor's current storage and keeps the pointer tables alive for the
//! duration of a call; [`unpack_tensor_data`] adopts the buffers a kernel
//! allocated back into [`Storage`].

use anyhow::{bail, Result};
use tensalg_core::{Array, Datatype, Format, Index, ModeFormat, ModeIndex, Storage, TensorError};

/// Mode kind bytes in the wire layout.
pub const MODE_DENSE: u8 = 0;
/// Sparse mode kind byte.
pub const MODE_SPARSE: u8 = 1;

/// The C-ABI tensor descriptor consumed by generated kernels.
#[repr(C)]
#[derive(Debug)]
pub struct RawTensor {
    pub order: i32,
    pub dimensions: *mut i32,
    pub csize: i32,
    pub mode_ordering: *mut i32,
    pub mode_types: *mut u8,
    /// Per stored level, an array of raw index-array pointers (one slot
    /// for dense extents, two for sparse `pos`/`crd`).
    pub indices: *mut *mut *mut u8,
    pub vals: *mut u8,
    pub vals_size: i64,
}

/// A [`RawTensor`] plus the owned tables behind its pointers. The borrowed
/// index and value buffers belong to the tensor's storage; the descriptor
/// is only valid while that storage is untouched.
pub struct RawTensorArg {
    raw: Box<RawTensor>,
    _dims: Box<[i32]>,
    _ordering: Box<[i32]>,
    _mode_types: Box<[u8]>,
    _level_tables: Vec<Box<[*mut u8]>>,
    _outer: Box<[*mut *mut u8]>,
}

impl RawTensorArg {
    /// Builds a descriptor over a tensor's current storage. Unassembled
    /// levels get null pointer slots for the kernel to fill.
    pub fn from_storage(storage: &Storage, dims: &[usize]) -> RawTensorArg {
        let format = storage.format();
        let order = format.order();
        let mode_formats = format.mode_formats();

        let mut dim_table: Box<[i32]> = dims.iter().map(|&d| d as i32).collect();
        let mut ordering: Box<[i32]> = format
            .mode_ordering()
            .iter()
            .map(|&m| m as i32)
            .collect();
        let mut mode_types: Box<[u8]> = mode_formats
            .iter()
            .map(|mode| match mode {
                ModeFormat::Dense(_) => MODE_DENSE,
                ModeFormat::Sparse => MODE_SPARSE,
            })
            .collect();

        let mut level_tables: Vec<Box<[*mut u8]>> = Vec::with_capacity(order);
        for (level, mode) in mode_formats.iter().enumerate() {
            let slots = match mode {
                ModeFormat::Dense(_) => 1,
                ModeFormat::Sparse => 2,
            };
            let mode_index = storage.index().mode_index(level);
            let mut table: Box<[*mut u8]> = vec![std::ptr::null_mut(); slots].into();
            for (slot, array) in mode_index.arrays().iter().enumerate().take(slots) {
                table[slot] = array.data_ptr();
            }
            level_tables.push(table);
        }
        let mut outer: Box<[*mut *mut u8]> = level_tables
            .iter_mut()
            .map(|table| table.as_mut_ptr())
            .collect();

        let raw = Box::new(RawTensor {
            order: order as i32,
            dimensions: dim_table.as_mut_ptr(),
            csize: storage.dtype().num_bytes() as i32,
            mode_ordering: ordering.as_mut_ptr(),
            mode_types: mode_types.as_mut_ptr(),
            indices: outer.as_mut_ptr(),
            vals: storage.values().data_ptr(),
            vals_size: storage.values().len() as i64,
        });

        RawTensorArg {
            raw,
            _dims: dim_table,
            _ordering: ordering,
            _mode_types: mode_types,
            _level_tables: level_tables,
            _outer: outer,
        }
    }

    /// The descriptor pointer handed to the backend.
    pub fn as_mut_ptr(&mut self) -> *mut RawTensor {
        &mut *self.raw
    }

    #[inline]
    pub fn raw(&self) -> &RawTensor {
        &self.raw
    }
}

/// Reads one integer entry of the given type from a raw index array.
///
/// # Safety
///
/// `ptr` must point at least `at + 1` valid entries of type `dtype`.
pub(crate) unsafe fn read_int(dtype: Datatype, ptr: *const u8, at: usize) -> i64 {
    match dtype {
        Datatype::UInt8 => *ptr.add(at) as i64,
        Datatype::UInt16 => (ptr as *const u16).add(at).read_unaligned() as i64,
        Datatype::UInt32 => (ptr as *const u32).add(at).read_unaligned() as i64,
        Datatype::UInt64 => (ptr as *const u64).add(at).read_unaligned() as i64,
        Datatype::Int8 => (ptr as *const i8).add(at).read_unaligned() as i64,
        Datatype::Int16 => (ptr as *const i16).add(at).read_unaligned() as i64,
        Datatype::Int32 => (ptr as *const i32).add(at).read_unaligned() as i64,
        Datatype::Int64 => (ptr as *const i64).add(at).read_unaligned(),
        other => panic!("coordinate array has non-integer type {other}"),
    }
}

/// Adopts the index and value buffers a kernel allocated into `storage`,
/// following the level structure of its format. Dense levels copy the
/// extent; sparse levels take ownership of the `pos`/`crd` blocks, and the
/// values buffer is adopted at the slot count the walk yields. Returns
/// that slot count.
///
/// # Safety contract
///
/// The kernel must have written engine-allocated (aligned) buffers into
/// the sparse slots and `vals` of the descriptor, as the reference backend
/// does.
pub fn unpack_tensor_data(arg: &RawTensorArg, storage: &mut Storage) -> Result<usize> {
    let format: Format = storage.format().clone();
    let dtype = storage.dtype();
    let raw = arg.raw();
    if raw.order as usize != format.order() {
        bail!(TensorError::Backend(format!(
            "kernel returned order {} for a tensor of order {}",
            raw.order,
            format.order()
        )));
    }

    let level_types = format.level_array_types().to_vec();
    let mut mode_indices: Vec<ModeIndex> = Vec::with_capacity(format.order());
    let mut num_vals = 1usize;

    unsafe {
        for (level, mode) in format.mode_formats().iter().enumerate() {
            let level_table = *raw.indices.add(level);
            match mode {
                ModeFormat::Dense(_) => {
                    let extent_ptr = *level_table.add(0);
                    if extent_ptr.is_null() {
                        bail!(TensorError::Backend(
                            "kernel left a dense extent unset".to_string()
                        ));
                    }
                    let extent = read_int(level_types[level][0], extent_ptr, 0);
                    mode_indices.push(ModeIndex::new(vec![Array::from_i64s(
                        level_types[level][0],
                        &[extent],
                    )?]));
                    num_vals *= extent as usize;
                }
                ModeFormat::Sparse => {
                    let pos_ptr = *level_table.add(0);
                    let crd_ptr = *level_table.add(1);
                    if pos_ptr.is_null() || crd_ptr.is_null() {
                        bail!(TensorError::Backend(
                            "kernel left a sparse level unassembled".to_string()
                        ));
                    }
                    let pos_dtype = level_types[level][0];
                    let crd_dtype = level_types[level][1];
                    let stored = read_int(pos_dtype, pos_ptr, num_vals) as usize;
                    let pos = Array::from_raw(pos_dtype, pos_ptr, num_vals + 1);
                    let crd = Array::from_raw(crd_dtype, crd_ptr, stored);
                    mode_indices.push(ModeIndex::new(vec![pos, crd]));
                    num_vals = stored;
                }
            }
        }
        storage.set_index(Index::new(format, mode_indices));
        storage.set_values(Array::from_raw(dtype, raw.vals, num_vals));
    }
    Ok(num_vals)
}
