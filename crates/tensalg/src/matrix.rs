//! CSR/CSC matrix factories.
//!
//! Builds packed matrices directly from compressed arrays, either copying
//! owned vectors or wrapping caller-owned buffers the engine must never
//! free.

use anyhow::{bail, Result};
use tensalg_core::{
    make_csc_index, make_csr_index, Array, Component, Datatype, Format, Index, ModeIndex,
    TensorError,
};

use crate::tensor::Tensor;

fn require_matrix(dims: &[usize]) -> Result<()> {
    if dims.len() != 2 {
        bail!(TensorError::ArityMismatch {
            expected: 2,
            got: dims.len(),
        });
    }
    Ok(())
}

/// Builds a packed CSR matrix from row pointer, column index and value
/// vectors.
pub fn from_csr<T: Component>(
    name: &str,
    dims: &[usize],
    rowptr: Vec<i32>,
    colidx: Vec<i32>,
    vals: Vec<T>,
) -> Result<Tensor> {
    require_matrix(dims)?;
    let tensor = Tensor::new(name, T::DTYPE, dims, Format::csr())?;
    {
        let mut content = tensor.content.borrow_mut();
        content.storage.set_index(make_csr_index(dims[0], rowptr, colidx));
        content.values_size = vals.len();
        content.storage.set_values(Array::from_vec(vals));
    }
    Ok(tensor)
}

/// Builds a packed CSC matrix from column pointer, row index and value
/// vectors.
pub fn from_csc<T: Component>(
    name: &str,
    dims: &[usize],
    colptr: Vec<i32>,
    rowidx: Vec<i32>,
    vals: Vec<T>,
) -> Result<Tensor> {
    require_matrix(dims)?;
    let tensor = Tensor::new(name, T::DTYPE, dims, Format::csc())?;
    {
        let mut content = tensor.content.borrow_mut();
        content.storage.set_index(make_csc_index(dims[1], colptr, rowidx));
        content.values_size = vals.len();
        content.storage.set_values(Array::from_vec(vals));
    }
    Ok(tensor)
}

/// Builds a CSR matrix over caller-owned arrays. The buffers remain owned
/// by the caller and are never freed by the engine.
///
/// # Safety
///
/// `rowptr` must hold `dims[0] + 1` entries, `colidx` and `vals` must hold
/// `rowptr[dims[0]]` entries, and all three must outlive the tensor.
pub unsafe fn from_raw_csr<T: Component>(
    name: &str,
    dims: &[usize],
    rowptr: *mut i32,
    colidx: *mut i32,
    vals: *mut T,
) -> Result<Tensor> {
    require_matrix(dims)?;
    let tensor = Tensor::new(name, T::DTYPE, dims, Format::csr())?;
    let stored = *rowptr.add(dims[0]) as usize;
    let extent = Array::from_i64s(Datatype::Int32, &[dims[0] as i64])?;
    let pos = Array::user_owned(Datatype::Int32, rowptr as *mut u8, dims[0] + 1);
    let crd = Array::user_owned(Datatype::Int32, colidx as *mut u8, stored);
    let values = Array::user_owned(T::DTYPE, vals as *mut u8, stored);
    {
        let mut content = tensor.content.borrow_mut();
        content.storage.set_index(Index::new(
            Format::csr(),
            vec![
                ModeIndex::new(vec![extent]),
                ModeIndex::new(vec![pos, crd]),
            ],
        ));
        content.values_size = stored;
        content.storage.set_values(values);
    }
    Ok(tensor)
}

/// The `(pos, crd, vals)` arrays of a CSR matrix, copied out.
pub fn csr_arrays<T: Component>(tensor: &Tensor) -> Result<(Vec<i32>, Vec<i32>, Vec<T>)> {
    if tensor.format() != Format::csr() {
        bail!(TensorError::Format(
            tensalg_core::FormatError::UnsupportedMode(format!(
                "'{}' is not stored in the CSR format",
                tensor.name()
            ))
        ));
    }
    tensor.sync_values()?;
    let content = tensor.content.borrow();
    let index = content.storage.index();
    let pos = index.mode_index(1).array(0).as_slice::<i32>()?.to_vec();
    let crd = index.mode_index(1).array(1).as_slice::<i32>()?.to_vec();
    let vals = content.storage.values().as_slice::<T>()?.to_vec();
    Ok((pos, crd, vals))
}

/// The `(pos, crd, vals)` arrays of a CSC matrix, copied out.
pub fn csc_arrays<T: Component>(tensor: &Tensor) -> Result<(Vec<i32>, Vec<i32>, Vec<T>)> {
    if tensor.format() != Format::csc() {
        bail!(TensorError::Format(
            tensalg_core::FormatError::UnsupportedMode(format!(
                "'{}' is not stored in the CSC format",
                tensor.name()
            ))
        ));
    }
    tensor.sync_values()?;
    let content = tensor.content.borrow();
    let index = content.storage.index();
    let pos = index.mode_index(1).array(0).as_slice::<i32>()?.to_vec();
    let crd = index.mode_index(1).array(1).as_slice::<i32>()?.to_vec();
    let vals = content.storage.values().as_slice::<T>()?.to_vec();
    Ok((pos, crd, vals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::equals;

    #[test]
    fn test_from_csr_matches_packed() {
        let built = from_csr("M", &[3, 4], vec![0, 1, 1, 2], vec![2, 0], vec![1.5f64, 2.5])
            .unwrap();

        let mut packed = Tensor::new("P", Datatype::Float64, &[3, 4], Format::csr()).unwrap();
        packed.insert(&[0, 2], 1.5).unwrap();
        packed.insert(&[2, 0], 2.5).unwrap();
        packed.pack().unwrap();

        assert!(equals(&built, &packed).unwrap());
    }

    #[test]
    fn test_from_csc_iterates_by_column() {
        let built = from_csc(
            "M",
            &[3, 2],
            vec![0, 1, 2],
            vec![2, 0],
            vec![4.0f64, 5.0],
        )
        .unwrap();
        assert_eq!(
            built.entries::<f64>().unwrap(),
            vec![(vec![2, 0], 4.0), (vec![0, 1], 5.0)]
        );
    }

    #[test]
    fn test_raw_csr_is_user_owned() {
        let mut rowptr = vec![0i32, 1, 2];
        let mut colidx = vec![1i32, 0];
        let mut vals = vec![3.0f64, 4.0];
        let tensor = unsafe {
            from_raw_csr(
                "M",
                &[2, 2],
                rowptr.as_mut_ptr(),
                colidx.as_mut_ptr(),
                vals.as_mut_ptr(),
            )
        }
        .unwrap();
        assert_eq!(tensor.get_value::<f64>(&[0, 1]).unwrap(), 3.0);
        assert_eq!(tensor.get_value::<f64>(&[1, 0]).unwrap(), 4.0);
        drop(tensor);
        // the buffers are untouched after the tensor is gone
        assert_eq!(vals, vec![3.0, 4.0]);
        assert_eq!(rowptr, vec![0, 1, 2]);
        assert_eq!(colidx, vec![1, 0]);
    }

    #[test]
    fn test_csr_arrays_roundtrip() {
        let built =
            from_csr("M", &[3, 4], vec![0, 1, 1, 2], vec![2, 0], vec![1.5f64, 2.5]).unwrap();
        let (pos, crd, vals) = csr_arrays::<f64>(&built).unwrap();
        assert_eq!(pos, vec![0, 1, 1, 2]);
        assert_eq!(crd, vec![2, 0]);
        assert_eq!(vals, vec![1.5, 2.5]);
    }

    #[test]
    fn test_csr_arrays_requires_csr() {
        let tensor = Tensor::new("X", Datatype::Float64, &[2, 2], Format::csc()).unwrap();
        assert!(csr_arrays::<f64>(&tensor).is_err());
    }

    #[test]
    fn test_csc_arrays_roundtrip() {
        let built =
            from_csc("M", &[3, 2], vec![0, 1, 2], vec![2, 0], vec![4.0f64, 5.0]).unwrap();
        let (pos, crd, vals) = csc_arrays::<f64>(&built).unwrap();
        assert_eq!(pos, vec![0, 1, 2]);
        assert_eq!(crd, vec![2, 0]);
        assert_eq!(vals, vec![4.0, 5.0]);
    }
}
