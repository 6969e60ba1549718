//! Value comparison between tensors.

use anyhow::{bail, Result};
use tensalg_core::{with_component, Component, TensorError};

use crate::tensor::Tensor;

const RELATIVE_TOLERANCE: f64 = 1e-6;

/// True iff both tensors have the same component type, order and
/// dimensions, and the same values: iterating both in storage order while
/// skipping zero entries, every surviving `(coordinate, value)` pair must
/// match, floats within a relative tolerance of 1e-6.
///
/// Both sides are synchronized before comparison.
pub fn equals(a: &Tensor, b: &Tensor) -> Result<bool> {
    if a.dtype() != b.dtype() {
        return Ok(false);
    }
    if a.order() != b.order() || a.dims() != b.dims() {
        return Ok(false);
    }
    if !a.dtype().is_numeric() {
        bail!(TensorError::NonNumericComponent(a.dtype()));
    }
    with_component!(a.dtype(), T => { equals_typed::<T>(a, b) })
}

fn equals_typed<T: Component>(a: &Tensor, b: &Tensor) -> Result<bool> {
    let left = a.entries::<T>()?;
    let right = b.entries::<T>()?;
    let mut lhs = left.iter().filter(|(_, value)| !value.is_zero());
    let mut rhs = right.iter().filter(|(_, value)| !value.is_zero());
    loop {
        match (lhs.next(), rhs.next()) {
            (None, None) => return Ok(true),
            (Some(_), None) | (None, Some(_)) => return Ok(false),
            (Some((lc, lv)), Some((rc, rv))) => {
                if lc != rc || !T::approx_eq(*lv, *rv, RELATIVE_TOLERANCE) {
                    return Ok(false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensalg_core::{Datatype, Format};

    fn packed(name: &str, coords: &[(&[usize; 2], f64)]) -> Tensor {
        let mut tensor = Tensor::new(name, Datatype::Float64, &[3, 3], Format::csr()).unwrap();
        for (coord, value) in coords {
            tensor.insert(*coord, *value).unwrap();
        }
        tensor.pack().unwrap();
        tensor
    }

    #[test]
    fn test_equal_tensors() {
        let a = packed("a", &[(&[0, 1], 1.0), (&[2, 2], 3.0)]);
        let b = packed("b", &[(&[2, 2], 3.0), (&[0, 1], 1.0)]);
        assert!(equals(&a, &b).unwrap());
    }

    #[test]
    fn test_explicit_zeros_are_skipped() {
        let a = packed("a", &[(&[0, 1], 1.0), (&[1, 1], 0.0)]);
        let b = packed("b", &[(&[0, 1], 1.0)]);
        assert!(equals(&a, &b).unwrap());
    }

    #[test]
    fn test_within_tolerance() {
        let a = packed("a", &[(&[0, 1], 1.0)]);
        let b = packed("b", &[(&[0, 1], 1.0 + 5e-7)]);
        let c = packed("c", &[(&[0, 1], 1.01)]);
        assert!(equals(&a, &b).unwrap());
        assert!(!equals(&a, &c).unwrap());
    }

    #[test]
    fn test_shape_and_type_mismatch() {
        let a = packed("a", &[(&[0, 1], 1.0)]);
        let mut b = Tensor::new("b", Datatype::Float64, &[2, 3], Format::csr()).unwrap();
        b.insert(&[0, 1], 1.0).unwrap();
        assert!(!equals(&a, &b).unwrap());

        let c = Tensor::new("c", Datatype::Float32, &[3, 3], Format::csr()).unwrap();
        assert!(!equals(&a, &c).unwrap());
    }

    #[test]
    fn test_value_mismatch() {
        let a = packed("a", &[(&[0, 1], 1.0)]);
        let b = packed("b", &[(&[0, 2], 1.0)]);
        assert!(!equals(&a, &b).unwrap());
    }

    #[test]
    fn test_non_numeric_components_are_rejected() {
        let a = Tensor::new("a", Datatype::Bool, &[2], Format::sparse_vector()).unwrap();
        let b = Tensor::new("b", Datatype::Bool, &[2], Format::sparse_vector()).unwrap();
        let err = equals(&a, &b).unwrap_err();
        assert!(err
            .to_string()
            .contains("does not support value operations"));
    }
}
