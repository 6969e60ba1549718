//! Append-only coordinate staging.
//!
//! Inserted `(coordinate, value)` pairs are staged in a packed byte buffer
//! until the tensor is packed. Each record is `order` 32-bit coordinates
//! followed by one component, `order * 4 + csize` bytes in total.

use smallvec::SmallVec;

use crate::datatype::{Component, Datatype};
use crate::error::{TensorError, TensorResult};
use crate::types::Shape;

/// Type-erased staging buffer for insertions prior to pack.
#[derive(Debug, Clone)]
pub struct CoordinateBuffer {
    order: usize,
    dtype: Datatype,
    data: Vec<u8>,
}

impl CoordinateBuffer {
    /// An empty buffer for records of the given arity and component type.
    pub fn new(order: usize, dtype: Datatype) -> CoordinateBuffer {
        CoordinateBuffer {
            order,
            dtype,
            data: Vec::new(),
        }
    }

    /// Bytes per staged record.
    #[inline]
    pub fn record_size(&self) -> usize {
        self.order * std::mem::size_of::<i32>() + self.dtype.num_bytes()
    }

    /// The record arity.
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// The staged component type.
    #[inline]
    pub fn dtype(&self) -> Datatype {
        self.dtype
    }

    /// Number of staged records.
    pub fn len(&self) -> usize {
        self.data.len() / self.record_size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grows capacity by `additional` records.
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional * self.record_size());
    }

    /// Stages one record. The value type must match the buffer's component
    /// type; the coordinate arity is the caller's responsibility.
    pub fn push<T: Component>(&mut self, coord: &[usize], value: T) -> TensorResult<()> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::TypeMismatch {
                expected: self.dtype,
                got: T::DTYPE,
            });
        }
        debug_assert_eq!(coord.len(), self.order);
        for &c in coord {
            self.data.extend_from_slice(&(c as i32).to_ne_bytes());
        }
        self.data.extend_from_slice(bytemuck::bytes_of(&value));
        Ok(())
    }

    /// Discards all staged records, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Decodes the staged records as typed entries, in insertion order.
    pub fn records<T: Component>(&self) -> TensorResult<Vec<(Shape, T)>> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::TypeMismatch {
                expected: self.dtype,
                got: T::DTYPE,
            });
        }
        let record_size = self.record_size();
        let coord_bytes = self.order * std::mem::size_of::<i32>();
        let mut entries = Vec::with_capacity(self.len());
        for record in self.data.chunks_exact(record_size) {
            let mut coord: Shape = SmallVec::with_capacity(self.order);
            for c in record[..coord_bytes].chunks_exact(std::mem::size_of::<i32>()) {
                coord.push(bytemuck::pod_read_unaligned::<i32>(c) as usize);
            }
            let value: T = bytemuck::pod_read_unaligned(&record[coord_bytes..]);
            entries.push((coord, value));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_record_layout() {
        let buffer = CoordinateBuffer::new(3, Datatype::Float64);
        assert_eq!(buffer.record_size(), 3 * 4 + 8);
    }

    #[test]
    fn test_push_and_decode() {
        let mut buffer = CoordinateBuffer::new(2, Datatype::Float64);
        buffer.push(&[0, 1], 2.5f64).unwrap();
        buffer.push(&[1, 2], 3.5f64).unwrap();
        assert_eq!(buffer.len(), 2);

        let records = buffer.records::<f64>().unwrap();
        let expected: Shape = smallvec![0, 1];
        assert_eq!(records[0], (expected, 2.5));
        assert_eq!(records[1].1, 3.5);
    }

    #[test]
    fn test_type_check() {
        let mut buffer = CoordinateBuffer::new(1, Datatype::Float64);
        assert!(buffer.push(&[0], 1.0f32).is_err());
        assert!(buffer.push(&[0], 1.0f64).is_ok());
        assert!(buffer.records::<i32>().is_err());
    }

    #[test]
    fn test_clear() {
        let mut buffer = CoordinateBuffer::new(1, Datatype::Float32);
        buffer.push(&[4], 1.0f32).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_scalar_records() {
        let mut buffer = CoordinateBuffer::new(0, Datatype::Float64);
        buffer.push(&[], 6.0f64).unwrap();
        assert_eq!(buffer.record_size(), 8);
        let records = buffer.records::<f64>().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].0.is_empty());
    }
}
