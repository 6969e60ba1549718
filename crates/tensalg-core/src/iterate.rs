//! Storage-order iteration over packed tensors.
//!
//! [`ValueIter`] walks the index tree with an explicit per-level cursor
//! stack: dense levels emit `0..extent` with child base `parent * extent`,
//! sparse levels iterate `pos[k]..pos[k+1]` reading `crd`. Coordinates are
//! emitted in logical mode order by permuting the storage-order cursor
//! coordinates through the format's mode ordering.

use smallvec::SmallVec;

use crate::datatype::Component;
use crate::error::TensorResult;
use crate::format::ModeFormat;
use crate::storage::Storage;
use crate::types::Shape;

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    /// Stored position at this level.
    ptr: usize,
    /// Exclusive end of the current fiber.
    end: usize,
    /// First position of the current fiber (dense levels).
    base: usize,
    /// Coordinate at the current position.
    coord: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Fresh,
    Running,
    Done,
}

/// Iterator over the `(logical coordinate, value)` pairs of a packed
/// tensor, in storage order.
pub struct ValueIter<'a, T: Component> {
    storage: &'a Storage,
    mode_formats: Vec<ModeFormat>,
    ordering: Vec<usize>,
    values: &'a [T],
    cursors: Vec<Cursor>,
    state: State,
}

impl<'a, T: Component> ValueIter<'a, T> {
    /// Builds an iterator over `storage`. Fails if `T` does not match the
    /// stored component type.
    pub fn new(storage: &'a Storage) -> TensorResult<ValueIter<'a, T>> {
        let format = storage.format();
        let mode_formats = format.mode_formats();
        let ordering = format.mode_ordering().to_vec();
        let values = storage.values().as_slice::<T>()?;
        let cursors = vec![Cursor::default(); mode_formats.len()];
        Ok(ValueIter {
            storage,
            mode_formats,
            ordering,
            values,
            cursors,
            state: State::Fresh,
        })
    }

    /// Positions the cursor at `level` on the first entry of its fiber.
    /// Returns false if the fiber is empty or unassembled.
    fn enter(&mut self, level: usize) -> bool {
        let parent = if level == 0 {
            0
        } else {
            self.cursors[level - 1].ptr
        };
        let mode_index = self.storage.index().mode_index(level);
        match self.mode_formats[level] {
            ModeFormat::Dense(_) => {
                if mode_index.num_arrays() == 0 {
                    return false;
                }
                let extent = mode_index.array(0).get_int(0) as usize;
                if extent == 0 {
                    return false;
                }
                let base = parent * extent;
                self.cursors[level] = Cursor {
                    ptr: base,
                    end: base + extent,
                    base,
                    coord: 0,
                };
                true
            }
            ModeFormat::Sparse => {
                if mode_index.num_arrays() < 2 {
                    return false;
                }
                let pos = mode_index.array(0);
                if pos.len() < parent + 2 {
                    return false;
                }
                let start = pos.get_int(parent) as usize;
                let end = pos.get_int(parent + 1) as usize;
                if start >= end {
                    return false;
                }
                let coord = mode_index.array(1).get_int(start) as usize;
                self.cursors[level] = Cursor {
                    ptr: start,
                    end,
                    base: 0,
                    coord,
                };
                true
            }
        }
    }

    /// Advances the cursor at `level` within its fiber.
    fn step(&mut self, level: usize) -> bool {
        match self.mode_formats[level] {
            ModeFormat::Dense(_) => {
                let cursor = &mut self.cursors[level];
                cursor.ptr += 1;
                if cursor.ptr >= cursor.end {
                    return false;
                }
                cursor.coord = cursor.ptr - cursor.base;
                true
            }
            ModeFormat::Sparse => {
                let next = self.cursors[level].ptr + 1;
                if next >= self.cursors[level].end {
                    return false;
                }
                let coord = self
                    .storage
                    .index()
                    .mode_index(level)
                    .array(1)
                    .get_int(next) as usize;
                let cursor = &mut self.cursors[level];
                cursor.ptr = next;
                cursor.coord = coord;
                true
            }
        }
    }

    /// Descends from `start` to the leaf level, advancing ancestors past
    /// empty fibers. Returns false when the walk is exhausted.
    fn seek(&mut self, start: usize) -> bool {
        let order = self.mode_formats.len();
        let mut level = start;
        loop {
            if level == order {
                return true;
            }
            if self.enter(level) {
                level += 1;
                continue;
            }
            loop {
                if level == 0 {
                    return false;
                }
                level -= 1;
                if self.step(level) {
                    level += 1;
                    break;
                }
            }
        }
    }

    /// Moves to the next leaf position.
    fn advance(&mut self) -> bool {
        let mut level = self.mode_formats.len();
        loop {
            if level == 0 {
                return false;
            }
            level -= 1;
            if self.step(level) {
                return self.seek(level + 1);
            }
        }
    }

    fn emit(&self) -> (Shape, T) {
        let order = self.mode_formats.len();
        let mut coord: Shape = SmallVec::from_elem(0, order);
        for level in 0..order {
            coord[self.ordering[level]] = self.cursors[level].coord;
        }
        let slot = if order == 0 {
            0
        } else {
            self.cursors[order - 1].ptr
        };
        (coord, self.values[slot])
    }
}

impl<T: Component> Iterator for ValueIter<'_, T> {
    type Item = (Shape, T);

    fn next(&mut self) -> Option<Self::Item> {
        let order = self.mode_formats.len();
        match self.state {
            State::Done => return None,
            State::Fresh => {
                self.state = State::Running;
                if order == 0 {
                    self.state = State::Done;
                    if self.values.is_empty() {
                        return None;
                    }
                    return Some((Shape::new(), self.values[0]));
                }
                if !self.seek(0) {
                    self.state = State::Done;
                    return None;
                }
            }
            State::Running => {
                if !self.advance() {
                    self.state = State::Done;
                    return None;
                }
            }
        }
        Some(self.emit())
    }
}

/// Collects every `(logical coordinate, value)` pair of a packed tensor in
/// storage order.
pub fn entries<T: Component>(storage: &Storage) -> TensorResult<Vec<(Shape, T)>> {
    Ok(ValueIter::<T>::new(storage)?.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::pack::pack_entries;
    use crate::types::Shape;
    use crate::Datatype;
    use smallvec::SmallVec;

    fn packed_storage(
        dims: &[usize],
        format: Format,
        coords: &[(&[usize], f64)],
    ) -> Storage {
        let entries: Vec<(Shape, f64)> = coords
            .iter()
            .map(|(c, v)| (SmallVec::from_slice(c), *v))
            .collect();
        let packed = pack_entries(dims, &format, entries).unwrap();
        let mut storage = Storage::new(Datatype::Float64, dims, format);
        storage.set_index(packed.index);
        storage.set_values(packed.values);
        storage
    }

    fn collect(storage: &Storage) -> Vec<(Vec<usize>, f64)> {
        entries::<f64>(storage)
            .unwrap()
            .into_iter()
            .map(|(c, v)| (c.to_vec(), v))
            .collect()
    }

    #[test]
    fn test_iterate_csr() {
        let storage = packed_storage(
            &[2, 4],
            Format::csr(),
            &[(&[1, 3], 2.0), (&[0, 1], 1.0), (&[1, 0], 3.0)],
        );
        assert_eq!(
            collect(&storage),
            vec![
                (vec![0, 1], 1.0),
                (vec![1, 0], 3.0),
                (vec![1, 3], 2.0),
            ]
        );
    }

    #[test]
    fn test_iterate_csc_emits_logical_coords() {
        // storage order is by column, coordinates stay (row, col)
        let storage = packed_storage(
            &[3, 2],
            Format::csc(),
            &[(&[0, 1], 1.0), (&[2, 0], 2.0), (&[1, 1], 3.0)],
        );
        assert_eq!(
            collect(&storage),
            vec![
                (vec![2, 0], 2.0),
                (vec![0, 1], 1.0),
                (vec![1, 1], 3.0),
            ]
        );
    }

    #[test]
    fn test_iterate_dense_skips_nothing() {
        let storage = packed_storage(&[2, 2], Format::dense(2), &[(&[1, 0], 5.0)]);
        let all = collect(&storage);
        assert_eq!(all.len(), 4);
        assert_eq!(all[2], (vec![1, 0], 5.0));
        assert_eq!(all[0], (vec![0, 0], 0.0));
    }

    #[test]
    fn test_iterate_empty_sparse() {
        let storage = packed_storage(&[3, 3], Format::csf(2), &[]);
        assert!(collect(&storage).is_empty());
    }

    #[test]
    fn test_iterate_unpacked_storage() {
        let storage = Storage::new(Datatype::Float64, &[3, 3], Format::csr());
        assert!(collect(&storage).is_empty());
    }

    #[test]
    fn test_iterate_scalar() {
        let storage = packed_storage(&[], Format::scalar(), &[(&[], 6.5)]);
        assert_eq!(collect(&storage), vec![(vec![], 6.5)]);
    }

    #[test]
    fn test_iterate_csr_with_empty_middle_row() {
        let storage = packed_storage(
            &[3, 2],
            Format::csr(),
            &[(&[0, 0], 1.0), (&[2, 1], 2.0)],
        );
        assert_eq!(
            collect(&storage),
            vec![(vec![0, 0], 1.0), (vec![2, 1], 2.0)]
        );
    }

    #[test]
    fn test_iterate_type_checked() {
        let storage = packed_storage(&[2, 2], Format::csr(), &[(&[0, 0], 1.0)]);
        assert!(ValueIter::<f32>::new(&storage).is_err());
    }
}
