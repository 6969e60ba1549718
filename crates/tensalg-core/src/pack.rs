//! Packing: from unordered coordinate/value records to format storage.
//!
//! The packer turns a stream of staged records into the index and values
//! arrays a [`Format`] mandates:
//!
//! 1. Permute each coordinate into storage order.
//! 2. Stable lexicographic sort on the permuted tuples.
//! 3. Deduplicate adjacent records; the last inserted value wins.
//! 4. Walk the levels in storage order, maintaining the range of records
//!    under each parent position: dense levels fan every parent out by
//!    their extent and contribute only an extent array, sparse levels emit
//!    `pos`/`crd` runs per parent.
//! 5. Emit the index and a values array with one slot per leaf position.
//!
//! # Complexity
//!
//! O(n log n) for the sort plus O(slots) for the level walk, where `slots`
//! includes the fan-out of dense levels.

use tracing::{debug, warn};

use crate::array::Array;
use crate::coordinate::CoordinateBuffer;
use crate::datatype::Component;
use crate::error::{FormatError, TensorResult};
use crate::format::{Format, ModeFormat};
use crate::index::{Index, ModeIndex};
use crate::types::Shape;
use crate::with_component;

/// The output of a pack: the index tree, the values array, and the number
/// of records dropped by deduplication.
#[derive(Debug)]
pub struct PackResult {
    pub index: Index,
    pub values: Array,
    pub duplicates_dropped: usize,
}

/// Packs a staging buffer. Dispatches on the buffer's component type and
/// forwards to [`pack_entries`].
pub fn pack_buffer(
    dims: &[usize],
    format: &Format,
    buffer: &CoordinateBuffer,
) -> TensorResult<PackResult> {
    with_component!(buffer.dtype(), T => {
        let entries = buffer.records::<T>()?;
        pack_entries::<T>(dims, format, entries)
    })
}

/// Packs typed `(logical coordinate, value)` entries into the arrays the
/// format mandates. Entries must be given in insertion order so the
/// last-write-wins duplicate policy is meaningful.
pub fn pack_entries<T: Component>(
    dims: &[usize],
    format: &Format,
    mut entries: Vec<(Shape, T)>,
) -> TensorResult<PackResult> {
    if format.order() != dims.len() {
        return Err(FormatError::OrderMismatch {
            format_order: format.order(),
            dims: dims.len(),
        }
        .into());
    }
    let order = format.order();

    // Scalars have no index tree; the single slot takes the last record.
    if order == 0 {
        let duplicates_dropped = entries.len().saturating_sub(1);
        let value = entries.pop().map(|(_, v)| v).unwrap_or_else(T::zero);
        return Ok(PackResult {
            index: Index::new(format.clone(), Vec::new()),
            values: Array::from_vec(vec![value]),
            duplicates_dropped,
        });
    }

    let ordering = format.mode_ordering();
    let permuted_dims: Vec<usize> = ordering.iter().map(|&mode| dims[mode]).collect();

    for (coord, _) in &mut entries {
        let permuted: Shape = ordering.iter().map(|&mode| coord[mode]).collect();
        *coord = permuted;
    }

    // Stable sort keeps insertion order among equal coordinates, so the
    // last record of a run is the last write.
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let staged = entries.len();
    let mut unique: Vec<(Shape, T)> = Vec::with_capacity(entries.len());
    for entry in entries {
        match unique.last_mut() {
            Some(last) if last.0 == entry.0 => *last = entry,
            _ => unique.push(entry),
        }
    }
    let duplicates_dropped = staged - unique.len();
    if duplicates_dropped > 0 {
        warn!(
            dropped = duplicates_dropped,
            "duplicate coordinates ignored while packing"
        );
    }

    let mode_formats = format.mode_formats();
    let level_types = format.level_array_types();

    // Ranges of `unique` under each position of the current level.
    let mut buckets: Vec<(usize, usize)> = vec![(0, unique.len())];
    let mut mode_indices: Vec<ModeIndex> = Vec::with_capacity(order);

    for level in 0..order {
        match mode_formats[level] {
            ModeFormat::Dense(_) => {
                let extent = permuted_dims[level];
                let extent_array = Array::from_i64s(level_types[level][0], &[extent as i64])?;
                mode_indices.push(ModeIndex::new(vec![extent_array]));

                let mut next = Vec::with_capacity(buckets.len() * extent);
                for &(start, end) in &buckets {
                    let mut at = start;
                    for coord in 0..extent {
                        let begin = at;
                        while at < end && unique[at].0[level] == coord {
                            at += 1;
                        }
                        next.push((begin, at));
                    }
                }
                buckets = next;
            }
            ModeFormat::Sparse => {
                let mut pos: Vec<i64> = Vec::with_capacity(buckets.len() + 1);
                let mut crd: Vec<i64> = Vec::new();
                let mut next = Vec::new();
                pos.push(0);
                for &(start, end) in &buckets {
                    let mut at = start;
                    while at < end {
                        let coord = unique[at].0[level];
                        let begin = at;
                        while at < end && unique[at].0[level] == coord {
                            at += 1;
                        }
                        crd.push(coord as i64);
                        next.push((begin, at));
                    }
                    pos.push(crd.len() as i64);
                }
                mode_indices.push(ModeIndex::new(vec![
                    Array::from_i64s(level_types[level][0], &pos)?,
                    Array::from_i64s(level_types[level][1], &crd)?,
                ]));
                buckets = next;
            }
        }
    }

    let mut values = Array::zeroed(T::DTYPE, buckets.len());
    {
        let slots = values.as_mut_slice::<T>()?;
        for (slot, &(start, end)) in buckets.iter().enumerate() {
            debug_assert!(end - start <= 1, "leaf bucket holds at most one record");
            if start < end {
                slots[slot] = unique[start].1;
            }
        }
    }

    let index = Index::new(format.clone(), mode_indices);
    debug_assert_eq!(index.size(), values.len());
    debug!(
        records = staged,
        stored = values.len(),
        "packed coordinate records"
    );

    Ok(PackResult {
        index,
        values,
        duplicates_dropped,
    })
}
