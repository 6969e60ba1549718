//! Property-based tests for the packer and the storage-order iterator.
//!
//! Random coordinate sets over random Dense/Sparse format mixes and mode
//! orderings; checks the structural invariants of the emitted arrays.

use proptest::prelude::*;
use smallvec::SmallVec;

use crate::format::{Format, ModeFormat};
use crate::iterate::entries;
use crate::pack::pack_entries;
use crate::storage::Storage;
use crate::types::Shape;
use crate::Datatype;

fn decompose(mut flat: usize, dims: &[usize]) -> Vec<usize> {
    let mut coord = vec![0; dims.len()];
    for (mode, &dim) in dims.iter().enumerate().rev() {
        coord[mode] = flat % dim;
        flat /= dim;
    }
    coord
}

fn case_strategy() -> impl Strategy<Value = (Vec<usize>, Format, Vec<(Vec<usize>, f64)>)> {
    (1usize..=3)
        .prop_flat_map(|order| {
            (
                prop::collection::vec(1usize..5, order),
                prop::collection::vec(any::<bool>(), order),
                Just((0..order).collect::<Vec<usize>>()).prop_shuffle(),
            )
        })
        .prop_flat_map(|(dims, sparse, ordering)| {
            let modes: Vec<ModeFormat> = sparse
                .iter()
                .map(|&s| {
                    if s {
                        ModeFormat::sparse()
                    } else {
                        ModeFormat::dense()
                    }
                })
                .collect();
            let format = Format::with_ordering(modes, ordering).unwrap();
            let total: usize = dims.iter().product();
            let record_dims = dims.clone();
            let records = prop::collection::vec((0..total, -10.0..10.0f64), 0..24).prop_map(
                move |flat| {
                    flat.into_iter()
                        .map(|(at, value)| (decompose(at, &record_dims), value))
                        .collect::<Vec<(Vec<usize>, f64)>>()
                },
            );
            (Just(dims), Just(format), records)
        })
}

fn to_entries(coords: &[(Vec<usize>, f64)]) -> Vec<(Shape, f64)> {
    coords
        .iter()
        .map(|(c, v)| (SmallVec::from_slice(c), *v))
        .collect()
}

/// Walks the packed index and checks the sparse-level invariants: `pos`
/// starts at zero and is monotone, and every parent's `crd` run is
/// strictly increasing.
fn assert_index_invariants(dims: &[usize], format: &Format, index: &crate::Index) {
    let ordering = format.mode_ordering();
    let mut parents = 1usize;
    for (level, mode) in format.mode_formats().iter().enumerate() {
        match mode {
            ModeFormat::Dense(_) => {
                let extent = index.mode_index(level).array(0).get_int(0) as usize;
                assert_eq!(extent, dims[ordering[level]]);
                parents *= extent;
            }
            ModeFormat::Sparse => {
                let pos = index.mode_index(level).array(0);
                let crd = index.mode_index(level).array(1);
                assert_eq!(pos.len(), parents + 1);
                assert_eq!(pos.get_int(0), 0);
                for k in 0..parents {
                    let start = pos.get_int(k);
                    let end = pos.get_int(k + 1);
                    assert!(start <= end);
                    for at in start..end.saturating_sub(1) {
                        assert!(crd.get_int(at as usize) < crd.get_int(at as usize + 1));
                    }
                }
                parents = pos.get_int(parents) as usize;
            }
        }
    }
}

mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_pack_structural_invariants(
            (dims, format, coords) in case_strategy()
        ) {
            let packed = pack_entries(&dims, &format, to_entries(&coords)).unwrap();
            assert_index_invariants(&dims, &format, &packed.index);
            prop_assert_eq!(packed.index.size(), packed.values.len());
        }

        #[test]
        fn prop_dedup_counts(
            (dims, format, coords) in case_strategy()
        ) {
            let packed = pack_entries(&dims, &format, to_entries(&coords)).unwrap();
            let mut unique: Vec<Vec<usize>> =
                coords.iter().map(|(c, _)| c.clone()).collect();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(
                coords.len() - unique.len(),
                packed.duplicates_dropped
            );
        }

        #[test]
        fn prop_iterate_covers_all_slots(
            (dims, format, coords) in case_strategy()
        ) {
            let packed = pack_entries(&dims, &format, to_entries(&coords)).unwrap();
            let slots = packed.index.size();
            let mut storage = Storage::new(Datatype::Float64, &dims, format);
            storage.set_index(packed.index);
            storage.set_values(packed.values);
            let walked = entries::<f64>(&storage).unwrap();
            prop_assert_eq!(walked.len(), slots);
            for (coord, _) in &walked {
                for (c, d) in coord.iter().zip(dims.iter()) {
                    prop_assert!(c < d);
                }
            }
        }

        #[test]
        fn prop_pack_iterate_pack_fixpoint(
            (dims, format, coords) in case_strategy()
        ) {
            let first = pack_entries(&dims, &format, to_entries(&coords)).unwrap();
            let mut storage = Storage::new(Datatype::Float64, &dims, format.clone());
            storage.set_index(first.index);
            storage.set_values(first.values);

            let walked = entries::<f64>(&storage).unwrap();
            let second = pack_entries(&dims, &format, walked).unwrap();

            prop_assert_eq!(second.duplicates_dropped, 0);
            prop_assert_eq!(
                storage.values().as_bytes(),
                second.values.as_bytes()
            );
            for level in 0..format.order() {
                let before = storage.index().mode_index(level);
                let after = second.index.mode_index(level);
                prop_assert_eq!(before.num_arrays(), after.num_arrays());
                for i in 0..before.num_arrays() {
                    prop_assert_eq!(
                        before.array(i).as_bytes(),
                        after.array(i).as_bytes()
                    );
                }
            }
        }

        #[test]
        fn prop_last_write_wins(
            coord in prop::collection::vec(0usize..3, 2),
            first in -10.0..10.0f64,
            second in -10.0..10.0f64,
        ) {
            let format = Format::csf(2);
            let records = vec![
                (SmallVec::from_slice(&coord), first),
                (SmallVec::from_slice(&coord), second),
            ];
            let packed = pack_entries(&[3, 3], &format, records).unwrap();
            prop_assert_eq!(packed.values.len(), 1);
            prop_assert_eq!(packed.values.as_slice::<f64>().unwrap()[0], second);
        }
    }
}
