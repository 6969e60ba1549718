//! End-to-end scenarios: index-notation assignments compiled and executed
//! over compressed storage.

use tensalg::prelude::*;
use tensalg::{Complex, ModeFormatPack};

fn csf_ordered(order: usize, ordering: Vec<usize>) -> Format {
    Format::with_ordering(vec![ModeFormat::sparse(); order], ordering).unwrap()
}

#[test]
fn test_tensor_times_vector() {
    // A(i,j) = B(i,j,k) * c(k)
    let mut b = Tensor::new("B", Datatype::Float64, &[2, 4, 4], Format::csf(3)).unwrap();
    b.insert(&[0, 0, 0], 1.0).unwrap();
    b.insert(&[1, 2, 0], 2.0).unwrap();
    b.insert(&[1, 3, 1], 3.0).unwrap();
    b.pack().unwrap();

    let mut c = Tensor::new("c", Datatype::Float64, &[4], Format::sparse_vector()).unwrap();
    c.insert(&[0], 4.0).unwrap();
    c.insert(&[1], 5.0).unwrap();
    c.pack().unwrap();

    let mut a = Tensor::new("A", Datatype::Float64, &[2, 4], Format::csr()).unwrap();
    let (i, j, k) = (
        IndexVar::named("i"),
        IndexVar::named("j"),
        IndexVar::named("k"),
    );
    let rhs = b.access(&[i.clone(), j.clone(), k.clone()]).unwrap() * c.access(&[k]).unwrap();
    a.assign(&[i, j], rhs).unwrap();

    a.compile(false).unwrap();
    a.assemble().unwrap();
    a.compute().unwrap();

    assert_eq!(a.get_value::<f64>(&[0, 0]).unwrap(), 4.0);
    assert_eq!(a.get_value::<f64>(&[1, 2]).unwrap(), 8.0);
    assert_eq!(a.get_value::<f64>(&[1, 3]).unwrap(), 15.0);
    assert_eq!(a.get_value::<f64>(&[0, 1]).unwrap(), 0.0);
    assert_eq!(a.get_value::<f64>(&[1, 0]).unwrap(), 0.0);

    let nonzeros: Vec<_> = a
        .entries::<f64>()
        .unwrap()
        .into_iter()
        .filter(|(_, v)| *v != 0.0)
        .collect();
    assert_eq!(nonzeros.len(), 3);
}

#[test]
fn test_tensor_times_vector_with_permuted_operand() {
    // the original walkthrough: B packed mode-2-first, accessed B(i,k,j)
    let mut b = Tensor::new(
        "B",
        Datatype::Float64,
        &[2, 3, 3],
        csf_ordered(3, vec![2, 0, 1]),
    )
    .unwrap();
    b.insert(&[0, 0, 0], 1.0).unwrap();
    b.insert(&[1, 2, 0], 2.0).unwrap();
    b.insert(&[1, 2, 1], 3.0).unwrap();
    b.pack().unwrap();

    let mut c = Tensor::new("c", Datatype::Float64, &[3], Format::sparse_vector()).unwrap();
    c.insert(&[0], 4.0).unwrap();
    c.insert(&[2], 6.0).unwrap();
    c.pack().unwrap();

    let mut a = Tensor::new(
        "A",
        Datatype::Float64,
        &[2, 3],
        Format::with_ordering(
            vec![ModeFormat::dense(), ModeFormat::sparse()],
            vec![1, 0],
        )
        .unwrap(),
    )
    .unwrap();
    let (i, j, k) = (
        IndexVar::named("i"),
        IndexVar::named("j"),
        IndexVar::named("k"),
    );
    let rhs = b.access(&[i.clone(), k.clone(), j.clone()]).unwrap() * c.access(&[k]).unwrap();
    a.assign(&[i, j], rhs).unwrap();
    a.evaluate().unwrap();

    // A(i,j) = sum_k B(i,k,j) * c(k)
    assert_eq!(a.get_value::<f64>(&[0, 0]).unwrap(), 4.0);
    assert_eq!(a.get_value::<f64>(&[1, 0]).unwrap(), 12.0);
    assert_eq!(a.get_value::<f64>(&[1, 1]).unwrap(), 18.0);
}

#[test]
fn test_scalar_assignment() {
    // s = t0 + t1
    let t0 = tensalg::Tensor::from_value("t0", 3.5f64).unwrap();
    let t1 = tensalg::Tensor::from_value("t1", 2.5f64).unwrap();
    let mut s = Tensor::new("s", Datatype::Float64, &[], Format::scalar()).unwrap();
    s.assign(&[], t0.access(&[]).unwrap() + t1.access(&[]).unwrap())
        .unwrap();
    assert_eq!(s.get_value::<f64>(&[]).unwrap(), 6.0);
}

#[test]
fn test_copy_through_assignment() {
    // X(p,q) = Z(p,q) with both stored dense-over-sparse, column-major
    let format = Format::with_ordering(
        vec![ModeFormat::dense(), ModeFormat::sparse()],
        vec![1, 0],
    )
    .unwrap();
    let mut z = Tensor::new("Z", Datatype::Float64, &[3, 2], format.clone()).unwrap();
    z.insert(&[0, 0], 1.0).unwrap();
    z.insert(&[0, 1], 2.0).unwrap();
    z.insert(&[1, 0], 3.0).unwrap();
    z.insert(&[1, 1], 4.0).unwrap();
    z.insert(&[2, 1], 5.0).unwrap();
    z.pack().unwrap();

    let mut x = Tensor::new("X", Datatype::Float64, &[3, 2], format).unwrap();
    let (p, q) = (IndexVar::named("p"), IndexVar::named("q"));
    x.assign(&[p.clone(), q.clone()], z.access(&[p, q]).unwrap())
        .unwrap();

    // iterating X yields the five nonzeros in storage order (by column)
    assert_eq!(
        x.entries::<f64>().unwrap(),
        vec![
            (vec![0, 0], 1.0),
            (vec![1, 0], 3.0),
            (vec![0, 1], 2.0),
            (vec![1, 1], 4.0),
            (vec![2, 1], 5.0),
        ]
    );
    assert!(equals(&x, &z).unwrap());
}

#[test]
fn test_transpose_rewrite_on_mismatched_orderings() {
    // a(i,j) = B(j,i): with both stored row-major the iteration order
    // forces B's access onto a repacked copy
    let mut b = Tensor::new("B", Datatype::Float64, &[3, 2], Format::csr()).unwrap();
    b.insert(&[0, 0], 1.0).unwrap();
    b.insert(&[1, 1], 2.0).unwrap();
    b.insert(&[2, 0], 3.0).unwrap();
    b.pack().unwrap();

    let mut a = Tensor::new("a", Datatype::Float64, &[2, 3], Format::csr()).unwrap();
    let (i, j) = (IndexVar::named("i"), IndexVar::named("j"));
    a.assign(&[i.clone(), j.clone()], b.access(&[j, i]).unwrap())
        .unwrap();
    a.evaluate().unwrap();

    // a is the element-wise transpose of B
    assert_eq!(a.get_value::<f64>(&[0, 0]).unwrap(), 1.0);
    assert_eq!(a.get_value::<f64>(&[1, 1]).unwrap(), 2.0);
    assert_eq!(a.get_value::<f64>(&[0, 2]).unwrap(), 3.0);
    assert_eq!(a.get_value::<f64>(&[1, 0]).unwrap(), 0.0);

    let transposed = b.transpose(&[1, 0]).unwrap();
    assert!(equals(&a, &transposed).unwrap());
}

#[test]
fn test_dependent_freshness() {
    // A(i,j) = B(i,j) + 1; mutating B is reflected on the next read of A
    let mut b = Tensor::new("B", Datatype::Float64, &[2, 2], Format::csr()).unwrap();
    b.insert(&[0, 0], 1.0).unwrap();
    b.pack().unwrap();

    let mut a = Tensor::new("A", Datatype::Float64, &[2, 2], Format::csr()).unwrap();
    let (i, j) = (IndexVar::named("i"), IndexVar::named("j"));
    a.assign(
        &[i.clone(), j.clone()],
        b.access(&[i, j]).unwrap() + 1.0,
    )
    .unwrap();

    assert_eq!(a.get_value::<f64>(&[0, 0]).unwrap(), 2.0);
    assert_eq!(a.get_value::<f64>(&[1, 1]).unwrap(), 1.0);

    // the new coordinate must show up on the next read, with no fresh
    // assignment in between; packing the insert replaces B's contents
    b.insert(&[1, 1], 5.0).unwrap();
    assert_eq!(a.get_value::<f64>(&[1, 1]).unwrap(), 6.0);
    assert_eq!(b.entries::<f64>().unwrap(), vec![(vec![1, 1], 5.0)]);
    assert_eq!(a.get_value::<f64>(&[0, 0]).unwrap(), 1.0);

    // and again after another round of mutation
    b.insert(&[0, 1], 7.0).unwrap();
    assert_eq!(a.get_value::<f64>(&[0, 1]).unwrap(), 8.0);
    assert_eq!(a.get_value::<f64>(&[1, 1]).unwrap(), 1.0);
}

#[test]
fn test_duplicate_insertions_last_write_wins() {
    let mut a = Tensor::new("A", Datatype::Float64, &[3, 3], Format::csr()).unwrap();
    a.insert(&[1, 2], 3.0).unwrap();
    a.insert(&[1, 2], 5.0).unwrap();
    a.pack().unwrap();

    assert_eq!(a.get_value::<f64>(&[1, 2]).unwrap(), 5.0);
    assert_eq!(a.entries::<f64>().unwrap().len(), 1);
}

#[test]
fn test_matrix_vector_product_csc() {
    // y(i) = M(i,j) * x(j) with M stored by columns
    let mut m = Tensor::new("M", Datatype::Float64, &[2, 3], Format::csc()).unwrap();
    m.insert(&[0, 0], 1.0).unwrap();
    m.insert(&[0, 2], 2.0).unwrap();
    m.insert(&[1, 1], 3.0).unwrap();
    m.pack().unwrap();

    let mut x = Tensor::new("x", Datatype::Float64, &[3], Format::sparse_vector()).unwrap();
    x.insert(&[0], 1.0).unwrap();
    x.insert(&[1], 2.0).unwrap();
    x.insert(&[2], 3.0).unwrap();
    x.pack().unwrap();

    let mut y = Tensor::new("y", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
    let (i, j) = (IndexVar::named("i"), IndexVar::named("j"));
    y.assign(
        &[i.clone()],
        m.access(&[i, j.clone()]).unwrap() * x.access(&[j]).unwrap(),
    )
    .unwrap();

    assert_eq!(y.get_value::<f64>(&[0]).unwrap(), 7.0);
    assert_eq!(y.get_value::<f64>(&[1]).unwrap(), 6.0);
}

#[test]
fn test_sub_div_neg_sqrt() {
    let mut b = Tensor::new("b", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
    b.insert(&[0], 9.0).unwrap();
    b.insert(&[1], 16.0).unwrap();
    b.pack().unwrap();

    let mut c = Tensor::new("c", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
    c.insert(&[0], 1.0).unwrap();
    c.insert(&[1], 2.0).unwrap();
    c.pack().unwrap();

    // a(i) = sqrt(b(i)) - b(i) / c(i)
    let mut a = Tensor::new("a", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
    let i = IndexVar::named("i");
    let rhs = b.access(&[i.clone()]).unwrap().sqrt()
        - b.access(&[i.clone()]).unwrap() / c.access(&[i.clone()]).unwrap();
    a.assign(&[i], rhs).unwrap();

    assert_eq!(a.get_value::<f64>(&[0]).unwrap(), -6.0);
    assert_eq!(a.get_value::<f64>(&[1]).unwrap(), -4.0);

    // negation on top of an access
    let mut n = Tensor::new("n", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
    let i = IndexVar::named("i");
    n.assign(&[i.clone()], -c.access(&[i]).unwrap()).unwrap();
    assert_eq!(n.get_value::<f64>(&[1]).unwrap(), -2.0);
}

#[test]
fn test_compound_assignment_accumulates() {
    let mut b = Tensor::new("b", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
    b.insert(&[0], 1.0).unwrap();
    b.pack().unwrap();

    let mut a = Tensor::new("a", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
    let i = IndexVar::named("i");
    a.assign(&[i.clone()], b.access(&[i.clone()]).unwrap()).unwrap();
    assert_eq!(a.get_value::<f64>(&[0]).unwrap(), 1.0);

    a.assign_compound(&[i.clone()], BinaryOp::Add, b.access(&[i]).unwrap())
        .unwrap();
    a.evaluate().unwrap();
    assert_eq!(a.get_value::<f64>(&[0]).unwrap(), 2.0);
}

#[test]
fn test_complex_components() {
    let mut b = Tensor::new("b", Datatype::Complex128, &[2], Format::sparse_vector()).unwrap();
    b.insert(&[0], Complex::new(1.0f64, 2.0)).unwrap();
    b.insert(&[1], Complex::new(0.0f64, 1.0)).unwrap();
    b.pack().unwrap();

    let mut a = Tensor::new("a", Datatype::Complex128, &[2], Format::sparse_vector()).unwrap();
    let i = IndexVar::named("i");
    a.assign(
        &[i.clone()],
        b.access(&[i.clone()]).unwrap() * b.access(&[i]).unwrap(),
    )
    .unwrap();

    assert_eq!(
        a.get_value::<Complex<f64>>(&[0]).unwrap(),
        Complex::new(-3.0, 4.0)
    );
    assert_eq!(
        a.get_value::<Complex<f64>>(&[1]).unwrap(),
        Complex::new(-1.0, 0.0)
    );
}

#[test]
fn test_format_equality_implies_layout_equality() {
    let format = Format::with_ordering(
        vec![ModeFormat::dense(), ModeFormat::sparse()],
        vec![1, 0],
    )
    .unwrap();
    let coords: [([usize; 2], f64); 3] = [([0, 1], 1.0), ([2, 0], 2.0), ([1, 1], 3.0)];

    let mut first = Tensor::new("F", Datatype::Float64, &[3, 2], format.clone()).unwrap();
    let mut second = Tensor::new("S", Datatype::Float64, &[3, 2], format).unwrap();
    for (coord, value) in &coords {
        first.insert(coord, *value).unwrap();
        second.insert(coord, *value).unwrap();
    }
    first.pack().unwrap();
    second.pack().unwrap();

    assert_eq!(first.entries::<f64>().unwrap(), second.entries::<f64>().unwrap());
    assert!(equals(&first, &second).unwrap());
}

#[test]
fn test_blocked_format_packs() {
    // a 2x2-blocked 4x4 matrix as a dense super-mode over sparse blocks
    let format = Format::from_packs(
        vec![
            ModeFormatPack::new(vec![ModeFormat::dense(), ModeFormat::sparse()]),
            ModeFormatPack::new(vec![ModeFormat::sparse()]),
        ],
        vec![0, 1, 2],
    )
    .unwrap();
    let mut a = Tensor::new("A", Datatype::Float64, &[2, 2, 4], format).unwrap();
    a.insert(&[0, 1, 3], 1.5).unwrap();
    a.insert(&[1, 0, 2], 2.5).unwrap();
    a.pack().unwrap();

    assert_eq!(a.get_value::<f64>(&[0, 1, 3]).unwrap(), 1.5);
    assert_eq!(a.get_value::<f64>(&[1, 0, 2]).unwrap(), 2.5);
}

#[test]
fn test_operand_dropped_before_assignment() {
    let expr = {
        let mut b = Tensor::new("B", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
        b.insert(&[0], 1.0).unwrap();
        let i = IndexVar::named("i");
        b.access(&[i]).unwrap()
    };
    let mut a = Tensor::new("a", Datatype::Float64, &[2], Format::sparse_vector()).unwrap();
    let i = IndexVar::named("i");
    let err = a.assign(&[i], expr).unwrap_err();
    assert!(err.to_string().contains("no longer alive"));
}
