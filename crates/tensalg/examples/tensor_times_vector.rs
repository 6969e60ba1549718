//! Tensor-times-vector walkthrough: build sparse operands, write the
//! contraction in index notation, and let the lifecycle compile, assemble
//! and compute the result.

use anyhow::Result;
use tensalg::prelude::*;

fn main() -> Result<()> {
    // A CSR output, a mode-2-first compressed 3-tensor, a sparse vector.
    let csf_201 = Format::with_ordering(vec![ModeFormat::sparse(); 3], vec![2, 0, 1])?;

    let mut a = Tensor::new("A", Datatype::Float64, &[2, 3], Format::csr())?;
    let mut b = Tensor::new("B", Datatype::Float64, &[2, 3, 3], csf_201)?;
    let mut c = Tensor::new("c", Datatype::Float64, &[3], Format::sparse_vector())?;

    // Insert data into B and c
    b.insert(&[0, 0, 0], 1.0)?;
    b.insert(&[1, 2, 0], 2.0)?;
    b.insert(&[1, 2, 1], 3.0)?;
    c.insert(&[0], 4.0)?;
    c.insert(&[1], 5.0)?;

    // Pack data as described by the formats
    b.pack()?;
    c.pack()?;

    // Form a tensor-vector multiplication expression
    let (i, j, k) = (
        IndexVar::named("i"),
        IndexVar::named("j"),
        IndexVar::named("k"),
    );
    let rhs = b.access(&[i.clone(), k.clone(), j.clone()])? * c.access(&[k])?;
    a.assign(&[i, j], rhs)?;

    // Compile the expression, then assemble A's indices and numerically
    // compute the result
    a.compile(false)?;
    a.assemble()?;
    a.compute()?;

    println!("{a}");
    Ok(())
}
