//! Scalar component types and runtime type dispatch.
//!
//! Every numeric operation in the engine dispatches on a [`Datatype`] tag;
//! there is no implicit widening at runtime. The [`Component`] trait
//! connects Rust scalar types to their tags, and [`ComponentVal`] carries a
//! single tagged value through type-erased paths (coordinate staging,
//! expression literals, operand conversion).

use std::fmt;

use bytemuck::Pod;
pub use num_complex::Complex;

/// Scalar component type tag.
///
/// Mirrors the component types the engine can store: booleans, signed and
/// unsigned integers from 8 to 128 bits, the two IEEE floats, and complex
/// numbers built from them. `Complex64` is a pair of `f32`s, `Complex128` a
/// pair of `f64`s (total bit width naming).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    Bool,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Undefined,
}

impl Datatype {
    /// Size of one component in bytes.
    pub fn num_bytes(self) -> usize {
        match self {
            Datatype::Bool | Datatype::UInt8 | Datatype::Int8 => 1,
            Datatype::UInt16 | Datatype::Int16 => 2,
            Datatype::UInt32 | Datatype::Int32 | Datatype::Float32 => 4,
            Datatype::UInt64 | Datatype::Int64 | Datatype::Float64 | Datatype::Complex64 => 8,
            Datatype::UInt128 | Datatype::Int128 | Datatype::Complex128 => 16,
            Datatype::Undefined => 0,
        }
    }

    /// True for the unsigned integer tags.
    pub fn is_uint(self) -> bool {
        matches!(
            self,
            Datatype::UInt8
                | Datatype::UInt16
                | Datatype::UInt32
                | Datatype::UInt64
                | Datatype::UInt128
        )
    }

    /// True for the signed integer tags.
    pub fn is_int(self) -> bool {
        matches!(
            self,
            Datatype::Int8 | Datatype::Int16 | Datatype::Int32 | Datatype::Int64 | Datatype::Int128
        )
    }

    /// True for any integer tag, signed or unsigned.
    pub fn is_integer(self) -> bool {
        self.is_uint() || self.is_int()
    }

    /// True for `Float32` and `Float64`.
    pub fn is_float(self) -> bool {
        matches!(self, Datatype::Float32 | Datatype::Float64)
    }

    /// True for the complex tags.
    pub fn is_complex(self) -> bool {
        matches!(self, Datatype::Complex64 | Datatype::Complex128)
    }

    /// True for any tag that participates in arithmetic.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    fn int_bits(self) -> u32 {
        match self {
            Datatype::Bool | Datatype::UInt8 | Datatype::Int8 => 8,
            Datatype::UInt16 | Datatype::Int16 => 16,
            Datatype::UInt32 | Datatype::Int32 => 32,
            Datatype::UInt64 | Datatype::Int64 => 64,
            Datatype::UInt128 | Datatype::Int128 => 128,
            _ => 0,
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Datatype::Bool => "bool",
            Datatype::UInt8 => "uint8",
            Datatype::UInt16 => "uint16",
            Datatype::UInt32 => "uint32",
            Datatype::UInt64 => "uint64",
            Datatype::UInt128 => "uint128",
            Datatype::Int8 => "int8",
            Datatype::Int16 => "int16",
            Datatype::Int32 => "int32",
            Datatype::Int64 => "int64",
            Datatype::Int128 => "int128",
            Datatype::Float32 => "float32",
            Datatype::Float64 => "float64",
            Datatype::Complex64 => "complex64",
            Datatype::Complex128 => "complex128",
            Datatype::Undefined => "undefined",
        };
        write!(f, "{name}")
    }
}

/// Widening join of two component types, used to type binary expression
/// nodes: complex beats float beats integer, equal classes take the wider
/// width, and signed wins integer-width ties.
///
/// # Panics
///
/// Panics if either side is `Undefined`; an undefined operand in an
/// expression is a programming error.
pub fn join(a: Datatype, b: Datatype) -> Datatype {
    assert!(
        a != Datatype::Undefined && b != Datatype::Undefined,
        "cannot join undefined component types"
    );
    if a == b {
        return a;
    }
    if a == Datatype::Bool {
        return b;
    }
    if b == Datatype::Bool {
        return a;
    }
    if a.is_complex() || b.is_complex() {
        let wide = |d: Datatype| {
            matches!(
                d,
                Datatype::Float64 | Datatype::Complex128 | Datatype::Int64 | Datatype::UInt64
            ) || d.int_bits() >= 64
        };
        return if wide(a) || wide(b) {
            Datatype::Complex128
        } else {
            Datatype::Complex64
        };
    }
    if a.is_float() || b.is_float() {
        return if a == Datatype::Float64 || b == Datatype::Float64 {
            Datatype::Float64
        } else {
            Datatype::Float32
        };
    }
    let bits = a.int_bits().max(b.int_bits());
    let signed = a.is_int() || b.is_int();
    match (signed, bits) {
        (true, 8) => Datatype::Int8,
        (true, 16) => Datatype::Int16,
        (true, 32) => Datatype::Int32,
        (true, 64) => Datatype::Int64,
        (true, 128) => Datatype::Int128,
        (false, 8) => Datatype::UInt8,
        (false, 16) => Datatype::UInt16,
        (false, 32) => Datatype::UInt32,
        (false, 64) => Datatype::UInt64,
        (false, 128) => Datatype::UInt128,
        _ => unreachable!("join of non-integer widths"),
    }
}

/// A single component value tagged with its type.
///
/// Booleans are deliberately absent: the value paths of the engine reject
/// `Bool` tensors, matching the runtime dispatcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentVal {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Float32(f32),
    Float64(f64),
    Complex64(Complex<f32>),
    Complex128(Complex<f64>),
}

impl ComponentVal {
    /// The type tag of this value.
    pub fn dtype(self) -> Datatype {
        match self {
            ComponentVal::UInt8(_) => Datatype::UInt8,
            ComponentVal::UInt16(_) => Datatype::UInt16,
            ComponentVal::UInt32(_) => Datatype::UInt32,
            ComponentVal::UInt64(_) => Datatype::UInt64,
            ComponentVal::UInt128(_) => Datatype::UInt128,
            ComponentVal::Int8(_) => Datatype::Int8,
            ComponentVal::Int16(_) => Datatype::Int16,
            ComponentVal::Int32(_) => Datatype::Int32,
            ComponentVal::Int64(_) => Datatype::Int64,
            ComponentVal::Int128(_) => Datatype::Int128,
            ComponentVal::Float32(_) => Datatype::Float32,
            ComponentVal::Float64(_) => Datatype::Float64,
            ComponentVal::Complex64(_) => Datatype::Complex64,
            ComponentVal::Complex128(_) => Datatype::Complex128,
        }
    }

    /// True if this value is an exact zero.
    pub fn is_zero(self) -> bool {
        match self {
            ComponentVal::UInt8(v) => v == 0,
            ComponentVal::UInt16(v) => v == 0,
            ComponentVal::UInt32(v) => v == 0,
            ComponentVal::UInt64(v) => v == 0,
            ComponentVal::UInt128(v) => v == 0,
            ComponentVal::Int8(v) => v == 0,
            ComponentVal::Int16(v) => v == 0,
            ComponentVal::Int32(v) => v == 0,
            ComponentVal::Int64(v) => v == 0,
            ComponentVal::Int128(v) => v == 0,
            ComponentVal::Float32(v) => v == 0.0,
            ComponentVal::Float64(v) => v == 0.0,
            ComponentVal::Complex64(v) => v.re == 0.0 && v.im == 0.0,
            ComponentVal::Complex128(v) => v.re == 0.0 && v.im == 0.0,
        }
    }

    /// Reads a value of the given type from a little-endian-native byte
    /// slice. The slice length must equal `dtype.num_bytes()`.
    pub fn from_bytes(dtype: Datatype, bytes: &[u8]) -> ComponentVal {
        crate::with_component!(dtype, T => {
            let v: T = bytemuck::pod_read_unaligned(bytes);
            <T as Component>::to_val(v)
        })
    }

    /// Appends this value's native byte representation to `out`.
    pub fn write_bytes(self, out: &mut Vec<u8>) {
        crate::with_component!(self.dtype(), T => {
            let v = <T as Component>::from_val(self);
            out.extend_from_slice(bytemuck::bytes_of(&v));
        })
    }

    fn as_f64(self) -> f64 {
        match self {
            ComponentVal::UInt8(v) => v as f64,
            ComponentVal::UInt16(v) => v as f64,
            ComponentVal::UInt32(v) => v as f64,
            ComponentVal::UInt64(v) => v as f64,
            ComponentVal::UInt128(v) => v as f64,
            ComponentVal::Int8(v) => v as f64,
            ComponentVal::Int16(v) => v as f64,
            ComponentVal::Int32(v) => v as f64,
            ComponentVal::Int64(v) => v as f64,
            ComponentVal::Int128(v) => v as f64,
            ComponentVal::Float32(v) => v as f64,
            ComponentVal::Float64(v) => v,
            ComponentVal::Complex64(_) | ComponentVal::Complex128(_) => {
                panic!("cannot narrow a complex value to a real component")
            }
        }
    }

    fn as_i128(self) -> i128 {
        match self {
            ComponentVal::UInt8(v) => v as i128,
            ComponentVal::UInt16(v) => v as i128,
            ComponentVal::UInt32(v) => v as i128,
            ComponentVal::UInt64(v) => v as i128,
            ComponentVal::UInt128(v) => v as i128,
            ComponentVal::Int8(v) => v as i128,
            ComponentVal::Int16(v) => v as i128,
            ComponentVal::Int32(v) => v as i128,
            ComponentVal::Int64(v) => v as i128,
            ComponentVal::Int128(v) => v,
            ComponentVal::Float32(v) => v as i128,
            ComponentVal::Float64(v) => v as i128,
            ComponentVal::Complex64(_) | ComponentVal::Complex128(_) => {
                panic!("cannot narrow a complex value to an integer component")
            }
        }
    }

    fn as_complex128(self) -> Complex<f64> {
        match self {
            ComponentVal::Complex64(v) => Complex::new(v.re as f64, v.im as f64),
            ComponentVal::Complex128(v) => v,
            other => Complex::new(other.as_f64(), 0.0),
        }
    }
}

impl fmt::Display for ComponentVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentVal::UInt8(v) => write!(f, "{v}"),
            ComponentVal::UInt16(v) => write!(f, "{v}"),
            ComponentVal::UInt32(v) => write!(f, "{v}"),
            ComponentVal::UInt64(v) => write!(f, "{v}"),
            ComponentVal::UInt128(v) => write!(f, "{v}"),
            ComponentVal::Int8(v) => write!(f, "{v}"),
            ComponentVal::Int16(v) => write!(f, "{v}"),
            ComponentVal::Int32(v) => write!(f, "{v}"),
            ComponentVal::Int64(v) => write!(f, "{v}"),
            ComponentVal::Int128(v) => write!(f, "{v}"),
            ComponentVal::Float32(v) => write!(f, "{v}"),
            ComponentVal::Float64(v) => write!(f, "{v}"),
            ComponentVal::Complex64(v) => write!(f, "{v}"),
            ComponentVal::Complex128(v) => write!(f, "{v}"),
        }
    }
}

/// Connects a Rust scalar type to its runtime [`Datatype`] tag.
///
/// Implemented for the integer, float and complex component types. The
/// arithmetic operations are associated functions so generic code can stay
/// free of operator-trait bounds; integer division by zero yields zero and
/// unsigned negation wraps.
pub trait Component: Copy + PartialEq + fmt::Debug + Pod + 'static {
    /// The tag corresponding to this Rust type.
    const DTYPE: Datatype;

    fn zero() -> Self;
    fn one() -> Self;
    fn is_zero(&self) -> bool;

    fn add(a: Self, b: Self) -> Self;
    fn sub(a: Self, b: Self) -> Self;
    fn mul(a: Self, b: Self) -> Self;
    fn div(a: Self, b: Self) -> Self;
    fn neg(a: Self) -> Self;
    fn sqrt(a: Self) -> Self;

    /// Wraps this value in a tagged [`ComponentVal`].
    fn to_val(self) -> ComponentVal;

    /// Converts a tagged value into this type. Panics on conversions the
    /// widening join never produces (complex into a real component).
    fn from_val(v: ComponentVal) -> Self;

    /// Relative-tolerance comparison; exact for the integer types.
    fn approx_eq(a: Self, b: Self, rel_tol: f64) -> bool;
}

macro_rules! impl_int_component {
    ($t:ty, $tag:ident) => {
        impl Component for $t {
            const DTYPE: Datatype = Datatype::$tag;

            fn zero() -> Self {
                0
            }
            fn one() -> Self {
                1
            }
            fn is_zero(&self) -> bool {
                *self == 0
            }
            fn add(a: Self, b: Self) -> Self {
                a.wrapping_add(b)
            }
            fn sub(a: Self, b: Self) -> Self {
                a.wrapping_sub(b)
            }
            fn mul(a: Self, b: Self) -> Self {
                a.wrapping_mul(b)
            }
            fn div(a: Self, b: Self) -> Self {
                a.checked_div(b).unwrap_or(0)
            }
            fn neg(a: Self) -> Self {
                (0 as $t).wrapping_sub(a)
            }
            fn sqrt(a: Self) -> Self {
                (a as f64).sqrt() as $t
            }
            fn to_val(self) -> ComponentVal {
                ComponentVal::$tag(self)
            }
            fn from_val(v: ComponentVal) -> Self {
                v.as_i128() as $t
            }
            fn approx_eq(a: Self, b: Self, _rel_tol: f64) -> bool {
                a == b
            }
        }
    };
}

impl_int_component!(u8, UInt8);
impl_int_component!(u16, UInt16);
impl_int_component!(u32, UInt32);
impl_int_component!(u64, UInt64);
impl_int_component!(u128, UInt128);
impl_int_component!(i8, Int8);
impl_int_component!(i16, Int16);
impl_int_component!(i32, Int32);
impl_int_component!(i64, Int64);
impl_int_component!(i128, Int128);

macro_rules! impl_float_component {
    ($t:ty, $tag:ident) => {
        impl Component for $t {
            const DTYPE: Datatype = Datatype::$tag;

            fn zero() -> Self {
                0.0
            }
            fn one() -> Self {
                1.0
            }
            fn is_zero(&self) -> bool {
                *self == 0.0
            }
            fn add(a: Self, b: Self) -> Self {
                a + b
            }
            fn sub(a: Self, b: Self) -> Self {
                a - b
            }
            fn mul(a: Self, b: Self) -> Self {
                a * b
            }
            fn div(a: Self, b: Self) -> Self {
                a / b
            }
            fn neg(a: Self) -> Self {
                -a
            }
            fn sqrt(a: Self) -> Self {
                a.sqrt()
            }
            fn to_val(self) -> ComponentVal {
                ComponentVal::$tag(self)
            }
            fn from_val(v: ComponentVal) -> Self {
                v.as_f64() as $t
            }
            fn approx_eq(a: Self, b: Self, rel_tol: f64) -> bool {
                if a == b {
                    return true;
                }
                let (a, b) = (a as f64, b as f64);
                ((a - b) / a).abs() <= rel_tol
            }
        }
    };
}

impl_float_component!(f32, Float32);
impl_float_component!(f64, Float64);

macro_rules! impl_complex_component {
    ($t:ty, $scalar:ty, $tag:ident) => {
        impl Component for $t {
            const DTYPE: Datatype = Datatype::$tag;

            fn zero() -> Self {
                Complex::new(0.0, 0.0)
            }
            fn one() -> Self {
                Complex::new(1.0, 0.0)
            }
            fn is_zero(&self) -> bool {
                self.re == 0.0 && self.im == 0.0
            }
            fn add(a: Self, b: Self) -> Self {
                a + b
            }
            fn sub(a: Self, b: Self) -> Self {
                a - b
            }
            fn mul(a: Self, b: Self) -> Self {
                a * b
            }
            fn div(a: Self, b: Self) -> Self {
                a / b
            }
            fn neg(a: Self) -> Self {
                -a
            }
            fn sqrt(a: Self) -> Self {
                a.sqrt()
            }
            fn to_val(self) -> ComponentVal {
                ComponentVal::$tag(self)
            }
            fn from_val(v: ComponentVal) -> Self {
                let c = v.as_complex128();
                Complex::new(c.re as $scalar, c.im as $scalar)
            }
            fn approx_eq(a: Self, b: Self, rel_tol: f64) -> bool {
                if a == b {
                    return true;
                }
                let a128 = Complex::new(a.re as f64, a.im as f64);
                let b128 = Complex::new(b.re as f64, b.im as f64);
                ((a128 - b128) / a128).norm() <= rel_tol
            }
        }
    };
}

impl_complex_component!(Complex<f32>, f32, Complex64);
impl_complex_component!(Complex<f64>, f64, Complex128);

/// Dispatches a block over the Rust type behind a [`Datatype`] tag.
///
/// The block sees `$T` as a local type alias for the concrete component
/// type. `Bool` and `Undefined` have no component dispatch and panic, the
/// same way the runtime switch of the engine rejects them.
///
/// ```
/// use tensalg_core::{with_component, Datatype};
///
/// let bytes = with_component!(Datatype::Float32, T => {
///     std::mem::size_of::<T>()
/// });
/// assert_eq!(bytes, 4);
/// ```
#[macro_export]
macro_rules! with_component {
    ($dtype:expr, $T:ident => $body:block) => {{
        match $dtype {
            $crate::Datatype::UInt8 => {
                type $T = u8;
                $body
            }
            $crate::Datatype::UInt16 => {
                type $T = u16;
                $body
            }
            $crate::Datatype::UInt32 => {
                type $T = u32;
                $body
            }
            $crate::Datatype::UInt64 => {
                type $T = u64;
                $body
            }
            $crate::Datatype::UInt128 => {
                type $T = u128;
                $body
            }
            $crate::Datatype::Int8 => {
                type $T = i8;
                $body
            }
            $crate::Datatype::Int16 => {
                type $T = i16;
                $body
            }
            $crate::Datatype::Int32 => {
                type $T = i32;
                $body
            }
            $crate::Datatype::Int64 => {
                type $T = i64;
                $body
            }
            $crate::Datatype::Int128 => {
                type $T = i128;
                $body
            }
            $crate::Datatype::Float32 => {
                type $T = f32;
                $body
            }
            $crate::Datatype::Float64 => {
                type $T = f64;
                $body
            }
            $crate::Datatype::Complex64 => {
                type $T = $crate::datatype::Complex<f32>;
                $body
            }
            $crate::Datatype::Complex128 => {
                type $T = $crate::datatype::Complex<f64>;
                $body
            }
            other => panic!("no component dispatch for {other}"),
        }
    }};
}
