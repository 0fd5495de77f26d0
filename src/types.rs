//! Element precisions and per-operand bookkeeping shared by the GEMM
//! descriptor, the source assembler and the host emulation.

use std::fmt;

use half::{bf16, f16};

/// Memory precision of one GEMM operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GemmPrecision {
    /// IEEE half precision.
    F16,
    /// bfloat16. Decoded into `float` registers through the lane layout.
    BF16,
    /// IEEE single precision.
    F32,
}

impl GemmPrecision {
    /// Decode a raw precision tag (`0 = f16`, `1 = bf16`, `2 = f32`).
    ///
    /// # Panics
    ///
    /// Panics on any other tag. An unknown tag is caller misuse, not data.
    pub fn from_raw(tag: u8) -> Self {
        match tag {
            0 => Self::F16,
            1 => Self::BF16,
            2 => Self::F32,
            _ => crate::contract_violation!("unknown GEMM precision tag: {tag}"),
        }
    }

    /// Raw tag accepted by [`GemmPrecision::from_raw`].
    pub fn raw(self) -> u8 {
        match self {
            Self::F16 => 0,
            Self::BF16 => 1,
            Self::F32 => 2,
        }
    }

    /// Metal Shading Language spelling of the memory type.
    pub fn metal_type(self) -> &'static str {
        match self {
            Self::F16 => "half",
            Self::BF16 => "bfloat",
            Self::F32 => "float",
        }
    }

    /// Register type used while accumulating. bfloat is widened to float so
    /// the `_bfloat` load/store members apply.
    pub fn register_type(self) -> &'static str {
        match self {
            Self::F16 => "half",
            Self::BF16 | Self::F32 => "float",
        }
    }

    /// Size of one element in memory.
    pub fn size_bytes(self) -> usize {
        match self {
            Self::F16 | Self::BF16 => 2,
            Self::F32 => 4,
        }
    }

    /// Whether loads and stores of this precision go through the narrow
    /// `_bfloat` members.
    pub fn decodes_bf16(self) -> bool {
        matches!(self, Self::BF16)
    }
}

impl fmt::Display for GemmPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F16 => write!(f, "f16"),
            Self::BF16 => write!(f, "bf16"),
            Self::F32 => write!(f, "f32"),
        }
    }
}

/// One value per GEMM operand (`C = A * B`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PerOperand<T> {
    pub a: T,
    pub b: T,
    pub c: T,
}

impl<T> PerOperand<T> {
    pub const fn new(a: T, b: T, c: T) -> Self {
        Self { a, b, c }
    }

    /// Apply `f` to each operand, keeping the operand order.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> PerOperand<U> {
        PerOperand {
            a: f(self.a),
            b: f(self.b),
            c: f(self.c),
        }
    }
}

impl<T: Copy> PerOperand<T> {
    /// Same value for all three operands.
    pub const fn splat(value: T) -> Self {
        Self { a: value, b: value, c: value }
    }
}

/// Element types the host emulation can hold in memory or registers.
///
/// Conversions go through `f32`, which is exact for every narrower type and
/// rounds to nearest-even when narrowing (the `half` crate's rule, matching
/// Metal's `float -> half/bfloat` casts).
pub trait StorageElement: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const PRECISION: GemmPrecision;

    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;

    /// Equivalent of the Metal cast `U(value)`.
    fn convert<U: StorageElement>(self) -> U {
        U::from_f32(self.to_f32())
    }
}

impl StorageElement for f32 {
    const PRECISION: GemmPrecision = GemmPrecision::F32;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl StorageElement for f16 {
    const PRECISION: GemmPrecision = GemmPrecision::F16;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}

impl StorageElement for bf16 {
    const PRECISION: GemmPrecision = GemmPrecision::BF16;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        bf16::from_f32(value)
    }
}
