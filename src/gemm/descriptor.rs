//! GEMM problem descriptors and their canonical form.
//!
//! Leading dimensions may be omitted; [`GemmProblemDescriptor::canonicalize`]
//! fills them in. Equality and hashing only ever look at the canonical form,
//! so spelling out a default leading dimension does not create a new cache
//! entry, while any difference in a resolved value does.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::types::{GemmPrecision, PerOperand};

/// A `C = A * B` problem, with `A: M x K`, `B: K x N`, `C: M x N`.
#[derive(Debug, Clone, Copy)]
pub struct GemmProblemDescriptor {
    pub m: u32,
    pub n: u32,
    pub k: u32,
    pub precisions: PerOperand<GemmPrecision>,
    pub transpose: PerOperand<bool>,
    /// Row stride per operand; `None` means the dense default.
    pub leading_dimensions: PerOperand<Option<u32>>,
    /// Whether C already holds values to accumulate into.
    pub load_previous_c: bool,
}

impl GemmProblemDescriptor {
    /// Dense, non-transposed problem of one precision.
    pub fn new(m: u32, n: u32, k: u32, precision: GemmPrecision) -> Self {
        Self {
            m,
            n,
            k,
            precisions: PerOperand::splat(precision),
            transpose: PerOperand::splat(false),
            leading_dimensions: PerOperand::splat(None),
            load_previous_c: false,
        }
    }

    pub fn with_precisions(mut self, a: GemmPrecision, b: GemmPrecision, c: GemmPrecision) -> Self {
        self.precisions = PerOperand::new(a, b, c);
        self
    }

    pub fn with_transpose(mut self, a: bool, b: bool, c: bool) -> Self {
        self.transpose = PerOperand::new(a, b, c);
        self
    }

    pub fn with_leading_dimensions(mut self, a: Option<u32>, b: Option<u32>, c: Option<u32>) -> Self {
        self.leading_dimensions = PerOperand::new(a, b, c);
        self
    }

    pub fn with_load_previous_c(mut self, load_previous_c: bool) -> Self {
        self.load_previous_c = load_previous_c;
        self
    }

    /// Leading dimensions used when none is given.
    ///
    /// A: `K` (or `M` when transposed). B: `N` (or `K` when transposed).
    /// C: always `N`.
    pub fn default_leading_dimensions(&self) -> PerOperand<u32> {
        PerOperand {
            a: if self.transpose.a { self.m } else { self.k },
            b: if self.transpose.b { self.k } else { self.n },
            c: self.n,
        }
    }

    /// Resolve every optional field.
    pub fn canonicalize(&self) -> GemmKey {
        let defaults = self.default_leading_dimensions();
        GemmKey {
            m: self.m,
            n: self.n,
            k: self.k,
            precisions: self.precisions,
            transpose: self.transpose,
            leading_dimensions: PerOperand {
                a: self.leading_dimensions.a.unwrap_or(defaults.a),
                b: self.leading_dimensions.b.unwrap_or(defaults.b),
                c: self.leading_dimensions.c.unwrap_or(defaults.c),
            },
            load_previous_c: self.load_previous_c,
        }
    }
}

impl PartialEq for GemmProblemDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.canonicalize() == other.canonicalize()
    }
}

impl Eq for GemmProblemDescriptor {}

impl Hash for GemmProblemDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonicalize().hash(state);
    }
}

impl From<&GemmProblemDescriptor> for GemmKey {
    fn from(descriptor: &GemmProblemDescriptor) -> Self {
        descriptor.canonicalize()
    }
}

/// Canonical GEMM descriptor: the pipeline cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GemmKey {
    pub m: u32,
    pub n: u32,
    pub k: u32,
    pub precisions: PerOperand<GemmPrecision>,
    pub transpose: PerOperand<bool>,
    pub leading_dimensions: PerOperand<u32>,
    pub load_previous_c: bool,
}

impl GemmKey {
    /// Stable 64-bit fingerprint, used to name dumped sources.
    ///
    /// FNV-1a over the key's fields in declaration order. Not used for map
    /// lookups, where the full key is compared.
    pub fn fingerprint(&self) -> u64 {
        let mut bytes = Vec::with_capacity(32);
        for value in [self.m, self.n, self.k] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        for flags in [self.precisions.map(GemmPrecision::raw), self.transpose.map(u8::from)] {
            bytes.extend_from_slice(&[flags.a, flags.b, flags.c]);
        }
        for value in [self.leading_dimensions.a, self.leading_dimensions.b, self.leading_dimensions.c] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.push(self.load_previous_c as u8);
        fnv1a(&bytes)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

impl fmt::Display for GemmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trans = |t: bool| if t { "T" } else { "N" };
        write!(
            f,
            "gemm {}x{}x{} {}{}{} {}/{}/{} ld={}/{}/{}",
            self.m,
            self.n,
            self.k,
            trans(self.transpose.a),
            trans(self.transpose.b),
            trans(self.transpose.c),
            self.precisions.a,
            self.precisions.b,
            self.precisions.c,
            self.leading_dimensions.a,
            self.leading_dimensions.b,
            self.leading_dimensions.c,
        )?;
        if self.load_previous_c {
            write!(f, " +C")?;
        }
        Ok(())
    }
}
