//! Address spaces a generated routine can touch.
//!
//! Device memory is addressed with `uint` offsets: buffers can exceed what a
//! 16-bit index reaches. Threadgroup memory is a few tens of kilobytes, so
//! its offsets stay in `ushort`, which lets the Metal compiler fold the
//! arithmetic into immediates once the GEMM loop is unrolled.
//!
//! The matrix origin handed to a load/store is always `ushort2`. Anything
//! wider has already been folded into the base pointer by `apply_offset`.

use std::fmt;

/// Memory space of the pointer passed to a generated routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Device,
    Threadgroup,
}

impl AddressSpace {
    pub const ALL: [AddressSpace; 2] = [AddressSpace::Device, AddressSpace::Threadgroup];

    /// Metal address-space qualifier.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Threadgroup => "threadgroup",
        }
    }

    /// Integer type of `elements_per_row` and of intermediate addresses.
    pub fn offset_type(self) -> &'static str {
        match self {
            Self::Device => "uint",
            Self::Threadgroup => "ushort",
        }
    }

    /// Width of [`AddressSpace::offset_type`] in bits.
    pub fn offset_bits(self) -> u32 {
        match self {
            Self::Device => 32,
            Self::Threadgroup => 16,
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Direction of a generated memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Load,
    Store,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Load, Action::Store];

    /// Function name stem.
    pub fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Store => "store",
        }
    }
}

/// Compile-time view of an [`AddressSpace`], used by the host emulation so
/// that `elements_per_row` keeps the same integer width as in the generated
/// Metal signatures.
pub trait MemorySpace {
    /// `uint` for device memory, `ushort` for threadgroup memory.
    type Offset: Copy + Into<u32> + fmt::Debug;

    /// Truncate an intermediate address to the space's offset width, as the
    /// assignment to a typed `addressN` variable does on the GPU.
    fn wrap(address: u32) -> usize;

    /// Host equivalent of `simdgroup_matrix_storage::apply_offset`: the
    /// element offset a base pointer is advanced by to reach `matrix_origin`.
    fn apply_offset(
        elements_per_row: Self::Offset,
        matrix_origin: [Self::Offset; 2],
        transpose_matrix: bool,
    ) -> usize;
}

/// Off-chip device memory.
#[derive(Debug, Clone, Copy)]
pub struct Device;

/// On-chip threadgroup memory.
#[derive(Debug, Clone, Copy)]
pub struct Threadgroup;

impl MemorySpace for Device {
    type Offset = u32;

    #[inline(always)]
    fn wrap(address: u32) -> usize {
        address as usize
    }

    fn apply_offset(elements_per_row: u32, matrix_origin: [u32; 2], transpose_matrix: bool) -> usize {
        // The product is formed in `uint` and only then widened to `ulong`.
        let [x, y] = matrix_origin;
        if transpose_matrix {
            x.wrapping_mul(elements_per_row) as usize + y as usize
        } else {
            y.wrapping_mul(elements_per_row) as usize + x as usize
        }
    }
}

impl MemorySpace for Threadgroup {
    type Offset = u16;

    #[inline(always)]
    fn wrap(address: u32) -> usize {
        (address & 0xFFFF) as usize
    }

    fn apply_offset(elements_per_row: u16, matrix_origin: [u16; 2], transpose_matrix: bool) -> usize {
        // `ushort * ushort` promotes to `int`; nothing is truncated here.
        let [x, y] = matrix_origin.map(usize::from);
        let stride = usize::from(elements_per_row);
        if transpose_matrix {
            x * stride + y
        } else {
            y * stride + x
        }
    }
}

/// Element address of lane `lane` (0 or 1) of a 2-wide register, before
/// truncation to the offset width.
///
/// Non-transposed: `origin.y * stride + (origin.x + lane)`.
/// Transposed: `(origin.x + lane) * stride + origin.y`.
#[inline]
pub fn lane_address(elements_per_row: u32, matrix_origin: [u16; 2], lane: u16, transpose_matrix: bool) -> u32 {
    let x = u32::from(matrix_origin[0]) + u32::from(lane);
    let y = u32::from(matrix_origin[1]);
    if transpose_matrix {
        x.wrapping_mul(elements_per_row).wrapping_add(y)
    } else {
        y.wrapping_mul(elements_per_row).wrapping_add(x)
    }
}
