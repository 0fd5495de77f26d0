//! Host interpreter for the generated `load`/`store` members.
//!
//! One [`SimdgroupMatrixStorage`] is the pair of elements a single lane
//! owns. Each method walks the same branch the generated member would take
//! (see [`AccessPath::select`]), truncates typed `addressN` values to the
//! address space's offset width, and for the `_bfloat` members reproduces
//! the lane shuffles on the raw bits of the `float2` register.

use half::bf16;

use crate::codegen::address_space::{lane_address, Action, MemorySpace};
use crate::codegen::memory_access::AccessPath;
use crate::types::StorageElement;

/// The two register elements held by one lane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimdgroupMatrixStorage<T> {
    elements: [T; 2],
}

impl<T: StorageElement> SimdgroupMatrixStorage<T> {
    pub fn new(elements: [T; 2]) -> Self {
        Self { elements }
    }

    pub fn thread_elements(&self) -> [T; 2] {
        self.elements
    }

    pub fn thread_elements_mut(&mut self) -> &mut [T; 2] {
        &mut self.elements
    }

    /// `load<U>`: read two `U` elements and convert them with `T(...)`.
    /// Returns the branch that ran.
    pub fn load<S: MemorySpace, U: StorageElement>(
        &mut self,
        src: &[U],
        elements_per_row: S::Offset,
        matrix_origin: [u16; 2],
        transpose_matrix: bool,
    ) -> AccessPath {
        let stride: u32 = elements_per_row.into();
        let path = AccessPath::select(Action::Load, false, transpose_matrix, stride);
        let [first, second] = addresses::<S>(path, stride, matrix_origin);
        self.elements = [src[first].convert(), src[second].convert()];
        path
    }

    /// `store<U>`: convert both elements with `U(...)` and write them.
    pub fn store<S: MemorySpace, U: StorageElement>(
        &self,
        dst: &mut [U],
        elements_per_row: S::Offset,
        matrix_origin: [u16; 2],
        transpose_matrix: bool,
    ) -> AccessPath {
        let stride: u32 = elements_per_row.into();
        let path = AccessPath::select(Action::Store, false, transpose_matrix, stride);
        let [first, second] = addresses::<S>(path, stride, matrix_origin);
        dst[first] = self.elements[0].convert();
        dst[second] = self.elements[1].convert();
        path
    }
}

impl SimdgroupMatrixStorage<f32> {
    /// `load_bfloat`: place the two bfloats in lanes 1 and 3 of the
    /// register's `bfloat4` view, lanes 0 and 2 cleared.
    pub fn load_bfloat<S: MemorySpace>(
        &mut self,
        src: &[bf16],
        elements_per_row: S::Offset,
        matrix_origin: [u16; 2],
        transpose_matrix: bool,
    ) -> AccessPath {
        let stride: u32 = elements_per_row.into();
        let path = AccessPath::select(Action::Load, true, transpose_matrix, stride);
        let [first, second] = addresses::<S>(path, stride, matrix_origin);

        let mut lanes = [0u16; 4];
        match path {
            AccessPath::TwoPart { .. } => {
                lanes[1] = src[first].to_bits();
                lanes[3] = src[second].to_bits();
            }
            AccessPath::OnePart => {
                // Packed read: the 32-bit word lands in lanes 2..4, value 0
                // is then copied down to lane 1 and lane 2 cleared.
                let packed = u32::from(src[first].to_bits()) | (u32::from(src[second].to_bits()) << 16);
                lanes[2] = packed as u16;
                lanes[3] = (packed >> 16) as u16;
                lanes[1] = src[first].to_bits();
                lanes[2] = 0;
            }
        }
        self.elements = lanes_to_floats(lanes);
        path
    }

    /// `store_bfloat`: round the register to bfloat precision, copy lane 1
    /// to lane 2 and write lanes 2 and 3.
    pub fn store_bfloat<S: MemorySpace>(
        &self,
        dst: &mut [bf16],
        elements_per_row: S::Offset,
        matrix_origin: [u16; 2],
        transpose_matrix: bool,
    ) -> AccessPath {
        let stride: u32 = elements_per_row.into();
        let path = AccessPath::select(Action::Store, true, transpose_matrix, stride);
        let [first, second] = addresses::<S>(path, stride, matrix_origin);

        let rounded = self.elements.map(|value| bf16::from_f32(value).to_f32());
        let mut lanes = floats_to_lanes(rounded);
        lanes[2] = lanes[1];
        dst[first] = bf16::from_bits(lanes[2]);
        dst[second] = bf16::from_bits(lanes[3]);
        path
    }
}

/// Element indices touched by `path`.
fn addresses<S: MemorySpace>(path: AccessPath, stride: u32, matrix_origin: [u16; 2]) -> [usize; 2] {
    match path {
        AccessPath::TwoPart { transposed } => [
            S::wrap(lane_address(stride, matrix_origin, 0, transposed)),
            S::wrap(lane_address(stride, matrix_origin, 1, transposed)),
        ],
        AccessPath::OnePart => {
            // `auto combinedAddress` keeps the promoted type, so it is not
            // truncated to the offset width.
            let combined = lane_address(stride, matrix_origin, 0, false) as usize;
            [combined, combined + 1]
        }
    }
}

/// `bfloat4` view of a `float2`: lane 2i is the low half of element i,
/// lane 2i+1 the high half.
fn floats_to_lanes(values: [f32; 2]) -> [u16; 4] {
    let [a, b] = values.map(f32::to_bits);
    [a as u16, (a >> 16) as u16, b as u16, (b >> 16) as u16]
}

fn lanes_to_floats(lanes: [u16; 4]) -> [f32; 2] {
    let a = u32::from(lanes[0]) | (u32::from(lanes[1]) << 16);
    let b = u32::from(lanes[2]) | (u32::from(lanes[3]) << 16);
    [f32::from_bits(a), f32::from_bits(b)]
}
