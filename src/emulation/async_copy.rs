//! Host implementation of `simdgroup_event` tile copies.
//!
//! Same rules as the emitted header: synchronous copies, a no-op `wait`,
//! and clamping only in the device-to-threadgroup direction. Strides keep
//! the width of their address space (`u32` device, `u16` threadgroup).

/// How a device-to-threadgroup copy fills destination cells that fall
/// outside the source tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClampMode {
    /// Write the element type's zero.
    #[default]
    ClampToZero,
    /// Replicate the nearest source row/column. Falls back to zero when the
    /// source tile is empty along either axis.
    ClampToEdge,
}

/// Tile extents in elements, `[x, y]` (columns, rows).
pub type TileExtent = [u16; 2];

/// Geometry of one strided tile copy.
///
/// Strides are stored as `u32`; [`SimdgroupEvent`] narrows the threadgroup
/// side to `u16` at the call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCopyDescriptor {
    pub dst_elements_per_row: u32,
    pub dst_tile: TileExtent,
    pub src_elements_per_row: u32,
    pub src_tile: TileExtent,
    pub transpose_matrix: bool,
    pub clamp_mode: ClampMode,
}

impl TileCopyDescriptor {
    /// Tile extents after the transpose swap, as `(dst, src)`.
    pub fn effective_tiles(&self) -> (TileExtent, TileExtent) {
        if self.transpose_matrix {
            (swap(self.dst_tile), swap(self.src_tile))
        } else {
            (self.dst_tile, self.src_tile)
        }
    }

    /// Source cell read for destination cell `[x, y]`, or `None` when the
    /// cell is zero-filled.
    fn source_cell(&self, src_tile: TileExtent, x: u16, y: u16) -> Option<[u16; 2]> {
        if x < src_tile[0] && y < src_tile[1] {
            return Some([x, y]);
        }
        match self.clamp_mode {
            ClampMode::ClampToEdge if src_tile[0] > 0 && src_tile[1] > 0 => {
                Some([x.min(src_tile[0] - 1), y.min(src_tile[1] - 1)])
            }
            _ => None,
        }
    }
}

fn swap([x, y]: TileExtent) -> TileExtent {
    [y, x]
}

#[inline(always)]
fn index(elements_per_row: u32, x: u16, y: u16) -> usize {
    y as usize * elements_per_row as usize + x as usize
}

/// Host stand-in for the Metal `simdgroup_event`.
///
/// Every copy has completed when `async_copy_*` returns. Callers should
/// still pair each copy with [`SimdgroupEvent::wait`] before reading the
/// destination, as kernels must.
#[derive(Debug, Default)]
pub struct SimdgroupEvent {
    issued: usize,
}

impl SimdgroupEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies issued through this event.
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Linear copy of `n_elements` from device to threadgroup memory (or
    /// the reverse; the element loop is the same).
    pub fn async_copy_linear<T: Copy>(&mut self, dst: &mut [T], src: &[T], n_elements: usize) {
        dst[..n_elements].copy_from_slice(&src[..n_elements]);
        self.issued += 1;
    }

    /// Strided tile copy from device memory into threadgroup memory.
    ///
    /// Iterates the whole destination tile; cells outside the source tile
    /// are filled according to `clamp_mode`.
    #[allow(clippy::too_many_arguments)]
    pub fn async_copy_to_threadgroup<T: Copy + Default>(
        &mut self,
        dst: &mut [T],
        dst_elements_per_row: u16,
        dst_tile: TileExtent,
        src: &[T],
        src_elements_per_row: u32,
        src_tile: TileExtent,
        transpose_matrix: bool,
        clamp_mode: ClampMode,
    ) {
        let descriptor = TileCopyDescriptor {
            dst_elements_per_row: u32::from(dst_elements_per_row),
            dst_tile,
            src_elements_per_row,
            src_tile,
            transpose_matrix,
            clamp_mode,
        };
        copy_to_threadgroup(dst, src, &descriptor);
        self.issued += 1;
    }

    /// Strided tile copy from threadgroup memory back to device memory.
    ///
    /// Copies the overlap of the two tiles; the excess of the larger one is
    /// ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn async_copy_to_device<T: Copy>(
        &mut self,
        dst: &mut [T],
        dst_elements_per_row: u32,
        dst_tile: TileExtent,
        src: &[T],
        src_elements_per_row: u16,
        src_tile: TileExtent,
        transpose_matrix: bool,
    ) {
        let descriptor = TileCopyDescriptor {
            dst_elements_per_row,
            dst_tile,
            src_elements_per_row: u32::from(src_elements_per_row),
            src_tile,
            transpose_matrix,
            clamp_mode: ClampMode::ClampToZero,
        };
        copy_to_device(dst, src, &descriptor);
        self.issued += 1;
    }

    /// Barrier over `events`. Copies are synchronous, so nothing is left to
    /// wait for.
    pub fn wait(events: &mut [SimdgroupEvent]) {
        log::trace!("simdgroup_event::wait over {} events", events.len());
    }
}

/// Device-to-threadgroup copy described by `descriptor`.
pub fn copy_to_threadgroup<T: Copy + Default>(dst: &mut [T], src: &[T], descriptor: &TileCopyDescriptor) {
    let (dst_tile, src_tile) = descriptor.effective_tiles();
    for y in 0..dst_tile[1] {
        for x in 0..dst_tile[0] {
            let dst_index = index(descriptor.dst_elements_per_row, x, y);
            dst[dst_index] = match descriptor.source_cell(src_tile, x, y) {
                Some([sx, sy]) => src[index(descriptor.src_elements_per_row, sx, sy)],
                None => T::default(),
            };
        }
    }
}

/// Threadgroup-to-device copy described by `descriptor`. `clamp_mode` is
/// ignored.
pub fn copy_to_device<T: Copy>(dst: &mut [T], src: &[T], descriptor: &TileCopyDescriptor) {
    let (dst_tile, src_tile) = descriptor.effective_tiles();
    let tile_x = dst_tile[0].min(src_tile[0]);
    let tile_y = dst_tile[1].min(src_tile[1]);
    for y in 0..tile_y {
        for x in 0..tile_x {
            dst[index(descriptor.dst_elements_per_row, x, y)] =
                src[index(descriptor.src_elements_per_row, x, y)];
        }
    }
}
