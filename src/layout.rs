//! Lane layout of an 8x8 SIMD matrix.
//!
//! Each of the 32 lanes holds two horizontally adjacent elements. Lanes are
//! laid out in Morton order:
//!
//! ```text
//!  0  0  1  1  8  8  9  9
//!  2  2  3  3 10 10 11 11
//!  4  4  5  5 12 12 13 13
//!  6  6  7  7 14 14 15 15
//! 16 16 17 17 24 24 25 25
//! 18 18 19 19 26 26 27 27
//! 20 20 21 21 28 28 29 29
//! 22 22 23 23 30 30 31 31
//! ```
//!
//! Downstream kernels hard-code this assignment, so it must match the
//! `morton_order` function emitted into the matrix-storage header exactly.

/// Lanes in one SIMD group.
pub const SIMD_WIDTH: u16 = 32;

/// Side length of a SIMD matrix.
pub const SIMD_MATRIX_DIM: usize = 8;

const QUADRANT_SPAN_M: u16 = 4;
const THREADS_PER_QUADRANT: u16 = 8;

/// Coordinate `[x, y]` (column N, row M) of the first element held by
/// `lane`. The second element is at `[x + 1, y]`.
pub fn morton_order(lane: u16) -> [u16; 2] {
    crate::precondition!(lane < SIMD_WIDTH, "lane {lane} outside a {SIMD_WIDTH}-wide SIMD group");
    let quad_id = lane / 4;

    let m_floor_of_quadrant = (quad_id / 4) * QUADRANT_SPAN_M;
    let m_in_quadrant = (lane / 2) % (THREADS_PER_QUADRANT / 2);
    let m_in_simd = m_floor_of_quadrant + m_in_quadrant;

    let n_floor_of_quadrant = (quad_id & 2) * 2;
    let n_in_quadrant = (lane % 2) * 2;
    let n_in_simd = n_floor_of_quadrant + n_in_quadrant;

    [n_in_simd, m_in_simd]
}

/// The full 8x8 grid of owning lanes, indexed `[row][column]`.
pub fn lane_grid() -> [[u16; SIMD_MATRIX_DIM]; SIMD_MATRIX_DIM] {
    let mut grid = [[0u16; SIMD_MATRIX_DIM]; SIMD_MATRIX_DIM];
    for lane in 0..SIMD_WIDTH {
        let [x, y] = morton_order(lane).map(usize::from);
        grid[y][x] = lane;
        grid[y][x + 1] = lane;
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_quadrant() {
        assert_eq!(morton_order(0), [0, 0]);
        assert_eq!(morton_order(1), [2, 0]);
        assert_eq!(morton_order(2), [0, 1]);
        assert_eq!(morton_order(7), [2, 3]);
    }

    #[test]
    fn test_quadrant_floors() {
        assert_eq!(morton_order(8), [4, 0]);
        assert_eq!(morton_order(16), [0, 4]);
        assert_eq!(morton_order(24), [4, 4]);
        assert_eq!(morton_order(31), [6, 7]);
    }

    #[test]
    fn test_grid_covers_every_cell_once() {
        let grid = lane_grid();
        let mut counts = [0u8; SIMD_WIDTH as usize];
        for row in grid {
            for lane in row {
                counts[lane as usize] += 1;
            }
        }
        assert!(counts.iter().all(|&c| c == 2));
        assert_eq!(grid[5], [18, 18, 19, 19, 26, 26, 27, 27]);
    }

    #[test]
    #[should_panic(expected = "outside a 32-wide SIMD group")]
    fn test_lane_out_of_range() {
        morton_order(32);
    }
}
