//! Transform layout conversion.
//!
//! The wire carries 4×4 transforms as 16 f32 values in row-major order. In
//! memory they are glam::Mat4, which stores column-major with the
//! translation in the fourth column. Conversion is a pure permutation of
//! the 16 values, no arithmetic, so round-trips are bit-exact for every bit
//! pattern including non-finite values.
//!
//! Wire layout: positions {0,4,8}, {1,5,9}, {2,6,10} are the three basis
//! columns, {3,7,11} the translation, 12..16 the homogeneous row.

use glam::{Mat4, Vec4};

/// Flatten a matrix to the row-major wire layout.
pub fn to_wire(m: &Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}

/// Rebuild a matrix from the row-major wire layout.
pub fn from_wire(wire: &[f32; 16]) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(wire[0], wire[4], wire[8], wire[12]),
        Vec4::new(wire[1], wire[5], wire[9], wire[13]),
        Vec4::new(wire[2], wire[6], wire[10], wire[14]),
        Vec4::new(wire[3], wire[7], wire[11], wire[15]),
    )
}

/// Extract the 3×4 affine block: three basis columns, then the translation.
/// This is the layout the engine boundary consumes for object placement.
pub fn to_affine(m: &Mat4) -> [f32; 12] {
    let c = m.to_cols_array();
    [
        c[0], c[1], c[2], //
        c[4], c[5], c[6], //
        c[8], c[9], c[10], //
        c[12], c[13], c[14],
    ]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
