//! NIST P-256 (secp256r1) domain parameters as little-endian digit vectors,
//! with precomputed Barrett constants for the field prime and the group
//! order.

use super::vli::{Digit, Vli};

/// Digit width of one coordinate: 256 bits as u32 digits.
pub(crate) const NUM_DIGITS: usize = 8;

/// p = 2^256 - 2^224 + 2^192 + 2^96 - 1
pub(crate) const CURVE_P: Vli = [
    0xffff_ffff,
    0xffff_ffff,
    0xffff_ffff,
    0x0000_0000,
    0x0000_0000,
    0x0000_0000,
    0x0000_0001,
    0xffff_ffff,
];

/// Curve coefficient b (a is fixed at -3).
pub(crate) const CURVE_B: Vli = [
    0x27d2_604b,
    0x3bce_3c3e,
    0xcc53_b0f6,
    0x651d_06b0,
    0x7698_86bc,
    0xb3eb_bd55,
    0xaa3a_93e7,
    0x5ac6_35d8,
];

/// Group order n.
pub(crate) const CURVE_N: Vli = [
    0xfc63_2551,
    0xf3b9_cac2,
    0xa717_9e84,
    0xbce6_faad,
    0xffff_ffff,
    0xffff_ffff,
    0x0000_0000,
    0xffff_ffff,
];

/// Base point G, x coordinate.
pub(crate) const CURVE_GX: Vli = [
    0xd898_c296,
    0xf4a1_3945,
    0x2deb_33a0,
    0x7703_7d81,
    0x63a4_40f2,
    0xf8bc_e6e5,
    0xe12c_4247,
    0x6b17_d1f2,
];

/// Base point G, y coordinate.
pub(crate) const CURVE_GY: Vli = [
    0x37bf_51f5,
    0xcbb6_4068,
    0x6b31_5ece,
    0x2bce_3357,
    0x7c0f_9e16,
    0x8ee7_eb4a,
    0xfe1a_7f9b,
    0x4fe3_42e2,
];

/// Barrett constant for p: floor(2^512 / p), NUM_DIGITS + 1 digits.
pub(crate) const MU_P: [Digit; NUM_DIGITS + 1] = [
    0x0000_0003,
    0x0000_0000,
    0xffff_ffff,
    0xffff_fffe,
    0xffff_fffe,
    0xffff_fffe,
    0xffff_ffff,
    0x0000_0000,
    0x0000_0001,
];

/// Barrett constant for n: floor(2^512 / n), NUM_DIGITS + 1 digits.
pub(crate) const MU_N: [Digit; NUM_DIGITS + 1] = [
    0xeedf_9bfe,
    0x012f_fd85,
    0xdf1a_6c21,
    0x4319_0552,
    0xffff_ffff,
    0xffff_fffe,
    0xffff_ffff,
    0x0000_0000,
    0x0000_0001,
];
