//! Point arithmetic on the curve in Jacobian projective coordinates.
//!
//! Doubling uses the `a = -3` shortcut `3x^2 + a z^4 = 3 (x - z^2)(x + z^2)`,
//! addition is the full Jacobian formula, and scalar multiplication is
//! most-significant-bit-first double-and-add. The point at infinity is
//! represented by `z == 0`.

use super::curve::{CURVE_B, CURVE_P, MU_P, NUM_DIGITS};
use super::vli::{self, Vli};
use std::cmp::Ordering;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct AffinePoint {
    pub(crate) x: Vli,
    pub(crate) y: Vli,
}

#[derive(Clone, Copy)]
pub(crate) struct JacobianPoint {
    x: Vli,
    y: Vli,
    z: Vli,
}

fn fmul(a: &Vli, b: &Vli) -> Vli {
    vli::mod_mult(a, b, &CURVE_P, &MU_P)
}

fn fsqr(a: &Vli) -> Vli {
    vli::mod_square(a, &CURVE_P, &MU_P)
}

fn fadd(a: &Vli, b: &Vli) -> Vli {
    vli::mod_add(a, b, &CURVE_P)
}

fn fsub(a: &Vli, b: &Vli) -> Vli {
    vli::mod_sub(a, b, &CURVE_P)
}

impl JacobianPoint {
    pub(crate) const INFINITY: Self = Self {
        x: [0; NUM_DIGITS],
        y: [0; NUM_DIGITS],
        z: [0; NUM_DIGITS],
    };

    pub(crate) fn from_affine(p: &AffinePoint) -> Self {
        let mut one = [0; NUM_DIGITS];
        one[0] = 1;
        Self { x: p.x, y: p.y, z: one }
    }

    pub(crate) fn is_infinity(&self) -> bool {
        vli::is_zero(&self.z)
    }

    /// Project back to affine coordinates. Returns `None` at infinity.
    pub(crate) fn to_affine(&self) -> Option<AffinePoint> {
        if self.is_infinity() {
            return None;
        }
        let z_inv = vli::mod_inv(&self.z, &CURVE_P);
        let z_inv2 = fsqr(&z_inv);
        let x = fmul(&self.x, &z_inv2);
        let y = fmul(&self.y, &fmul(&z_inv2, &z_inv));
        Some(AffinePoint { x, y })
    }

    pub(crate) fn double(&mut self) {
        if self.is_infinity() || vli::is_zero(&self.y) {
            *self = Self::INFINITY;
            return;
        }
        let z2 = fsqr(&self.z);
        let y2 = fsqr(&self.y);
        // s = 4 x y^2
        let s = {
            let t = fmul(&self.x, &y2);
            let t = fadd(&t, &t);
            fadd(&t, &t)
        };
        // m = 3 (x - z^2)(x + z^2)
        let m = {
            let t = fmul(&fsub(&self.x, &z2), &fadd(&self.x, &z2));
            fadd(&fadd(&t, &t), &t)
        };
        let x_out = fsub(&fsqr(&m), &fadd(&s, &s));
        // y' = m (s - x') - 8 y^4
        let y4_8 = {
            let t = fsqr(&y2);
            let t = fadd(&t, &t);
            let t = fadd(&t, &t);
            fadd(&t, &t)
        };
        let y_out = fsub(&fmul(&m, &fsub(&s, &x_out)), &y4_8);
        let z_out = {
            let t = fmul(&self.y, &self.z);
            fadd(&t, &t)
        };
        self.x = x_out;
        self.y = y_out;
        self.z = z_out;
    }

    pub(crate) fn add(&mut self, other: &JacobianPoint) {
        if other.is_infinity() {
            return;
        }
        if self.is_infinity() {
            *self = *other;
            return;
        }
        let z1z1 = fsqr(&self.z);
        let z2z2 = fsqr(&other.z);
        let u1 = fmul(&self.x, &z2z2);
        let u2 = fmul(&other.x, &z1z1);
        let s1 = fmul(&self.y, &fmul(&other.z, &z2z2));
        let s2 = fmul(&other.y, &fmul(&self.z, &z1z1));

        if u1 == u2 {
            if s1 == s2 {
                self.double();
            } else {
                *self = Self::INFINITY;
            }
            return;
        }

        let h = fsub(&u2, &u1);
        let r = fsub(&s2, &s1);
        let hh = fsqr(&h);
        let hhh = fmul(&h, &hh);
        let v = fmul(&u1, &hh);

        let x_out = fsub(&fsub(&fsqr(&r), &hhh), &fadd(&v, &v));
        let y_out = fsub(&fmul(&r, &fsub(&v, &x_out)), &fmul(&s1, &hhh));
        let z_out = fmul(&fmul(&self.z, &other.z), &h);
        self.x = x_out;
        self.y = y_out;
        self.z = z_out;
    }
}

/// `scalar * point`. The zero scalar yields infinity.
pub(crate) fn scalar_mult(point: &AffinePoint, scalar: &Vli) -> JacobianPoint {
    let bits = vli::num_bits(scalar);
    if bits == 0 {
        return JacobianPoint::INFINITY;
    }
    let base = JacobianPoint::from_affine(point);
    let mut result = base;
    for bit in (0..bits.saturating_sub(1)).rev() {
        result.double();
        if vli::test_bit(scalar, bit) {
            result.add(&base);
        }
    }
    result
}

/// Curve membership: both coordinates below p, not the zero point, and
/// `y^2 == x^3 - 3x + b`.
pub(crate) fn is_on_curve(p: &AffinePoint) -> bool {
    if vli::is_zero(&p.x) && vli::is_zero(&p.y) {
        return false;
    }
    if vli::cmp(&p.x, &CURVE_P) != Ordering::Less || vli::cmp(&p.y, &CURVE_P) != Ordering::Less {
        return false;
    }
    let lhs = fsqr(&p.y);
    let x3 = fmul(&fsqr(&p.x), &p.x);
    let three_x = fadd(&fadd(&p.x, &p.x), &p.x);
    let rhs = fadd(&fsub(&x3, &three_x), &CURVE_B);
    lhs == rhs
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
