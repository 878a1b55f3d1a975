//! Fixed-width little-endian digit vectors ("very long integers").
//!
//! The curve layer works on `NUM_DIGITS` u32 digits, least-significant digit
//! first. Reduction modulo the field prime and the curve order both go
//! through Barrett reduction with precomputed `floor(2^(64*NUM_DIGITS) / m)`
//! constants, so the same code path serves any curve of this digit width.

// Carry propagation and schoolbook index math below intentionally use
// wrapping/overflowing digit semantics.
#![allow(clippy::arithmetic_side_effects)]

use super::curve::NUM_DIGITS;
use std::cmp::Ordering;

pub(crate) type Digit = u32;

/// One field element / scalar: NUM_DIGITS little-endian u32 digits.
pub(crate) type Vli = [Digit; NUM_DIGITS];

/// A full multiplication product: twice the digit width.
pub(crate) type DoubleVli = [Digit; 2 * NUM_DIGITS];

/// Coordinate width in bytes.
pub(crate) const COORD_BYTES: usize = NUM_DIGITS * 4;

pub(crate) fn is_zero(v: &[Digit]) -> bool {
    v.iter().all(|&d| d == 0)
}

/// Whether bit `bit` (0 = LSB) is set.
pub(crate) fn test_bit(v: &Vli, bit: usize) -> bool {
    v[bit / 32] & (1u32 << (bit % 32)) != 0
}

/// Number of significant bits.
pub(crate) fn num_bits(v: &Vli) -> usize {
    for (i, &d) in v.iter().enumerate().rev() {
        if d != 0 {
            return i * 32 + (32 - d.leading_zeros() as usize);
        }
    }
    0
}

/// Compare two equal-length digit slices as integers.
pub(crate) fn cmp(left: &[Digit], right: &[Digit]) -> Ordering {
    debug_assert_eq!(left.len(), right.len());
    for (&l, &r) in left.iter().rev().zip(right.iter().rev()) {
        match l.cmp(&r) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// `result = left + right`, returning the carry digit. Equal lengths; may
/// alias.
pub(crate) fn add(result: &mut [Digit], left: &[Digit], right: &[Digit]) -> Digit {
    let mut carry = 0u64;
    for (i, dst) in result.iter_mut().enumerate() {
        let sum = u64::from(left[i]) + u64::from(right[i]) + carry;
        *dst = sum as Digit;
        carry = sum >> 32;
    }
    carry as Digit
}

/// `result = left - right`, returning the borrow digit. Equal lengths; may
/// alias.
pub(crate) fn sub(result: &mut [Digit], left: &[Digit], right: &[Digit]) -> Digit {
    let mut borrow = 0u32;
    for (i, dst) in result.iter_mut().enumerate() {
        let (d1, b1) = left[i].overflowing_sub(right[i]);
        let (d2, b2) = d1.overflowing_sub(borrow);
        *dst = d2;
        borrow = u32::from(b1) | u32::from(b2);
    }
    borrow
}

/// `dst -= right` in place, returning the borrow digit.
pub(crate) fn sub_assign(dst: &mut [Digit], right: &[Digit]) -> Digit {
    let mut borrow = 0u32;
    for (d, &r) in dst.iter_mut().zip(right.iter()) {
        let (d1, b1) = d.overflowing_sub(r);
        let (d2, b2) = d1.overflowing_sub(borrow);
        *d = d2;
        borrow = u32::from(b1) | u32::from(b2);
    }
    borrow
}

/// Halve in place: `v >>= 1`.
pub(crate) fn rshift1(v: &mut [Digit]) {
    let mut carry = 0u32;
    for d in v.iter_mut().rev() {
        let next_carry = *d << 31;
        *d = (*d >> 1) | carry;
        carry = next_carry;
    }
}

/// Schoolbook multiplication over `word_size` digits with a 64-bit column
/// accumulator and explicit high-digit carry, after the original engine.
/// `result[..2 * word_size]` receives the product.
pub(crate) fn mult(result: &mut [Digit], left: &[Digit], right: &[Digit], word_size: usize) {
    let mut r01 = 0u64;
    let mut r2 = 0u32;

    for k in 0..(2 * word_size - 1) {
        let min = if k < word_size { 0 } else { k + 1 - word_size };
        for i in min..=k.min(word_size - 1) {
            let product = u64::from(left[i]) * u64::from(right[k - i]);
            r01 = r01.wrapping_add(product);
            r2 = r2.wrapping_add(u32::from(r01 < product));
        }
        result[k] = r01 as Digit;
        r01 = (r01 >> 32) | (u64::from(r2) << 32);
        r2 = 0;
    }
    result[2 * word_size - 1] = r01 as Digit;
}

/// `result = left^2` over NUM_DIGITS digits, exploiting product symmetry.
pub(crate) fn square(result: &mut DoubleVli, left: &Vli) {
    let mut r01 = 0u64;
    let mut r2 = 0u32;

    for k in 0..(2 * NUM_DIGITS - 1) {
        let min = if k < NUM_DIGITS { 0 } else { k + 1 - NUM_DIGITS };
        for i in min..=k.min(NUM_DIGITS - 1) {
            if i > k - i {
                break;
            }
            let mut product = u64::from(left[i]) * u64::from(left[k - i]);
            if i < k - i {
                r2 = r2.wrapping_add((product >> 63) as u32);
                product = product.wrapping_mul(2);
            }
            r01 = r01.wrapping_add(product);
            r2 = r2.wrapping_add(u32::from(r01 < product));
        }
        result[k] = r01 as Digit;
        r01 = (r01 >> 32) | (u64::from(r2) << 32);
        r2 = 0;
    }
    result[2 * NUM_DIGITS - 1] = r01 as Digit;
}

/// `(left + right) mod m`. Assumes both operands are already `< m`.
pub(crate) fn mod_add(left: &Vli, right: &Vli, modulus: &Vli) -> Vli {
    let mut result = [0; NUM_DIGITS];
    let carry = add(&mut result, left, right);
    if carry != 0 || cmp(&result, modulus) != Ordering::Less {
        sub_assign(&mut result, modulus);
    }
    result
}

/// `(left - right) mod m`. Assumes both operands are already `< m`.
pub(crate) fn mod_sub(left: &Vli, right: &Vli, modulus: &Vli) -> Vli {
    let mut result = [0; NUM_DIGITS];
    let borrow = sub(&mut result, left, right);
    if borrow != 0 {
        let tmp = result;
        add(&mut result, &tmp, modulus);
    }
    result
}

/// Barrett reduction (HAC 14.42): `product mod m` for any product
/// `< 2^(64 * NUM_DIGITS)`, using `mu = floor(2^(64 * NUM_DIGITS) / m)`
/// precomputed as `NUM_DIGITS + 1` digits.
pub(crate) fn barrett_mod(product: &DoubleVli, modulus: &Vli, mu: &[Digit; NUM_DIGITS + 1]) -> Vli {
    let mut q1 = [0 as Digit; NUM_DIGITS + 1];
    let mut q2 = [0 as Digit; 2 * NUM_DIGITS + 2];
    let mut wide_mod = [0 as Digit; NUM_DIGITS + 1];
    let mut work = [0 as Digit; 2 * NUM_DIGITS + 2];

    // q1 = floor(product / 2^(32 * (NUM_DIGITS - 1)))
    q1.copy_from_slice(&product[NUM_DIGITS - 1..]);

    // q3 = floor(q1 * mu / 2^(32 * (NUM_DIGITS + 1))), reusing q1.
    mult(&mut q2, &q1, mu, NUM_DIGITS + 1);
    q1.copy_from_slice(&q2[NUM_DIGITS + 1..]);

    wide_mod[..NUM_DIGITS].copy_from_slice(modulus);

    // work = product - q3 * m, then subtract m until below it.
    mult(&mut q2, &q1, &wide_mod, NUM_DIGITS + 1);
    work[..2 * NUM_DIGITS].copy_from_slice(product);
    sub_assign(&mut work[..2 * NUM_DIGITS], &q2[..2 * NUM_DIGITS]);
    while cmp(&work[..NUM_DIGITS + 1], &wide_mod) != Ordering::Less {
        sub_assign(&mut work[..NUM_DIGITS + 1], &wide_mod);
    }

    let mut result = [0; NUM_DIGITS];
    result.copy_from_slice(&work[..NUM_DIGITS]);
    result
}

/// `(left * right) mod m` via Barrett.
pub(crate) fn mod_mult(left: &Vli, right: &Vli, modulus: &Vli, mu: &[Digit; NUM_DIGITS + 1]) -> Vli {
    let mut product = [0; 2 * NUM_DIGITS];
    mult(&mut product, left, right, NUM_DIGITS);
    barrett_mod(&product, modulus, mu)
}

/// `left^2 mod m` via Barrett.
pub(crate) fn mod_square(left: &Vli, modulus: &Vli, mu: &[Digit; NUM_DIGITS + 1]) -> Vli {
    let mut product = [0; 2 * NUM_DIGITS];
    square(&mut product, left);
    barrett_mod(&product, modulus, mu)
}

fn is_even(v: &Vli) -> bool {
    v[0] & 1 == 0
}

/// Modular inverse by the binary extended-Euclid ("great divide") algorithm.
/// `input` must be nonzero and coprime with `modulus`.
pub(crate) fn mod_inv(input: &Vli, modulus: &Vli) -> Vli {
    let mut a = *input;
    let mut b = *modulus;
    let mut u: Vli = [0; NUM_DIGITS];
    u[0] = 1;
    let mut v: Vli = [0; NUM_DIGITS];

    loop {
        let ord = cmp(&a, &b);
        if ord == Ordering::Equal {
            break;
        }
        if is_even(&a) {
            rshift1(&mut a);
            half_mod(&mut u, modulus);
        } else if is_even(&b) {
            rshift1(&mut b);
            half_mod(&mut v, modulus);
        } else if ord == Ordering::Greater {
            sub_assign(&mut a, &b);
            rshift1(&mut a);
            if cmp(&u, &v) == Ordering::Less {
                let tmp = u;
                add(&mut u, &tmp, modulus);
            }
            sub_assign(&mut u, &v);
            half_mod(&mut u, modulus);
        } else {
            sub_assign(&mut b, &a);
            rshift1(&mut b);
            if cmp(&v, &u) == Ordering::Less {
                let tmp = v;
                add(&mut v, &tmp, modulus);
            }
            sub_assign(&mut v, &u);
            half_mod(&mut v, modulus);
        }
    }
    u
}

/// Halve a working value modulo `modulus`: if odd, add the modulus first,
/// carrying the overflow bit back in after the shift.
fn half_mod(v: &mut Vli, modulus: &Vli) {
    let mut carry = 0;
    if !is_even(v) {
        let tmp = *v;
        carry = add(v, &tmp, modulus);
    }
    rshift1(v);
    if carry != 0 {
        v[NUM_DIGITS - 1] |= 0x8000_0000;
    }
}

// ---------------------------------------------------------------------------
// Byte conversions (big-endian wire order)
// ---------------------------------------------------------------------------

pub(crate) fn from_be_bytes(bytes: &[u8; COORD_BYTES]) -> Vli {
    let mut v = [0; NUM_DIGITS];
    for (i, chunk) in bytes.chunks_exact(4).rev().enumerate() {
        v[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    v
}

pub(crate) fn to_be_bytes(v: &Vli) -> [u8; COORD_BYTES] {
    let mut out = [0u8; COORD_BYTES];
    for (chunk, digit) in out.chunks_exact_mut(4).rev().zip(v.iter()) {
        chunk.copy_from_slice(&digit.to_be_bytes());
    }
    out
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
