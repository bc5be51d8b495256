/*!
 * Fixed-Point Arithmetic
 * 17.14 signed fixed-point numbers for the feedback scheduler
 *
 * The load average and decayed CPU usage formulas must be reproducible
 * bit-for-bit, so all arithmetic stays in integers. Products and quotients
 * of two fixed-point values go through i64 and divide (not shift) so that
 * truncation is toward zero for negative intermediates, matching C.
 */

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of fractional bits
const SHIFT: u32 = 14;

/// Scale factor (2^14)
const SCALE: i64 = 1 << SHIFT;

/// A 17.14 fixed-point number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(SCALE as i32);

    /// Convert an integer to fixed point
    #[inline]
    pub const fn from_int(n: i32) -> Self {
        Fixed(n * SCALE as i32)
    }

    /// Raw 17.14 representation
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Build from a raw 17.14 representation
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    /// Truncate toward zero to an integer
    #[inline]
    pub const fn to_int(self) -> i32 {
        (self.0 as i64 / SCALE) as i32
    }

    /// Round to the nearest integer
    #[inline]
    pub fn to_int_nearest(self) -> i32 {
        let x = self.0 as i64;
        if x >= 0 {
            ((x + SCALE / 2) / SCALE) as i32
        } else {
            ((x - SCALE / 2) / SCALE) as i32
        }
    }

    /// Multiply two fixed-point values
    #[inline]
    pub fn mul(self, rhs: Fixed) -> Fixed {
        Fixed((self.0 as i64 * rhs.0 as i64 / SCALE) as i32)
    }

    /// Divide by another fixed-point value
    #[inline]
    pub fn div(self, rhs: Fixed) -> Fixed {
        Fixed((self.0 as i64 * SCALE / rhs.0 as i64) as i32)
    }

    /// Multiply by an integer
    #[inline]
    pub fn mul_int(self, n: i32) -> Fixed {
        Fixed((self.0 as i64 * n as i64) as i32)
    }

    /// Divide by an integer
    #[inline]
    pub fn div_int(self, n: i32) -> Fixed {
        Fixed((self.0 as i64 / n as i64) as i32)
    }

    /// Add an integer
    #[inline]
    pub fn add_int(self, n: i32) -> Fixed {
        Fixed(self.0 + n * SCALE as i32)
    }
}

impl Add for Fixed {
    type Output = Fixed;
    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Fixed) {
        self.0 -= rhs.0;
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    #[inline]
    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}

impl From<i32> for Fixed {
    fn from(n: i32) -> Self {
        Fixed::from_int(n)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Two decimal places, enough for load-average style output
        let hundredths = self.mul_int(100).to_int_nearest();
        write!(f, "{}.{:02}", hundredths / 100, (hundredths % 100).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_int_round_trip() {
        for n in [-100, -1, 0, 1, 42, 63, 1000] {
            assert_eq!(Fixed::from_int(n).to_int(), n);
        }
    }

    #[test]
    fn test_truncation_toward_zero() {
        // -3/2 truncates to -1, not -2
        let x = Fixed::from_int(-3).div_int(2);
        assert_eq!(x.to_int(), -1);
        let y = Fixed::from_int(3).div_int(2);
        assert_eq!(y.to_int(), 1);
    }

    #[test]
    fn test_mul_div() {
        let half = Fixed::ONE.div_int(2);
        assert_eq!(half.mul(Fixed::from_int(10)).to_int(), 5);
        assert_eq!(Fixed::from_int(10).div(Fixed::from_int(4)).mul_int(2).to_int(), 5);
    }

    #[test]
    fn test_nearest_rounding() {
        assert_eq!(Fixed::from_int(5).div_int(2).to_int_nearest(), 3);
        assert_eq!(Fixed::from_int(-5).div_int(2).to_int_nearest(), -3);
    }

    #[test]
    fn test_display() {
        assert_eq!(Fixed::from_int(3).div_int(2).to_string(), "1.50");
    }

    proptest! {
        #[test]
        fn prop_add_sub_inverse(a in -100_000i32..100_000, b in -100_000i32..100_000) {
            let x = Fixed::from_raw(a);
            let y = Fixed::from_raw(b);
            prop_assert_eq!(x + y - y, x);
        }

        #[test]
        fn prop_int_mul_matches_repeated_add(a in -1000i32..1000, n in 0i32..16) {
            let x = Fixed::from_raw(a);
            let mut sum = Fixed::ZERO;
            for _ in 0..n {
                sum += x;
            }
            prop_assert_eq!(x.mul_int(n), sum);
        }

        #[test]
        fn prop_from_int_scale(n in -(1 << 16)..(1 << 16)) {
            prop_assert_eq!(Fixed::from_int(n).raw(), n * (1 << 14));
        }
    }
}
