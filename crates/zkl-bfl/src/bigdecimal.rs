//! # Fixed-Capacity Decimals
//!
//! [`FixedDecimal`] is the reference arithmetic for the generated
//! `BigDecimal` circuit type: a sign in `{-1, 0, 1}` and two digit arrays of
//! fixed length. Integer digits are stored most significant first; fraction
//! digits start at the tenths position. With that convention the magnitude
//! order is plain lexicographic order over `integer ++ fraction`, and
//! addition/subtraction propagate carries from the last fraction digit to
//! the first integer digit.
//!
//! Overflow is never wrapped: a carry left after the most significant digit
//! is [`BigDecimalError::Overflow`], the same condition the circuit asserts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::BigDecimalError;

/// Integer digits of the default decimal type.
pub const DEFAULT_INTEGER_DIGITS: usize = 1024;
/// Fraction digits of the default decimal type.
pub const DEFAULT_FRACTION_DIGITS: usize = 128;

/// A sign-magnitude decimal over fixed digit arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixedDecimal {
    sign: i8,
    integer: Vec<u8>,
    fraction: Vec<u8>,
}

impl FixedDecimal {
    /// Zero with the given capacity.
    pub fn zero(integer_digits: usize, fraction_digits: usize) -> Self {
        Self {
            sign: 0,
            integer: vec![0; integer_digits],
            fraction: vec![0; fraction_digits],
        }
    }

    /// Assemble a decimal from its stored parts, validating every digit and
    /// that the sign agrees with the magnitude.
    pub fn from_parts(sign: i8, integer: Vec<u8>, fraction: Vec<u8>) -> Result<Self, BigDecimalError> {
        if let Some(d) = integer.iter().chain(&fraction).find(|d| **d > 9) {
            return Err(BigDecimalError::InvalidEncoding(format!("digit {d}")));
        }
        let zero = integer.iter().chain(&fraction).all(|d| *d == 0);
        match (sign, zero) {
            (0, true) | (-1 | 1, false) => Ok(Self {
                sign,
                integer,
                fraction,
            }),
            (0, false) => Err(BigDecimalError::InvalidEncoding(
                "zero sign with a non-zero magnitude".into(),
            )),
            (-1 | 1, true) => Err(BigDecimalError::InvalidEncoding(
                "signed zero".into(),
            )),
            (s, _) => Err(BigDecimalError::InvalidEncoding(format!("sign {s}"))),
        }
    }

    /// Parse a literal such as `-12.50`, `1.1` or `9e1023`.
    pub fn parse(
        literal: &str,
        integer_digits: usize,
        fraction_digits: usize,
    ) -> Result<Self, BigDecimalError> {
        let invalid = || BigDecimalError::Parse(literal.to_string());
        let body = literal.trim();
        let (negative, body) = match body.as_bytes().first() {
            Some(b'-') => (true, &body[1..]),
            Some(b'+') => (false, &body[1..]),
            _ => (false, body),
        };
        let (mantissa, exponent) = match body.find(['e', 'E']) {
            Some(at) => (
                &body[..at],
                body[at + 1..].parse::<i64>().map_err(|_| invalid())?,
            ),
            None => (body, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let mut digits = Vec::with_capacity(int_part.len() + frac_part.len());
        for c in int_part.chars().chain(frac_part.chars()) {
            digits.push(c.to_digit(10).ok_or_else(invalid)? as u8);
        }

        let exceeds = || BigDecimalError::ExceedsCapacity {
            literal: literal.to_string(),
            integer_digits,
            fraction_digits,
        };

        // Position of the decimal point within `digits`. Overflow here and
        // below means the literal is far out of range.
        let point = (int_part.len() as i64)
            .checked_add(exponent)
            .ok_or_else(exceeds)?;
        let leading = digits.iter().take_while(|d| **d == 0).count();
        digits.drain(..leading);
        while digits.last() == Some(&0) {
            digits.pop();
        }
        if digits.is_empty() {
            return Ok(Self::zero(integer_digits, fraction_digits));
        }

        let point = point.checked_sub(leading as i64).ok_or_else(exceeds)?;
        let frac_len = (digits.len() as i64).checked_sub(point).ok_or_else(exceeds)?;
        if point > integer_digits as i64 || frac_len > fraction_digits as i64 {
            return Err(exceeds());
        }

        let mut integer = vec![0; integer_digits];
        let mut fraction = vec![0; fraction_digits];
        for (k, d) in digits.into_iter().enumerate() {
            // Power-of-ten position relative to the point: 0 is the units digit.
            let position = point - 1 - k as i64;
            if position >= 0 {
                integer[integer_digits - 1 - position as usize] = d;
            } else {
                fraction[(-position - 1) as usize] = d;
            }
        }
        Ok(Self {
            sign: if negative { -1 } else { 1 },
            integer,
            fraction,
        })
    }

    pub fn sign(&self) -> i8 {
        self.sign
    }

    /// Integer digits, most significant first.
    pub fn integer(&self) -> &[u8] {
        &self.integer
    }

    /// Fraction digits, tenths first.
    pub fn fraction(&self) -> &[u8] {
        &self.fraction
    }

    /// `(integer_digits, fraction_digits)`.
    pub fn capacity(&self) -> (usize, usize) {
        (self.integer.len(), self.fraction.len())
    }

    pub fn is_zero(&self) -> bool {
        self.sign == 0
    }

    pub fn negate(&self) -> Self {
        Self {
            sign: -self.sign,
            ..self.clone()
        }
    }

    /// `self + other`.
    ///
    /// # Errors
    ///
    /// [`BigDecimalError::Overflow`] when the sum does not fit the integer
    /// digits; [`BigDecimalError::CapacityMismatch`] for operands of
    /// different types.
    pub fn plus(&self, other: &Self) -> Result<Self, BigDecimalError> {
        self.same_capacity(other)?;
        if other.sign == 0 {
            return Ok(self.clone());
        }
        if self.sign == 0 {
            return Ok(other.clone());
        }
        if self.sign == other.sign {
            let (integer, fraction) = add_magnitudes(self, other)?;
            return Ok(Self {
                sign: self.sign,
                integer,
                fraction,
            });
        }
        let (larger, smaller) = match self.compare_magnitude(other) {
            Ordering::Equal => {
                let (i, f) = self.capacity();
                return Ok(Self::zero(i, f));
            }
            Ordering::Greater => (self, other),
            Ordering::Less => (other, self),
        };
        let (integer, fraction) = subtract_magnitudes(larger, smaller);
        Ok(Self {
            sign: larger.sign,
            integer,
            fraction,
        })
    }

    /// `self - other`.
    pub fn minus(&self, other: &Self) -> Result<Self, BigDecimalError> {
        self.plus(&other.negate())
    }

    /// Numeric order of two decimals of the same type.
    pub fn compare(&self, other: &Self) -> Result<Ordering, BigDecimalError> {
        self.same_capacity(other)?;
        Ok(match self.sign.cmp(&other.sign) {
            Ordering::Equal => match self.sign {
                0 => Ordering::Equal,
                1 => self.compare_magnitude(other),
                _ => other.compare_magnitude(self),
            },
            unequal => unequal,
        })
    }

    /// Digit-array order from the most significant integer digit to the
    /// least significant fraction digit.
    pub fn compare_magnitude(&self, other: &Self) -> Ordering {
        self.integer
            .cmp(&other.integer)
            .then_with(|| self.fraction.cmp(&other.fraction))
    }

    fn same_capacity(&self, other: &Self) -> Result<(), BigDecimalError> {
        if self.capacity() == other.capacity() {
            Ok(())
        } else {
            Err(BigDecimalError::CapacityMismatch {
                left: self.capacity(),
                right: other.capacity(),
            })
        }
    }
}

fn add_magnitudes(a: &FixedDecimal, b: &FixedDecimal) -> Result<(Vec<u8>, Vec<u8>), BigDecimalError> {
    let mut carry = 0u8;
    let mut step = |x: u8, y: u8| {
        let sum = x + y + carry;
        carry = sum / 10;
        sum % 10
    };
    let mut fraction = vec![0; a.fraction.len()];
    for i in (0..fraction.len()).rev() {
        fraction[i] = step(a.fraction[i], b.fraction[i]);
    }
    let mut integer = vec![0; a.integer.len()];
    for i in (0..integer.len()).rev() {
        integer[i] = step(a.integer[i], b.integer[i]);
    }
    if carry != 0 {
        return Err(BigDecimalError::Overflow);
    }
    Ok((integer, fraction))
}

/// `larger - smaller` over magnitudes; `larger` must not be smaller.
fn subtract_magnitudes(larger: &FixedDecimal, smaller: &FixedDecimal) -> (Vec<u8>, Vec<u8>) {
    let mut borrow = 0u8;
    let mut step = |x: u8, y: u8| {
        let subtrahend = y + borrow;
        if x >= subtrahend {
            borrow = 0;
            x - subtrahend
        } else {
            borrow = 1;
            x + 10 - subtrahend
        }
    };
    let mut fraction = vec![0; larger.fraction.len()];
    for i in (0..fraction.len()).rev() {
        fraction[i] = step(larger.fraction[i], smaller.fraction[i]);
    }
    let mut integer = vec![0; larger.integer.len()];
    for i in (0..integer.len()).rev() {
        integer[i] = step(larger.integer[i], smaller.integer[i]);
    }
    (integer, fraction)
}

impl fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign < 0 {
            f.write_str("-")?;
        }
        let first = self.integer.iter().position(|d| *d != 0);
        match first {
            Some(at) => {
                for d in &self.integer[at..] {
                    write!(f, "{d}")?;
                }
            }
            None => f.write_str("0")?,
        }
        let end = self.fraction.iter().rposition(|d| *d != 0);
        if let Some(end) = end {
            f.write_str(".")?;
            for d in &self.fraction[..=end] {
                write!(f, "{d}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for FixedDecimal {
    type Err = BigDecimalError;

    /// Parse with the default capacity.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_INTEGER_DIGITS, DEFAULT_FRACTION_DIGITS)
    }
}
