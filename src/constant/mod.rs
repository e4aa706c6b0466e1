//! Exact compile-time values. Integers are arbitrary precision and floats are
//! held as exact rationals, so folding never rounds. Untyped integers are
//! limited to `MAX_INT_BITS` bits; larger results are reported as overflows.

use crate::ast::{BinaryOp, LitKind, UnaryOp};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use paste::paste;
use std::fmt;
use ustr::{ustr, Ustr};

/// The largest untyped integer constant, in bits.
pub const MAX_INT_BITS: u64 = 512;

/// Bounds the numerator and denominator of a float constant.
const MAX_FLOAT_BITS: u64 = 16_384;

/// Bounds the decimal exponent of a float literal.
const MAX_EXPONENT: i64 = 10_000;

macro_rules! impl_value {
    ($($variant:ident($ty:ty)) , + $(,)?) => {
        #[derive(Debug, PartialEq, Eq, Clone, Copy)]
        pub enum ConstValueKind {
            $(
                $variant
            ),+
        }

        impl fmt::Display for ConstValueKind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", match self {
                    $(
                        ConstValueKind::$variant => stringify!($variant)
                    ),+
                })
            }
        }

        #[derive(Debug, PartialEq, Eq, Clone)]
        pub enum ConstValue {
            $(
                $variant($ty)
            ),+
        }

        impl ConstValue {
            pub fn kind(&self) -> ConstValueKind {
                match self {
                    $(
                        ConstValue::$variant(_) => ConstValueKind::$variant
                    ),+
                }
            }

            paste! {
                $(
                    pub fn [<is_ $variant:snake>](&self) -> bool {
                        matches!(self, Self::$variant(_))
                    }
                )+

                $(
                    pub fn [<as_ $variant:snake>](&self) -> Option<&$ty> {
                        match self {
                            Self::$variant(v) => Some(v),
                            _ => None,
                        }
                    }
                )+
            }
        }
    };
}

impl_value! {
    Unknown(()),
    Bool(bool),
    Int(BigInt),
    Float(BigRational),
    Str(Ustr),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum FoldError {
    #[error("constant overflow")]
    Overflow,
    #[error("division by zero")]
    DivByZero,
    #[error("invalid constant operation")]
    Invalid,
}

pub type FoldResult = Result<ConstValue, FoldError>;

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Unknown(_) => write!(f, "unknown"),
            ConstValue::Bool(v) => write!(f, "{}", v),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => {
                let approx = v.to_f64().unwrap_or(f64::NAN);
                if v.is_integer() && approx.abs() < 1e21 {
                    write!(f, "{}", v.to_integer())
                } else if approx.is_finite() && approx.abs() < 1e21 {
                    write!(f, "{}", approx)
                } else if approx.is_finite() {
                    write!(f, "{:e}", approx)
                } else {
                    write!(f, "{}", v)
                }
            }
            ConstValue::Str(v) => write!(f, "{:?}", v.as_str()),
        }
    }
}

impl ConstValue {
    pub fn unknown() -> Self {
        ConstValue::Unknown(())
    }

    pub fn int<T: Into<BigInt>>(v: T) -> Self {
        ConstValue::Int(v.into())
    }

    /// Parses a literal as it appears in source.
    pub fn from_literal(kind: LitKind, raw: &str) -> FoldResult {
        match kind {
            LitKind::Int => parse_int(raw).map(ConstValue::Int),
            LitKind::Float => parse_float(raw).map(ConstValue::Float),
            LitKind::Char => {
                let inner = raw
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .ok_or(FoldError::Invalid)?;
                let chars = unquote(inner, '\'')?;
                match chars.as_slice() {
                    [c] => Ok(ConstValue::int(*c as u32)),
                    _ => Err(FoldError::Invalid),
                }
            }
            LitKind::String => {
                if let Some(inner) = raw.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
                    return Ok(ConstValue::Str(ustr(&inner.replace('\r', ""))));
                }

                let inner = raw
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .ok_or(FoldError::Invalid)?;
                let chars = unquote(inner, '"')?;
                Ok(ConstValue::Str(ustr(&chars.into_iter().collect::<String>())))
            }
        }
    }

    pub fn is_known(&self) -> bool {
        !self.is_unknown()
    }

    /// The value as an integer, if it is one exactly.
    pub fn to_int(&self) -> Option<ConstValue> {
        match self {
            ConstValue::Int(_) => Some(self.clone()),
            ConstValue::Float(v) if v.is_integer() => Some(ConstValue::Int(v.to_integer())),
            _ => None,
        }
    }

    pub fn to_float(&self) -> Option<ConstValue> {
        match self {
            ConstValue::Int(v) => Some(ConstValue::Float(BigRational::from_integer(v.clone()))),
            ConstValue::Float(_) => Some(self.clone()),
            _ => None,
        }
    }

    /// The exact integer value, if the value is integral.
    pub fn big_int(&self) -> Option<BigInt> {
        match self.to_int() {
            Some(ConstValue::Int(v)) => Some(v),
            _ => None,
        }
    }

    /// The exact rational value of a numeric constant.
    pub fn rational(&self) -> Option<BigRational> {
        match self.to_float() {
            Some(ConstValue::Float(v)) => Some(v),
            _ => None,
        }
    }

    /// The integer value, if it is integral and fits in 64 bits.
    pub fn int_val(&self) -> Option<i64> {
        self.big_int()?.to_i64()
    }

    /// The nearest `f64`, which may be infinite.
    pub fn float_val(&self) -> Option<f64> {
        self.rational()?.to_f64()
    }

    pub fn bool_val(&self) -> Option<bool> {
        self.as_bool().copied()
    }

    pub fn str_val(&self) -> Option<Ustr> {
        self.as_str().copied()
    }

    pub fn is_zero(&self) -> bool {
        match self {
            ConstValue::Int(v) => v.is_zero(),
            ConstValue::Float(v) => v.is_zero(),
            _ => false,
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            ConstValue::Int(v) => v.is_negative(),
            ConstValue::Float(v) => v.is_negative(),
            _ => false,
        }
    }

    /// Reports whether an integer value fits in `bits` bits.
    pub fn fits_int(&self, bits: u32, signed: bool) -> bool {
        let v = match self {
            ConstValue::Int(v) => v,
            _ => return false,
        };

        if signed {
            let bound = BigInt::one() << (bits as usize - 1);
            *v >= -bound.clone() && *v < bound
        } else {
            !v.is_negative() && *v < (BigInt::one() << bits as usize)
        }
    }

    /// Rounds a numeric value to the nearest `f64`, or `f32` when `single`.
    /// `None` means the rounded value is infinite.
    pub fn round_float(&self, single: bool) -> Option<ConstValue> {
        let f = self.float_val()?;
        let rounded = if single {
            let s = f as f32;
            if !s.is_finite() {
                return None;
            }
            s as f64
        } else {
            f
        };
        BigRational::from_float(rounded).map(ConstValue::Float)
    }

    /// Applies a unary operator. `unsigned_bits` is the width of the operand's
    /// type when it is a typed unsigned integer, which `^` needs to stay in range.
    pub fn unary(op: UnaryOp, x: &ConstValue, unsigned_bits: Option<u32>) -> FoldResult {
        match (op, x) {
            (_, ConstValue::Unknown(_)) => Ok(x.clone()),
            (UnaryOp::Plus, ConstValue::Int(_) | ConstValue::Float(_)) => Ok(x.clone()),
            (UnaryOp::Neg, ConstValue::Int(v)) => Ok(ConstValue::Int(-v)),
            (UnaryOp::Neg, ConstValue::Float(v)) => Ok(ConstValue::Float(-v)),
            (UnaryOp::Not, ConstValue::Bool(v)) => Ok(ConstValue::Bool(!v)),
            (UnaryOp::BitNot, ConstValue::Int(v)) => match unsigned_bits {
                Some(bits) => {
                    let mask = (BigInt::one() << bits as usize) - 1;
                    Ok(ConstValue::Int(!v & mask))
                }
                None => Ok(ConstValue::Int(!v)),
            },
            _ => Err(FoldError::Invalid),
        }
    }

    /// Applies a non-shift binary operator. Division of two integers is
    /// integer division when `int_div` is set.
    pub fn binary(x: &ConstValue, op: BinaryOp, y: &ConstValue, int_div: bool) -> FoldResult {
        if x.is_unknown() || y.is_unknown() {
            return Ok(ConstValue::unknown());
        }

        if op.is_comparison() {
            return ConstValue::compare(x, op, y).map(ConstValue::Bool);
        }

        match (x, y) {
            (ConstValue::Bool(a), ConstValue::Bool(b)) => match op {
                BinaryOp::And => Ok(ConstValue::Bool(*a && *b)),
                BinaryOp::Or => Ok(ConstValue::Bool(*a || *b)),
                _ => Err(FoldError::Invalid),
            },
            (ConstValue::Str(a), ConstValue::Str(b)) => match op {
                BinaryOp::Add => Ok(ConstValue::Str(ustr(&format!("{}{}", a, b)))),
                _ => Err(FoldError::Invalid),
            },
            (ConstValue::Int(a), ConstValue::Int(b)) if op != BinaryOp::Div || int_div => int_binary(a, op, b),
            _ => match (x.rational(), y.rational()) {
                (Some(a), Some(b)) => float_binary(&a, op, &b),
                _ => Err(FoldError::Invalid),
            },
        }
    }

    pub fn shift(x: &ConstValue, op: BinaryOp, s: u32) -> FoldResult {
        let v = match x {
            ConstValue::Unknown(_) => return Ok(x.clone()),
            _ => x.big_int().ok_or(FoldError::Invalid)?,
        };

        match op {
            BinaryOp::Shl => {
                if v.is_zero() {
                    return Ok(ConstValue::int(0));
                }
                if v.bits() + s as u64 > MAX_INT_BITS {
                    return Err(FoldError::Overflow);
                }
                Ok(ConstValue::Int(v << s as usize))
            }
            // Rounds toward negative infinity like an arithmetic shift.
            BinaryOp::Shr => Ok(ConstValue::Int(v >> s as usize)),
            _ => Err(FoldError::Invalid),
        }
    }

    pub fn compare(x: &ConstValue, op: BinaryOp, y: &ConstValue) -> Result<bool, FoldError> {
        use std::cmp::Ordering;

        let ord = match (x, y) {
            (ConstValue::Bool(a), ConstValue::Bool(b)) => match op {
                BinaryOp::Eq => return Ok(a == b),
                BinaryOp::Ne => return Ok(a != b),
                _ => return Err(FoldError::Invalid),
            },
            (ConstValue::Str(a), ConstValue::Str(b)) => a.as_str().cmp(b.as_str()),
            (ConstValue::Int(a), ConstValue::Int(b)) => a.cmp(b),
            _ => match (x.rational(), y.rational()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => return Err(FoldError::Invalid),
            },
        };

        Ok(match op {
            BinaryOp::Eq => ord == Ordering::Equal,
            BinaryOp::Ne => ord != Ordering::Equal,
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::Le => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            BinaryOp::Ge => ord != Ordering::Less,
            _ => return Err(FoldError::Invalid),
        })
    }
}

fn int_binary(a: &BigInt, op: BinaryOp, b: &BigInt) -> FoldResult {
    let r = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b.is_zero() => return Err(FoldError::DivByZero),
        // Both truncate toward zero.
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::AndNot => a & !b,
        _ => return Err(FoldError::Invalid),
    };

    if r.bits() > MAX_INT_BITS {
        return Err(FoldError::Overflow);
    }
    Ok(ConstValue::Int(r))
}

fn float_binary(a: &BigRational, op: BinaryOp, b: &BigRational) -> FoldResult {
    let r = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b.is_zero() => return Err(FoldError::DivByZero),
        BinaryOp::Div => a / b,
        _ => return Err(FoldError::Invalid),
    };

    if r.numer().bits() > MAX_FLOAT_BITS || r.denom().bits() > MAX_FLOAT_BITS {
        return Err(FoldError::Overflow);
    }
    Ok(ConstValue::Float(r))
}

fn parse_int(raw: &str) -> Result<BigInt, FoldError> {
    let cleaned = raw.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();

    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(FoldError::Invalid);
    }

    BigInt::parse_bytes(digits.as_bytes(), radix).ok_or(FoldError::Invalid)
}

/// Parses a decimal or hexadecimal float literal into its exact value.
fn parse_float(raw: &str) -> Result<BigRational, FoldError> {
    let cleaned = raw.replace('_', "").to_ascii_lowercase();

    let (mantissa, exp, radix, exp_base) = if let Some(rest) = cleaned.strip_prefix("0x") {
        let (m, e) = rest.split_once('p').ok_or(FoldError::Invalid)?;
        (m, e, 16, 2u32)
    } else {
        match cleaned.split_once('e') {
            Some((m, e)) => (m, e, 10, 10u32),
            None => (cleaned.as_str(), "0", 10, 10u32),
        }
    };

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{}{}", int_part, frac_part);
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(FoldError::Invalid);
    }

    let exp: i64 = exp.parse().map_err(|_| FoldError::Invalid)?;
    if exp.abs() > MAX_EXPONENT {
        return Err(FoldError::Overflow);
    }

    let numer = BigInt::parse_bytes(digits.as_bytes(), radix).ok_or(FoldError::Invalid)?;
    let mut value = BigRational::new(numer, BigInt::from(radix).pow(frac_part.len() as u32));

    let scale = BigRational::from_integer(BigInt::from(exp_base).pow(exp.unsigned_abs() as u32));
    if exp >= 0 {
        value *= scale;
    } else {
        value /= scale;
    }

    Ok(value)
}

fn unquote(s: &str, quote: char) -> Result<Vec<char>, FoldError> {
    let mut out = vec![];
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let esc = chars.next().ok_or(FoldError::Invalid)?;
        let c = match esc {
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{b}',
            '\\' => '\\',
            c if c == quote => c,
            'x' | 'u' | 'U' => {
                let n = match esc {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = (0..n).filter_map(|_| chars.next()).collect();
                let v = u32::from_str_radix(&hex, 16).map_err(|_| FoldError::Invalid)?;
                char::from_u32(v).ok_or(FoldError::Invalid)?
            }
            '0'..='7' => {
                let mut v = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    let d = chars
                        .next()
                        .and_then(|c| c.to_digit(8))
                        .ok_or(FoldError::Invalid)?;
                    v = v * 8 + d;
                }
                char::from_u32(v).ok_or(FoldError::Invalid)?
            }
            _ => return Err(FoldError::Invalid),
        };
        out.push(c);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(raw: &str) -> ConstValue {
        ConstValue::from_literal(LitKind::Float, raw).unwrap()
    }

    #[test]
    fn parses_integer_literals() {
        assert_eq!(ConstValue::from_literal(LitKind::Int, "42"), Ok(ConstValue::int(42)));
        assert_eq!(ConstValue::from_literal(LitKind::Int, "0x_ff"), Ok(ConstValue::int(255)));
        assert_eq!(ConstValue::from_literal(LitKind::Int, "017"), Ok(ConstValue::int(15)));
        assert_eq!(ConstValue::from_literal(LitKind::Int, "0b101"), Ok(ConstValue::int(5)));
        assert_eq!(ConstValue::from_literal(LitKind::Int, "0"), Ok(ConstValue::int(0)));

        let huge = ConstValue::from_literal(LitKind::Int, "340282366920938463463374607431768211456").unwrap();
        assert_eq!(huge, ConstValue::Int(BigInt::one() << 128usize));
    }

    #[test]
    fn parses_float_literals_exactly() {
        assert_eq!(float("0.5"), ConstValue::Float(BigRational::new(1.into(), 2.into())));
        assert_eq!(float("1e3"), ConstValue::Float(BigRational::from_integer(1000.into())));
        assert_eq!(float("25e-2"), ConstValue::Float(BigRational::new(1.into(), 4.into())));
        assert_eq!(float("0x1p-2"), ConstValue::Float(BigRational::new(1.into(), 4.into())));
        assert_eq!(ConstValue::from_literal(LitKind::Float, "1e100000"), Err(FoldError::Overflow));
    }

    #[test]
    fn parses_rune_and_string_literals() {
        assert_eq!(ConstValue::from_literal(LitKind::Char, "'a'"), Ok(ConstValue::int(97)));
        assert_eq!(ConstValue::from_literal(LitKind::Char, "'\\n'"), Ok(ConstValue::int(10)));
        assert_eq!(
            ConstValue::from_literal(LitKind::String, "\"a\\tb\""),
            Ok(ConstValue::Str(ustr("a\tb")))
        );
        assert_eq!(
            ConstValue::from_literal(LitKind::String, "`a\\tb`"),
            Ok(ConstValue::Str(ustr("a\\tb")))
        );
    }

    #[test]
    fn decimal_fractions_add_exactly() {
        let sum = ConstValue::binary(&float("0.1"), BinaryOp::Add, &float("0.2"), false).unwrap();
        assert_eq!(ConstValue::compare(&sum, BinaryOp::Eq, &float("0.3")), Ok(true));
    }

    #[test]
    fn shifts_are_exact() {
        let one = ConstValue::int(1);
        let big = ConstValue::shift(&one, BinaryOp::Shl, 200).unwrap();
        assert_eq!(big, ConstValue::Int(BigInt::one() << 200usize));
        assert_eq!(ConstValue::shift(&big, BinaryOp::Shr, 190), Ok(ConstValue::int(1024)));
        assert_eq!(ConstValue::shift(&one, BinaryOp::Shl, 600), Err(FoldError::Overflow));
        assert_eq!(
            ConstValue::shift(&ConstValue::int(-8), BinaryOp::Shr, 200),
            Ok(ConstValue::int(-1))
        );
    }

    #[test]
    fn arithmetic_overflow_is_reported() {
        let max = ConstValue::Int((BigInt::one() << 511usize) * 2 - 1);
        assert_eq!(
            ConstValue::binary(&max, BinaryOp::Add, &ConstValue::int(1), true),
            Err(FoldError::Overflow)
        );
        assert_eq!(
            ConstValue::binary(&ConstValue::int(1), BinaryOp::Div, &ConstValue::int(0), true),
            Err(FoldError::DivByZero)
        );
    }

    #[test]
    fn division_follows_operand_kind() {
        let seven = ConstValue::int(7);
        let two = ConstValue::int(2);
        assert_eq!(ConstValue::binary(&seven, BinaryOp::Div, &two, true), Ok(ConstValue::int(3)));
        assert_eq!(
            ConstValue::binary(&seven, BinaryOp::Div, &two, false),
            Ok(ConstValue::Float(BigRational::new(7.into(), 2.into())))
        );
        assert_eq!(
            ConstValue::binary(&ConstValue::int(-7), BinaryOp::Rem, &two, true),
            Ok(ConstValue::int(-1))
        );
    }

    #[test]
    fn representability_by_width() {
        assert!(ConstValue::int(127).fits_int(8, true));
        assert!(!ConstValue::int(128).fits_int(8, true));
        assert!(ConstValue::int(-128).fits_int(8, true));
        assert!(ConstValue::int(255).fits_int(8, false));
        assert!(!ConstValue::int(-1).fits_int(64, false));
        assert!(!ConstValue::Int(BigInt::one() << 100usize).fits_int(32, true));
    }

    #[test]
    fn rounding_to_float_types() {
        let tenth = float("0.1");
        let rounded = tenth.round_float(false).unwrap();
        assert_ne!(rounded, tenth);
        assert_eq!(rounded.float_val(), Some(0.1));
        assert_eq!(float("1e300").round_float(true), None);
    }

    #[test]
    fn complement_of_unsigned_is_masked() {
        assert_eq!(
            ConstValue::unary(UnaryOp::BitNot, &ConstValue::int(0), Some(8)),
            Ok(ConstValue::int(255))
        );
        assert_eq!(
            ConstValue::unary(UnaryOp::BitNot, &ConstValue::int(0), None),
            Ok(ConstValue::int(-1))
        );
    }
}
