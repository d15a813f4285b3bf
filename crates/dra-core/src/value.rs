use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use ordered_float::OrderedFloat;

use crate::error::CoreError;

/// The two dense ordered domains a data value may live in.
///
/// Every [`crate::sequence::Sequence`] carries exactly one of these; mixing
/// domains in a single operation is a [`CoreError::DomainMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Rational,
    Real,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Rational => write!(f, "rational"),
            Domain::Real => write!(f, "real"),
        }
    }
}

impl FromStr for Domain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rational" => Ok(Domain::Rational),
            "real" => Ok(Domain::Real),
            other => Err(CoreError::ParseValue {
                input: other.to_string(),
                domain: Domain::Real,
            }),
        }
    }
}

/// The comparator fixed for an alphabet: `EQ` (orbit-finite, unordered) or
/// `LT` (dense strict linear order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Lt,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Eq => write!(f, "="),
            Comparator::Lt => write!(f, "<"),
        }
    }
}

impl FromStr for Comparator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(Comparator::Eq),
            "<" => Ok(Comparator::Lt),
            other => Err(CoreError::ParseValue {
                input: other.to_string(),
                domain: Domain::Real,
            }),
        }
    }
}

impl Comparator {
    /// `c(x, y)` from spec §3: true iff x and y stand in the relation this
    /// comparator tests.
    pub fn holds(&self, x: &Value, y: &Value) -> bool {
        match self {
            Comparator::Eq => x == y,
            Comparator::Lt => x < y,
        }
    }
}

/// A single data value, tagged by the domain it was constructed in.
///
/// Equality and `<` are total within a domain; there is no cross-domain
/// comparison (callers check domains at the `Sequence`/`Alphabet` level).
#[derive(Debug, Clone)]
pub enum Value {
    Rational(BigRational),
    Real(OrderedFloat<f64>),
}

impl Value {
    pub fn domain(&self) -> Domain {
        match self {
            Value::Rational(_) => Domain::Rational,
            Value::Real(_) => Domain::Real,
        }
    }

    pub fn rational_from_i64(v: i64) -> Value {
        Value::Rational(BigRational::from_integer(BigInt::from(v)))
    }

    pub fn real_from_f64(v: f64) -> Value {
        Value::Real(OrderedFloat(v))
    }

    pub fn zero(domain: Domain) -> Value {
        match domain {
            Domain::Rational => Value::Rational(BigRational::zero()),
            Domain::Real => Value::Real(OrderedFloat(0.0)),
        }
    }

    /// Parses a value in the given domain: exact fraction (`"3/4"` or
    /// `"5"`) for `Rational`, floating point for `Real`.
    pub fn parse(input: &str, domain: Domain) -> Result<Value, CoreError> {
        let trimmed = input.trim();
        match domain {
            Domain::Rational => {
                let parsed = if let Some((num, den)) = trimmed.split_once('/') {
                    let num: BigInt = num.trim().parse().map_err(|_| CoreError::ParseValue {
                        input: input.to_string(),
                        domain,
                    })?;
                    let den: BigInt = den.trim().parse().map_err(|_| CoreError::ParseValue {
                        input: input.to_string(),
                        domain,
                    })?;
                    BigRational::new(num, den)
                } else {
                    let as_int: Result<BigInt, _> = trimmed.parse();
                    match as_int {
                        Ok(i) => BigRational::from_integer(i),
                        Err(_) => {
                            let as_f64: f64 = trimmed.parse().map_err(|_| CoreError::ParseValue {
                                input: input.to_string(),
                                domain,
                            })?;
                            BigRational::from_float(as_f64).ok_or_else(|| CoreError::ParseValue {
                                input: input.to_string(),
                                domain,
                            })?
                        }
                    }
                };
                Ok(Value::Rational(parsed))
            }
            Domain::Real => {
                let parsed: f64 = trimmed.parse().map_err(|_| CoreError::ParseValue {
                    input: input.to_string(),
                    domain,
                })?;
                Ok(Value::Real(OrderedFloat(parsed)))
            }
        }
    }

    /// `v + 1`, used when building a letter extension (§3).
    pub fn plus_one(&self) -> Value {
        match self {
            Value::Rational(v) => Value::Rational(v + BigRational::one()),
            Value::Real(v) => Value::Real(OrderedFloat(v.0 + 1.0)),
        }
    }

    /// `v - 1`.
    pub fn minus_one(&self) -> Value {
        match self {
            Value::Rational(v) => Value::Rational(v - BigRational::one()),
            Value::Real(v) => Value::Real(OrderedFloat(v.0 - 1.0)),
        }
    }

    /// The midpoint `(a + b) / 2`. Panics if `a` and `b` are of different
    /// domains — callers only ever call this within one sequence's domain.
    pub fn midpoint(a: &Value, b: &Value) -> Value {
        match (a, b) {
            (Value::Rational(a), Value::Rational(b)) => {
                Value::Rational((a + b) / BigRational::from_integer(BigInt::from(2)))
            }
            (Value::Real(a), Value::Real(b)) => Value::Real(OrderedFloat((a.0 + b.0) / 2.0)),
            _ => panic!("Value::midpoint called across domains"),
        }
    }

    /// Linear interpolation used by the bijective dense map: returns
    /// `oi + (v - vi) * (oj - oi) / (vj - vi)`.
    pub fn interpolate(v: &Value, vi: &Value, vj: &Value, oi: &Value, oj: &Value) -> Value {
        match (v, vi, vj, oi, oj) {
            (
                Value::Rational(v),
                Value::Rational(vi),
                Value::Rational(vj),
                Value::Rational(oi),
                Value::Rational(oj),
            ) => Value::Rational(oi + (v - vi) * (oj - oi) / (vj - vi)),
            (
                Value::Real(v),
                Value::Real(vi),
                Value::Real(vj),
                Value::Real(oi),
                Value::Real(oj),
            ) => Value::Real(OrderedFloat(oi.0 + (v.0 - vi.0) * (oj.0 - oi.0) / (vj.0 - vi.0))),
            _ => panic!("Value::interpolate called across domains"),
        }
    }

    /// Translation at the boundary, used when `v` falls outside `[v0, v_last]`.
    pub fn translate(v: &Value, from: &Value, to: &Value) -> Value {
        match (v, from, to) {
            (Value::Rational(v), Value::Rational(from), Value::Rational(to)) => {
                Value::Rational(to + (v - from))
            }
            (Value::Real(v), Value::Real(from), Value::Real(to)) => {
                Value::Real(OrderedFloat(to.0 + (v.0 - from.0)))
            }
            _ => panic!("Value::translate called across domains"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Rational(a), Value::Rational(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Rational(a), Value::Rational(b)) => a.cmp(b),
            (Value::Real(a), Value::Real(b)) => a.cmp(b),
            // Cross-domain comparisons should never be reached by a
            // well-formed sequence; order by domain tag so Value can still
            // implement Ord for use as a map key.
            (Value::Rational(_), Value::Real(_)) => Ordering::Less,
            (Value::Real(_), Value::Rational(_)) => Ordering::Greater,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Rational(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Value::Real(v) => {
                1u8.hash(state);
                v.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Rational(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{}", v.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_parses_fractions_and_integers() {
        let v = Value::parse("3/4", Domain::Rational).unwrap();
        assert_eq!(v, Value::Rational(BigRational::new(3.into(), 4.into())));
        let v = Value::parse("5", Domain::Rational).unwrap();
        assert_eq!(v, Value::rational_from_i64(5));
    }

    #[test]
    fn real_midpoint() {
        let a = Value::real_from_f64(1.0);
        let b = Value::real_from_f64(3.0);
        assert_eq!(Value::midpoint(&a, &b), Value::real_from_f64(2.0));
    }

    #[test]
    fn ordering_matches_domain() {
        let a = Value::rational_from_i64(1);
        let b = Value::rational_from_i64(2);
        assert!(a < b);
    }
}
