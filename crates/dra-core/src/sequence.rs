use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;

use crate::error::CoreError;
use crate::value::{Comparator, Domain, Value};

/// A finite ordered list of values, all from the same [`Domain`].
///
/// Grounded on `original_source/alphabet.py`'s `LetterSeq`. Rust folds the
/// Python `Letter` (a value plus a domain tag) into the values carried by
/// `Sequence` itself, since every letter in a sequence shares one domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    domain: Domain,
    values: Vec<Value>,
}

impl Sequence {
    pub fn empty(domain: Domain) -> Sequence {
        Sequence {
            domain,
            values: Vec::new(),
        }
    }

    /// Builds a sequence from values, checking they all match `domain`.
    pub fn new(domain: Domain, values: Vec<Value>) -> Result<Sequence, CoreError> {
        for v in &values {
            if v.domain() != domain {
                return Err(CoreError::DomainMismatch {
                    expected: domain,
                    found: v.domain(),
                });
            }
        }
        Ok(Sequence { domain, values })
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    pub fn append(&self, v: Value) -> Result<Sequence, CoreError> {
        if v.domain() != self.domain {
            return Err(CoreError::DomainMismatch {
                expected: self.domain,
                found: v.domain(),
            });
        }
        let mut values = self.values.clone();
        values.push(v);
        Ok(Sequence {
            domain: self.domain,
            values,
        })
    }

    pub fn prepend(&self, v: Value) -> Result<Sequence, CoreError> {
        if v.domain() != self.domain {
            return Err(CoreError::DomainMismatch {
                expected: self.domain,
                found: v.domain(),
            });
        }
        let mut values = Vec::with_capacity(self.values.len() + 1);
        values.push(v);
        values.extend(self.values.iter().cloned());
        Ok(Sequence {
            domain: self.domain,
            values,
        })
    }

    pub fn concat(&self, other: &Sequence) -> Result<Sequence, CoreError> {
        if other.domain != self.domain {
            return Err(CoreError::DomainMismatch {
                expected: self.domain,
                found: other.domain,
            });
        }
        let mut values = self.values.clone();
        values.extend(other.values.iter().cloned());
        Ok(Sequence {
            domain: self.domain,
            values,
        })
    }

    /// First `n` values (clamped at length, like `get_prefix`/`get_suffix`
    /// are clamped in `alphabet.py`, except it is never an error to ask for
    /// a too-long prefix here — it is simply clamped to `len()`).
    pub fn prefix(&self, n: usize) -> Sequence {
        let n = n.min(self.values.len());
        Sequence {
            domain: self.domain,
            values: self.values[..n].to_vec(),
        }
    }

    pub fn suffix(&self, from: usize) -> Sequence {
        if from >= self.values.len() {
            return Sequence::empty(self.domain);
        }
        Sequence {
            domain: self.domain,
            values: self.values[from..].to_vec(),
        }
    }

    pub fn remove_at(&self, indices: &BTreeSet<usize>) -> Sequence {
        let values = self
            .values
            .iter()
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, v)| v.clone())
            .collect();
        Sequence {
            domain: self.domain,
            values,
        }
    }

    /// First index at which `needle` occurs, or `None`.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.values.iter().position(|v| v == needle)
    }

    pub fn apply_map(&self, map: &BijectiveMap) -> Sequence {
        Sequence {
            domain: map.target_domain,
            values: self.values.iter().map(|v| map.apply(v)).collect(),
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

/// Returns true iff `s1` and `s2` induce the same pairwise comparator
/// pattern under `comparator` (spec §3 "Type equality", ported verbatim
/// from `original_source/alphabet.py`'s `is_same_type`).
///
/// This is the O(n²) definitional check; [`type_signature`] is a faster
/// canonicalisation used where the same-type predicate needs to back a hash
/// map (observation table lookups, BFS visited sets).
pub fn same_type(s1: &Sequence, s2: &Sequence, comparator: Comparator) -> bool {
    if s1.len() != s2.len() || s1.domain() != s2.domain() {
        return false;
    }
    let n = s1.len();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if comparator.holds(&s1.values[i], &s1.values[j])
                != comparator.holds(&s2.values[i], &s2.values[j])
            {
                return false;
            }
        }
    }
    true
}

/// A canonical, hashable signature such that `type_signature(s1, c) ==
/// type_signature(s2, c)` iff `same_type(s1, s2, c)` (given equal length,
/// which the signature's length already encodes).
///
/// Under `Lt`, dense rank by sorted value (ties share a rank) exactly
/// encodes the strict-order pattern. Under `Eq`, a first-occurrence
/// partition labelling (the i-th *new* value seen gets the next label,
/// repeats reuse it) exactly encodes the equality partition — value
/// magnitude and order are irrelevant to `Eq`, only which positions share a
/// value. A naive "rank by value" signature is wrong for `Eq`: under `Eq`,
/// `[2, 1]` must have the same type as `[5, 9]`, but ranking by value gives
/// `[1, 0]` and `[0, 1]` respectively, which disagree.
pub fn type_signature(s: &Sequence, comparator: Comparator) -> Vec<u32> {
    match comparator {
        Comparator::Lt => {
            let mut sorted: Vec<&Value> = s.values.iter().collect();
            sorted.sort();
            sorted.dedup();
            s.values
                .iter()
                .map(|v| sorted.binary_search(&v).unwrap() as u32)
                .collect()
        }
        Comparator::Eq => {
            let mut labels: HashMap<&Value, u32> = HashMap::new();
            let mut next = 0u32;
            s.values
                .iter()
                .map(|v| {
                    *labels.entry(v).or_insert_with(|| {
                        let id = next;
                        next += 1;
                        id
                    })
                })
                .collect()
        }
    }
}

/// Projects `s` onto the labels `0, …, n−1` in ascending value order, ties
/// broken by original position. Used by `dra::automaton::normalise` to build
/// a location's canonical register (spec §3 "Canonical form"). Distinct
/// from [`type_signature`]: this always sorts by value regardless of
/// comparator, since normalisation is a literal labelling, not a
/// type-equivalence test. Assumes register values are pairwise distinct,
/// the common case (see `DESIGN.md`); a tie is broken by position but, under
/// `Lt`, two positions that were tied (equal) in `s` may receive different
/// canonical ranks, which is a known approximation for that degenerate case.
pub fn ascending_value_rank(s: &Sequence) -> Sequence {
    let mut idx: Vec<usize> = (0..s.len()).collect();
    idx.sort_by(|&a, &b| s.values[a].cmp(&s.values[b]).then(a.cmp(&b)));
    let mut rank = vec![0u32; s.len()];
    for (r, &i) in idx.iter().enumerate() {
        rank[i] = r as u32;
    }
    let values = rank
        .into_iter()
        .map(|r| match s.domain {
            Domain::Rational => Value::rational_from_i64(r as i64),
            Domain::Real => Value::real_from_f64(r as f64),
        })
        .collect();
    Sequence {
        domain: s.domain,
        values,
    }
}

/// A monotone (under `Lt`) or equality-preserving (under `Eq`) renaming
/// between two same-type sequences, built by sorting both by value, pairing
/// unique values, and linearly interpolating between them (spec §3
/// "Bijective dense map", ported from `alphabet.py`'s `get_bijective_map`).
pub struct BijectiveMap {
    source_sorted: Vec<Value>,
    target_sorted: Vec<Value>,
    target_domain: Domain,
}

impl BijectiveMap {
    pub fn apply(&self, v: &Value) -> Value {
        if self.source_sorted.is_empty() {
            return v.clone();
        }
        let v0 = &self.source_sorted[0];
        let v_last = self.source_sorted.last().unwrap();
        let o0 = &self.target_sorted[0];
        let o_last = self.target_sorted.last().unwrap();

        if v < v0 {
            return Value::translate(v, v0, o0);
        }
        if v >= v_last {
            return Value::translate(v, v_last, o_last);
        }
        for i in 0..self.source_sorted.len() - 1 {
            let vi = &self.source_sorted[i];
            let vj = &self.source_sorted[i + 1];
            if vi <= v && v < vj {
                let oi = &self.target_sorted[i];
                let oj = &self.target_sorted[i + 1];
                return Value::interpolate(v, vi, vj, oi, oj);
            }
        }
        // Same-type sequences never leave every interval undetermined: a
        // well-formed precondition call reaches one of the branches above.
        v.clone()
    }
}

/// Builds the bijective dense map `source -> target`. Precondition:
/// `same_type(source, target, comparator)`; violating it is a
/// [`CoreError::NotSameType`].
pub fn bijective_map(
    source: &Sequence,
    target: &Sequence,
    comparator: Comparator,
) -> Result<BijectiveMap, CoreError> {
    if !same_type(source, target, comparator) {
        return Err(CoreError::NotSameType);
    }
    let mut source_sorted = source.values.clone();
    source_sorted.sort();
    let mut target_sorted = target.values.clone();
    target_sorted.sort();
    Ok(BijectiveMap {
        source_sorted,
        target_sorted,
        target_domain: target.domain,
    })
}

/// The finite representative "next letter" set of `s` (spec §3 "Letter
/// extension", ported from `alphabet.py`'s `get_letter_extension`).
pub fn letter_extension(s: &Sequence, comparator: Comparator, domain: Domain) -> Sequence {
    if s.is_empty() {
        return Sequence {
            domain,
            values: vec![Value::zero(domain)],
        };
    }
    let mut sorted: Vec<Value> = s.values.clone();
    sorted.sort();
    sorted.dedup();

    match comparator {
        Comparator::Eq => {
            let max_value = sorted.last().unwrap().clone();
            let mut values = sorted;
            values.push(max_value.plus_one());
            Sequence { domain, values }
        }
        Comparator::Lt => {
            let max_value = sorted.last().unwrap().clone();
            let min_value = sorted[0].clone();
            let mut values = Vec::new();
            for i in 0..sorted.len() - 1 {
                values.push(sorted[i].clone());
                if sorted[i] != sorted[i + 1] {
                    values.push(Value::midpoint(&sorted[i], &sorted[i + 1]));
                }
            }
            values.push(sorted.last().unwrap().clone());
            values.push(max_value.plus_one());
            values.push(min_value.minus_one());
            Sequence { domain, values }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat_seq(vals: &[i64]) -> Sequence {
        Sequence::new(
            Domain::Rational,
            vals.iter().map(|v| Value::rational_from_i64(*v)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn eq_same_type_ignores_value_order() {
        // Under EQ, [1, 2] has the same type as [5, 9] but not [3, 3].
        let a = rat_seq(&[1, 2]);
        let b = rat_seq(&[5, 9]);
        let c = rat_seq(&[3, 3]);
        assert!(same_type(&a, &b, Comparator::Eq));
        assert!(!same_type(&a, &c, Comparator::Eq));
    }

    #[test]
    fn type_signature_agrees_with_same_type_under_eq() {
        let a = rat_seq(&[2, 1]);
        let b = rat_seq(&[5, 9]);
        assert_eq!(
            type_signature(&a, Comparator::Eq),
            type_signature(&b, Comparator::Eq)
        );
        assert!(same_type(&a, &b, Comparator::Eq));
    }

    #[test]
    fn type_signature_agrees_with_same_type_under_lt() {
        let a = rat_seq(&[1, 1, 2]);
        let b = rat_seq(&[5, 5, 9]);
        assert_eq!(
            type_signature(&a, Comparator::Lt),
            type_signature(&b, Comparator::Lt)
        );
        assert!(same_type(&a, &b, Comparator::Lt));

        let c = rat_seq(&[2, 1, 1]);
        assert_ne!(
            type_signature(&a, Comparator::Lt),
            type_signature(&c, Comparator::Lt)
        );
    }

    #[test]
    fn bijective_map_is_identity_on_self() {
        let s = rat_seq(&[3, 1, 2]);
        let map = bijective_map(&s, &s, Comparator::Lt).unwrap();
        for v in s.values() {
            assert_eq!(&map.apply(v), v);
        }
    }

    #[test]
    fn bijective_map_scenario_3() {
        // Scenario 3: [1,5,5,9] and [3,7,7,10] are same type under EQ and LT.
        let a = rat_seq(&[1, 5, 5, 9]);
        let b = rat_seq(&[3, 7, 7, 10]);
        assert!(same_type(&a, &b, Comparator::Lt));
        assert!(same_type(&a, &b, Comparator::Eq));

        let map = bijective_map(&a, &b, Comparator::Lt).unwrap();
        let six = Value::rational_from_i64(6);
        let mapped = map.apply(&six);
        assert!(mapped > Value::rational_from_i64(7));
        assert!(mapped < Value::rational_from_i64(10));
    }

    #[test]
    fn letter_extension_of_empty_is_zero() {
        let e = Sequence::empty(Domain::Rational);
        let ext = letter_extension(&e, Comparator::Lt, Domain::Rational);
        assert_eq!(ext.values(), &[Value::rational_from_i64(0)]);
    }

    #[test]
    fn ascending_value_rank_orders_by_value() {
        let s = rat_seq(&[30, 10, 20]);
        let ranked = ascending_value_rank(&s);
        assert_eq!(
            ranked.values(),
            &[
                Value::rational_from_i64(2),
                Value::rational_from_i64(0),
                Value::rational_from_i64(1),
            ]
        );
    }

    #[test]
    fn letter_extension_lt_has_midpoints_and_boundaries() {
        let s = rat_seq(&[1, 3]);
        let ext = letter_extension(&s, Comparator::Lt, Domain::Rational);
        // 1, mid(1,3)=2, 3, 4 (max+1), 0 (min-1)
        assert_eq!(ext.len(), 5);
        assert!(ext.values().contains(&Value::rational_from_i64(0)));
        assert!(ext.values().contains(&Value::rational_from_i64(4)));
        assert!(ext.values().contains(&Value::rational_from_i64(2)));
    }
}
