use crate::error::CoreError;
use crate::sequence::{self, BijectiveMap, Sequence};
use crate::value::{Comparator, Domain, Value};

/// The domain and comparator shared by every sequence built through it.
///
/// Ported from `original_source/alphabet.py`'s `Alphabet` class: lifts the
/// comparator out of individual call sites into one owned value so no
/// function-valued field ever escapes the core (spec §9, "callable
/// comparator passed at many call sites").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alphabet {
    domain: Domain,
    comparator: Comparator,
}

impl Alphabet {
    pub fn new(domain: Domain, comparator: Comparator) -> Alphabet {
        Alphabet { domain, comparator }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn make_value(&self, raw: &str) -> Result<Value, CoreError> {
        Value::parse(raw, self.domain)
    }

    pub fn make_sequence(&self, values: Vec<Value>) -> Result<Sequence, CoreError> {
        Sequence::new(self.domain, values)
    }

    pub fn empty_sequence(&self) -> Sequence {
        Sequence::empty(self.domain)
    }

    pub fn same_type(&self, s1: &Sequence, s2: &Sequence) -> bool {
        sequence::same_type(s1, s2, self.comparator)
    }

    pub fn type_signature(&self, s: &Sequence) -> Vec<u32> {
        sequence::type_signature(s, self.comparator)
    }

    pub fn bijective_map(&self, source: &Sequence, target: &Sequence) -> Result<BijectiveMap, CoreError> {
        sequence::bijective_map(source, target, self.comparator)
    }

    pub fn letter_extension(&self, s: &Sequence) -> Sequence {
        sequence::letter_extension(s, self.comparator, self.domain)
    }

    pub fn apply_map(&self, s: &Sequence, map: &BijectiveMap) -> Sequence {
        s.apply_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_map_roundtrips_through_bijective_map() {
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Lt);
        let s = alphabet
            .make_sequence(vec![
                Value::rational_from_i64(3),
                Value::rational_from_i64(1),
                Value::rational_from_i64(2),
            ])
            .unwrap();
        let map = alphabet.bijective_map(&s, &s).unwrap();
        let mapped = alphabet.apply_map(&s, &map);
        assert_eq!(mapped, s);
    }
}
