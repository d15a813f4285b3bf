use std::collections::{HashMap, HashSet, VecDeque};

use tracing::trace;

use dra_core::{Sequence, Value};

use crate::automaton::{Configuration, RegisterAutomaton};
use crate::error::DraError;

/// Runs a forward BFS over product configurations `(ℓ_A, r_A, ℓ_B, r_B)`
/// starting from `A` after reading `u` and `B` after reading `v`, looking
/// for a continuation word on which the two disagree on acceptance (spec
/// §4.C). Ported from the backward-search construction in
/// `original_source/witness.py`'s `BackwardSearchWitnessFinder`, reworked
/// as the forward search spec §4.C specifies directly.
///
/// Duplicate pruning uses [`dra_core::type_signature`] of the concatenated
/// registers, which is a canonical equivalent of the same-type predicate —
/// see `dra_core::sequence::type_signature`'s doc comment.
pub fn find_difference(
    a: &RegisterAutomaton,
    u: &Sequence,
    b: &RegisterAutomaton,
    v: &Sequence,
) -> Result<Option<Sequence>, DraError> {
    let alphabet = *a.alphabet();
    let start_a = a
        .run(u)?
        .pop()
        .expect("run always returns at least one configuration");
    let start_b = b
        .run(v)?
        .pop()
        .expect("run always returns at least one configuration");

    let accepting_a = |loc: usize| a.location(loc).map(|l| l.accepting).unwrap_or(false);
    let accepting_b = |loc: usize| b.location(loc).map(|l| l.accepting).unwrap_or(false);

    if accepting_a(start_a.location) != accepting_b(start_b.location) {
        return Ok(Some(alphabet.empty_sequence()));
    }

    let sink_a = a.get_sink_rejecting();
    let sink_b = b.get_sink_rejecting();

    let signature = |reg_a: &Sequence, reg_b: &Sequence| -> Result<Vec<u32>, DraError> {
        let concat = reg_a.concat(reg_b).map_err(DraError::TypeMismatch)?;
        Ok(alphabet.type_signature(&concat))
    };

    let mut visited: HashSet<(usize, usize, Vec<u32>)> = HashSet::new();
    let start_sig = signature(&start_a.registers, &start_b.registers)?;
    visited.insert((start_a.location, start_b.location, start_sig));

    let mut queue: VecDeque<(Configuration, Configuration, Sequence)> = VecDeque::new();
    queue.push_back((start_a, start_b, alphabet.empty_sequence()));

    while let Some((cfg_a, cfg_b, word)) = queue.pop_front() {
        if sink_a.contains(&cfg_a.location) && sink_b.contains(&cfg_b.location) {
            continue;
        }
        let concat = cfg_a
            .registers
            .concat(&cfg_b.registers)
            .map_err(DraError::TypeMismatch)?;
        let candidates = alphabet.letter_extension(&concat);

        for x in candidates.values() {
            let next_a = a.step(&cfg_a, x)?;
            let next_b = b.step(&cfg_b, x)?;
            let (Some(next_a), Some(next_b)) = (next_a, next_b) else {
                continue;
            };
            let next_word = word.append(x.clone()).map_err(DraError::TypeMismatch)?;
            if accepting_a(next_a.location) != accepting_b(next_b.location) {
                trace!(?next_word, "found distinguishing word");
                return Ok(Some(next_word));
            }
            let sig = signature(&next_a.registers, &next_b.registers)?;
            let key = (next_a.location, next_b.location, sig);
            if visited.insert(key) {
                queue.push_back((next_a, next_b, next_word));
            }
        }
    }
    Ok(None)
}

/// Computes `memorable(u)`: the subsequence of `u` whose positions are
/// memorable at `u` with respect to `target`, keeping only the last
/// occurrence of each memorable value (spec §4.C).
pub fn memorable(target: &RegisterAutomaton, u: &Sequence) -> Result<Sequence, DraError> {
    let alphabet = *target.alphabet();
    if u.is_empty() {
        return Ok(alphabet.empty_sequence());
    }

    // The neighbour candidate for a position's value must come from u's
    // letter extension, not from u's own distinct values: the extension is
    // what supplies a midpoint for an interior value under `Lt` and a true
    // outside-min/max value at the boundary under either comparator. Sorted
    // and deduped, the extension always contains a value strictly greater
    // than every value in u (its `max + 1` member), so the slot one past a
    // position's value always exists.
    let mut extension: Vec<Value> = alphabet.letter_extension(u).values().to_vec();
    extension.sort();
    extension.dedup();

    let mut is_memorable = vec![false; u.len()];
    for i in 0..u.len() {
        let a = u.get(i).unwrap();
        let idx = extension
            .binary_search(a)
            .expect("u's values are a subset of u's own letter extension");
        let b = extension
            .get(idx + 1)
            .cloned()
            .expect("letter_extension always contains a value past u's maximum");
        let mut replaced: Vec<Value> = u.values().to_vec();
        replaced[i] = b;
        let u_replaced = alphabet.make_sequence(replaced).map_err(DraError::TypeMismatch)?;
        if find_difference(target, u, target, &u_replaced)?.is_some() {
            is_memorable[i] = true;
        }
    }

    let mut last_index_for_value: HashMap<Value, usize> = HashMap::new();
    for (i, v) in u.values().iter().enumerate() {
        if is_memorable[i] {
            last_index_for_value.insert(v.clone(), i);
        }
    }
    let mut keep: Vec<usize> = last_index_for_value.into_values().collect();
    keep.sort();
    let values: Vec<Value> = keep.into_iter().map(|i| u.get(i).unwrap().clone()).collect();
    alphabet.make_sequence(values).map_err(DraError::TypeMismatch)
}

/// Monotone counters for the three oracle query kinds, kept for
/// experimental reporting (spec §4.C, and the CLI statistics in §6).
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryCounts {
    pub membership: u64,
    pub equivalence: u64,
    pub memorability: u64,
}

/// The teacher that answers membership, equivalence, and memorability
/// queries against a fixed target automaton, by running the symbolic
/// searches above.
pub struct Teacher<'a> {
    target: &'a RegisterAutomaton,
    counts: QueryCounts,
}

impl<'a> Teacher<'a> {
    pub fn new(target: &'a RegisterAutomaton) -> Teacher<'a> {
        Teacher {
            target,
            counts: QueryCounts::default(),
        }
    }

    pub fn target(&self) -> &RegisterAutomaton {
        self.target
    }

    pub fn counts(&self) -> QueryCounts {
        self.counts
    }

    pub fn member(&mut self, w: &Sequence) -> Result<bool, DraError> {
        self.counts.membership += 1;
        self.target.is_accepted(w)
    }

    /// Returns `None` if `hypothesis` accepts the same language as the
    /// target (up to the search bound), else a distinguishing word.
    pub fn equivalent(&mut self, hypothesis: &RegisterAutomaton) -> Result<Option<Sequence>, DraError> {
        self.counts.equivalence += 1;
        let empty_target = self.target.alphabet().empty_sequence();
        let empty_hyp = hypothesis.alphabet().empty_sequence();
        find_difference(self.target, &empty_target, hypothesis, &empty_hyp)
    }

    pub fn memorable(&mut self, u: &Sequence) -> Result<Sequence, DraError> {
        self.counts.memorability += 1;
        memorable(self.target, u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::RegisterAutomaton;
    use dra_core::{Alphabet, Comparator, Domain};
    use std::collections::BTreeSet;

    fn abab_distinct_automaton() -> RegisterAutomaton {
        // Scenario 2: positive a,b,a,b with a != b under EQ; 6 locations.
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Eq);
        let mut ra = RegisterAutomaton::new(alphabet);
        for (id, name, accepting) in [
            (0, "eps", false),
            (1, "a", false),
            (2, "ab", false),
            (3, "aba", false),
            (4, "abab", true),
            (5, "rej", false),
        ] {
            ra.add_location(id, name, accepting).unwrap();
        }
        ra.set_initial(0).unwrap();

        let seq = |vals: &[i64]| {
            alphabet
                .make_sequence(vals.iter().map(|v| Value::rational_from_i64(*v)).collect())
                .unwrap()
        };

        // 0 --a--> 1, remembers a
        ra.add_transition(0, seq(&[0]), BTreeSet::new(), 1).unwrap();
        // 1 --b (b != a)--> 2, remembers (a,b)
        ra.add_transition(1, seq(&[0, -1]), BTreeSet::new(), 2).unwrap();
        // 1 --a (b == a)--> 5 (reject, no a!=b)
        ra.add_transition(1, seq(&[0, 0]), [0, 1].into_iter().collect(), 5)
            .unwrap();
        // 2 --a (matches first register)--> 3, drop b, keep a
        ra.add_transition(2, seq(&[0, -1, 0]), [1].into_iter().collect(), 3)
            .unwrap();
        // 2 --other--> 5
        ra.add_transition(2, seq(&[0, -1, -2]), [0, 1, 2].into_iter().collect(), 5)
            .unwrap();
        // 3 --b (matches second register)--> 4, accept
        ra.add_transition(3, seq(&[0, -1, -1]), [0, 1].into_iter().collect(), 4)
            .unwrap();
        // 3 --other--> 5
        ra.add_transition(3, seq(&[0, -1, -2]), [0, 1, 2].into_iter().collect(), 5)
            .unwrap();
        // 4, 5 self loop to 5 (sink)
        ra.add_transition(4, seq(&[0]), [0].into_iter().collect(), 5).unwrap();
        ra.add_transition(5, seq(&[0]), [0].into_iter().collect(), 5).unwrap();

        ra
    }

    #[test]
    fn scenario_2_accepts_and_rejects() {
        let ra = abab_distinct_automaton();
        let alphabet = *ra.alphabet();
        let pos1 = alphabet
            .make_sequence(vec![
                Value::rational_from_i64(1),
                Value::rational_from_i64(2),
                Value::rational_from_i64(1),
                Value::rational_from_i64(2),
            ])
            .unwrap();
        assert!(ra.is_accepted(&pos1).unwrap());

        let neg = alphabet
            .make_sequence(vec![
                Value::rational_from_i64(1),
                Value::rational_from_i64(1),
                Value::rational_from_i64(1),
                Value::rational_from_i64(1),
            ])
            .unwrap();
        assert!(!ra.is_accepted(&neg).unwrap());
    }

    #[test]
    fn equivalent_self_is_none() {
        let ra = abab_distinct_automaton();
        let mut teacher = Teacher::new(&ra);
        assert!(teacher.equivalent(&ra).unwrap().is_none());
        assert_eq!(teacher.counts().equivalence, 1);
    }

    /// Accepts length-3 words whose first and third letters are equal; the
    /// second letter is never compared against anything and is forgotten
    /// the moment it is read.
    fn first_equals_third_automaton() -> RegisterAutomaton {
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Eq);
        let mut ra = RegisterAutomaton::new(alphabet);
        ra.add_location(0, "eps", false).unwrap();
        ra.add_location(1, "a", false).unwrap();
        ra.add_location(2, "ab", false).unwrap();
        ra.add_location(3, "acc", true).unwrap();
        ra.add_location(4, "rej", false).unwrap();
        ra.set_initial(0).unwrap();
        let seq = |vals: &[i64]| {
            alphabet
                .make_sequence(vals.iter().map(|v| Value::rational_from_i64(*v)).collect())
                .unwrap()
        };
        ra.add_transition(0, seq(&[0]), BTreeSet::new(), 1).unwrap();
        // loc1 -> loc2 on any second letter, forgetting it, keeping the first.
        ra.add_transition(1, seq(&[0, 0]), [1].into_iter().collect(), 2).unwrap();
        ra.add_transition(1, seq(&[0, -1]), [1].into_iter().collect(), 2).unwrap();
        ra.add_transition(2, seq(&[0, 0]), [0, 1].into_iter().collect(), 3).unwrap();
        ra.add_transition(2, seq(&[0, -1]), [0, 1].into_iter().collect(), 4).unwrap();
        ra.add_transition(3, seq(&[0]), [0].into_iter().collect(), 3).unwrap();
        ra.add_transition(4, seq(&[0]), [0].into_iter().collect(), 4).unwrap();
        ra
    }

    #[test]
    fn scenario_6_memorable_overwrite() {
        // memorable([1,2,1]) = [1]: both position 0 and position 2 hold the
        // value compared for acceptance (first letter == third letter), so
        // both are individually memorable, but they share the same value —
        // keeping only the last occurrence collapses them to one entry.
        let ra = first_equals_third_automaton();
        let alphabet = *ra.alphabet();
        let u = alphabet
            .make_sequence(vec![
                Value::rational_from_i64(1),
                Value::rational_from_i64(2),
                Value::rational_from_i64(1),
            ])
            .unwrap();
        assert!(ra.is_accepted(&u).unwrap());
        let expected = alphabet.make_sequence(vec![Value::rational_from_i64(1)]).unwrap();
        let got = memorable(&ra, &u).unwrap();
        assert!(alphabet.same_type(&got, &expected));
        assert_eq!(got.len(), 1);
    }

    /// Two DRAs accepting "first letter repeats" (second letter equals the
    /// first) and "second letter repeats" (third letter equals the second)
    /// under `EQ` are distinguished by `[1, 1]` or `[1, 2, 2]`. Both are
    /// built complete (every location's transitions exhaustively partition
    /// its reachable letter-extension candidates) so `find_difference`
    /// never has to treat a missing transition as a forced match.
    fn first_letter_repeats() -> RegisterAutomaton {
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Eq);
        let mut ra = RegisterAutomaton::new(alphabet);
        ra.add_location(0, "eps", false).unwrap();
        ra.add_location(1, "a", false).unwrap();
        ra.add_location(2, "acc", true).unwrap();
        ra.add_location(3, "rej", false).unwrap();
        ra.set_initial(0).unwrap();
        let seq = |vals: &[i64]| {
            alphabet
                .make_sequence(vals.iter().map(|v| Value::rational_from_i64(*v)).collect())
                .unwrap()
        };
        ra.add_transition(0, seq(&[0]), BTreeSet::new(), 1).unwrap();
        ra.add_transition(1, seq(&[0, 0]), [0, 1].into_iter().collect(), 2).unwrap();
        ra.add_transition(1, seq(&[0, -1]), [0, 1].into_iter().collect(), 3).unwrap();
        ra.add_transition(2, seq(&[0]), [0].into_iter().collect(), 2).unwrap();
        ra.add_transition(3, seq(&[0]), [0].into_iter().collect(), 3).unwrap();
        ra
    }

    fn second_letter_repeats() -> RegisterAutomaton {
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Eq);
        let mut ra = RegisterAutomaton::new(alphabet);
        ra.add_location(0, "eps", false).unwrap();
        ra.add_location(1, "a", false).unwrap();
        ra.add_location(2, "ab", false).unwrap();
        ra.add_location(3, "acc", true).unwrap();
        ra.add_location(4, "rej", false).unwrap();
        ra.set_initial(0).unwrap();
        let seq = |vals: &[i64]| {
            alphabet
                .make_sequence(vals.iter().map(|v| Value::rational_from_i64(*v)).collect())
                .unwrap()
        };
        ra.add_transition(0, seq(&[0]), [0].into_iter().collect(), 1).unwrap();
        ra.add_transition(1, seq(&[0]), BTreeSet::new(), 2).unwrap();
        ra.add_transition(2, seq(&[0, 0]), [0, 1].into_iter().collect(), 3).unwrap();
        ra.add_transition(2, seq(&[0, -1]), [0, 1].into_iter().collect(), 4).unwrap();
        ra.add_transition(3, seq(&[0]), [0].into_iter().collect(), 3).unwrap();
        ra.add_transition(4, seq(&[0]), [0].into_iter().collect(), 4).unwrap();
        ra
    }

    #[test]
    fn scenario_4_finds_distinguishing_word() {
        let a = first_letter_repeats();
        let b = second_letter_repeats();
        let alphabet = *a.alphabet();
        let empty = alphabet.empty_sequence();
        let w = find_difference(&a, &empty, &b, &empty).unwrap();
        assert!(w.is_some());
        let w = w.unwrap();
        assert_ne!(a.is_accepted(&w).unwrap(), b.is_accepted(&w).unwrap());
    }
}
