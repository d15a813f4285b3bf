use std::collections::{HashSet, VecDeque};

use dra_core::Sequence;
use dra::{find_difference, DraError, RegisterAutomaton, Sample};

use crate::error::LearningError;

/// `(location id, access word reaching it, register content at it)`.
type StateRepr = (usize, Sequence, Sequence);

/// Generates a characteristic sample for a target DRA: a set of positive
/// and negative words polynomial in the automaton's size that suffices for
/// [`crate::passive::RpniLearner`] to recover an equivalent DRA (spec §4.G).
///
/// Grounded directly on `original_source/charc.py`'s `CharacteristicSample`.
/// Assumes `dra` is well-typed and complete.
pub struct CharacteristicSampleGenerator<'a> {
    dra: &'a RegisterAutomaton,
}

impl<'a> CharacteristicSampleGenerator<'a> {
    pub fn new(dra: &'a RegisterAutomaton) -> CharacteristicSampleGenerator<'a> {
        CharacteristicSampleGenerator { dra }
    }

    /// One BFS step from every outgoing transition of `source_loc`,
    /// re-deriving the concrete next letter from `source_reg` via the
    /// transition's bijective map (`charc.py`'s `one_step_configs`).
    fn one_step_configs(
        &self,
        source_loc: usize,
        source_reg: &Sequence,
    ) -> Result<Vec<(usize, Sequence, dra_core::Value)>, LearningError> {
        let alphabet = *self.dra.alphabet();
        let loc = self
            .dra
            .location(source_loc)
            .ok_or_else(|| LearningError::LearningFailure(format!("unknown location {source_loc}")))?;

        let mut next = Vec::new();
        for t in &loc.transitions {
            let pattern = t.register_pattern();
            if !alphabet.same_type(source_reg, &pattern) {
                return Err(LearningError::LearningFailure(format!(
                    "register {source_reg} not same type as transition pattern {pattern}"
                )));
            }
            let sigma = alphabet
                .bijective_map(&pattern, source_reg)
                .map_err(DraError::TypeMismatch)?;
            let new_letter = sigma.apply(t.input_pattern());
            let extended = source_reg
                .append(new_letter.clone())
                .map_err(DraError::TypeMismatch)?;
            let new_reg = extended.remove_at(&t.forget);
            next.push((t.target, new_reg, new_letter));
        }
        Ok(next)
    }

    /// BFS over reachable locations, returning one `(id, access word,
    /// register)` representative per location (`get_state_representatives`).
    fn state_representatives(&self) -> Result<Vec<StateRepr>, LearningError> {
        let alphabet = *self.dra.alphabet();
        let initial = self
            .dra
            .initial()
            .ok_or_else(|| LearningError::LearningFailure("no initial location".into()))?;

        let mut result: Vec<StateRepr> = Vec::new();
        let mut in_queue: HashSet<usize> = HashSet::from([initial]);
        let mut queue: VecDeque<StateRepr> = VecDeque::new();
        queue.push_back((initial, alphabet.empty_sequence(), alphabet.empty_sequence()));

        while let Some((loc_id, loc_repr, reg)) = queue.pop_front() {
            result.push((loc_id, loc_repr.clone(), reg.clone()));
            for (dest_id, new_reg, letter) in self.one_step_configs(loc_id, &reg)? {
                if in_queue.insert(dest_id) {
                    let next_repr = loc_repr.append(letter).map_err(DraError::TypeMismatch)?;
                    queue.push_back((dest_id, next_repr, new_reg));
                }
            }
        }
        Ok(result)
    }

    /// Builds `(St ∪ Tr ∪ Mem ∪ D)` and splits by acceptance into a
    /// [`Sample`] (`charc.py`'s `compute_characteristic_sample`).
    pub fn generate(&self) -> Result<Sample, LearningError> {
        let alphabet = *self.dra.alphabet();
        let state_reprs = self.state_representatives()?;

        let mut all_words: HashSet<Sequence> = HashSet::new();

        // St: one access word per reachable location.
        for (_, repr, _) in &state_reprs {
            all_words.insert(repr.clone());
        }

        // Tr: for each state representative, append every letter-extension
        // member of its register.
        for (_, u, reg) in &state_reprs {
            let bs = alphabet.letter_extension(reg);
            for b in bs.values() {
                let ub = u.append(b.clone()).map_err(DraError::TypeMismatch)?;
                all_words.insert(ub);
            }
        }

        // Mem: for each u in Tr, for each value `a` held in u's register,
        // perturb the occurrence of `a` and add the resulting
        // distinguishing continuation — one witness pair per register
        // element, matching `original_source/charc.py`'s
        // `for a in reg.letters: w, b, up = teacher.get_memorable_witness(...)`.
        let tr: Vec<Sequence> = all_words.iter().cloned().collect();
        for u in &tr {
            let configs = self.dra.run(u)?;
            let reg = &configs.last().unwrap().registers;
            if reg.is_empty() {
                continue;
            }
            for a in reg.values() {
                let u_replaced = perturbed(&alphabet, u, reg, a)?;
                if let Some(w) = find_difference(self.dra, u, self.dra, &u_replaced)? {
                    all_words.insert(u.concat(&w).map_err(DraError::TypeMismatch)?);
                    let sigma = alphabet
                        .bijective_map(&u_replaced, u)
                        .map_err(DraError::TypeMismatch)?;
                    let mapped_w = w.apply_map(&sigma);
                    all_words.insert(u.concat(&mapped_w).map_err(DraError::TypeMismatch)?);
                }
            }
        }

        // D: distinguishers for pairs of representatives reaching different
        // locations with same-type registers.
        for u in &state_reprs {
            for v in &state_reprs {
                if u.0 == v.0 {
                    continue;
                }
                if !alphabet.same_type(&u.2, &v.2) {
                    continue;
                }
                let u2v = alphabet.bijective_map(&u.2, &v.2).map_err(DraError::TypeMismatch)?;
                let v2u = alphabet.bijective_map(&v.2, &u.2).map_err(DraError::TypeMismatch)?;
                let u_mapped = u.1.apply_map(&u2v);
                if let Some(w) = find_difference(self.dra, &u_mapped, self.dra, &v.1)? {
                    let w_inverse = w.apply_map(&v2u);
                    all_words.insert(u.1.concat(&w_inverse).map_err(DraError::TypeMismatch)?);
                    all_words.insert(v.1.concat(&w).map_err(DraError::TypeMismatch)?);
                }
            }
        }

        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for w in all_words {
            if self.dra.is_accepted(&w)? {
                positive.push(w);
            } else {
                negative.push(w);
            }
        }
        Ok(Sample {
            alphabet,
            positive,
            negative,
        })
    }
}

/// Builds a word with `a`'s last occurrence in `u` replaced by the
/// neighbouring value one slot past `a` in `reg`'s letter extension (sorted
/// and deduped, so a slot past every register value always exists). `a`
/// must be one of `reg`'s own values, which are themselves drawn from `u`.
fn perturbed(
    alphabet: &dra_core::Alphabet,
    u: &Sequence,
    reg: &Sequence,
    a: &dra_core::Value,
) -> Result<Sequence, DraError> {
    let mut extension: Vec<dra_core::Value> = alphabet.letter_extension(reg).values().to_vec();
    extension.sort();
    extension.dedup();
    let idx = extension
        .binary_search(a)
        .expect("register values are a subset of their own letter extension");
    let replacement = extension
        .get(idx + 1)
        .cloned()
        .expect("letter_extension always contains a value past the register's maximum");

    let last_occurrence = u
        .values()
        .iter()
        .rposition(|v| v == a)
        .expect("a is drawn from u's own register content");
    let mut values = u.values().to_vec();
    values[last_occurrence] = replacement;
    alphabet.make_sequence(values).map_err(DraError::TypeMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dra::RegisterAutomaton;
    use dra_core::{Alphabet, Comparator, Domain, Value};
    use std::collections::BTreeSet;

    fn lt_automaton_l_lt() -> RegisterAutomaton {
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Lt);
        let mut a = RegisterAutomaton::new(alphabet);
        a.add_location(0, "eps", false).unwrap();
        a.add_location(1, "a", false).unwrap();
        a.add_location(2, "acc", true).unwrap();
        a.add_location(3, "rej", false).unwrap();
        a.set_initial(0).unwrap();

        let tau0 = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        a.add_transition(0, tau0, BTreeSet::new(), 1).unwrap();
        let lt_tau = alphabet
            .make_sequence(vec![Value::rational_from_i64(0), Value::rational_from_i64(-1)])
            .unwrap();
        a.add_transition(1, lt_tau, [0, 1].into_iter().collect(), 2).unwrap();
        let gt_tau = alphabet
            .make_sequence(vec![Value::rational_from_i64(-1), Value::rational_from_i64(0)])
            .unwrap();
        a.add_transition(1, gt_tau, [0, 1].into_iter().collect(), 2).unwrap();
        let eq_tau = alphabet
            .make_sequence(vec![Value::rational_from_i64(0), Value::rational_from_i64(0)])
            .unwrap();
        a.add_transition(1, eq_tau, [0, 1].into_iter().collect(), 3).unwrap();
        let acc_tau = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        a.add_transition(2, acc_tau, [0].into_iter().collect(), 3).unwrap();
        let rej_tau = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        a.add_transition(3, rej_tau, [0].into_iter().collect(), 3).unwrap();
        a
    }

    #[test]
    fn generates_nonempty_sample_with_consistent_labels() {
        let ra = lt_automaton_l_lt();
        let gen = CharacteristicSampleGenerator::new(&ra);
        let sample = gen.generate().unwrap();

        assert!(!sample.positive.is_empty());
        assert!(!sample.negative.is_empty());
        for w in &sample.positive {
            assert!(ra.is_accepted(w).unwrap());
        }
        for w in &sample.negative {
            assert!(!ra.is_accepted(w).unwrap());
        }
    }

    #[test]
    fn scenario_5_characteristic_sample_recovers_equivalent_automaton() {
        let target = lt_automaton_l_lt();
        let sample = CharacteristicSampleGenerator::new(&target).generate().unwrap();

        let learner = crate::passive::RpniLearner::new(&sample);
        let learned = learner.learn().unwrap();

        for w in &sample.positive {
            assert!(learned.is_accepted(w).unwrap());
        }
        for w in &sample.negative {
            assert!(!learned.is_accepted(w).unwrap());
        }
        assert!(find_difference(&target, &target.alphabet().empty_sequence(), &learned, &learned.alphabet().empty_sequence())
            .unwrap()
            .is_none());
    }
}
