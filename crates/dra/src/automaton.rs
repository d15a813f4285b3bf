use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::trace;

use dra_core::{ascending_value_rank, Alphabet, Sequence, Value};

use crate::error::DraError;

/// A transition `(p, τ, E, q)` (spec §3): `τ`'s prefix is the memorable
/// register pattern expected at `p`, `τ`'s last letter is the input
/// pattern, `E` marks which positions of `registers · input` are
/// discarded, and `q` is the target location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub source: usize,
    pub tau: Sequence,
    pub forget: BTreeSet<usize>,
    pub target: usize,
}

impl Transition {
    /// The memorable-register pattern expected at the source location:
    /// `τ[0..n-1]`.
    pub fn register_pattern(&self) -> Sequence {
        self.tau.prefix(self.tau.len().saturating_sub(1))
    }

    /// The input pattern: `τ`'s last letter.
    pub fn input_pattern(&self) -> &Value {
        self.tau
            .get(self.tau.len() - 1)
            .expect("a transition's tau is never empty")
    }
}

/// A location (state) in a register automaton: integer id, display name,
/// accepting flag, outgoing transitions in insertion order.
#[derive(Debug, Clone)]
pub struct Location {
    pub id: usize,
    pub name: String,
    pub accepting: bool,
    pub transitions: Vec<Transition>,
}

/// `(location id, register sequence, last transition taken)` (spec §3).
#[derive(Debug, Clone)]
pub struct Configuration {
    pub location: usize,
    pub registers: Sequence,
    pub last: Option<Transition>,
}

/// A deterministic register automaton over a dense alphabet.
///
/// Grounded on `original_source/dra.py`'s `RegisterAutomaton`; completion
/// and normalisation (absent there) are added per spec §4.B.
#[derive(Debug, Clone)]
pub struct RegisterAutomaton {
    alphabet: Alphabet,
    locations: IndexMap<usize, Location>,
    initial: Option<usize>,
}

impl RegisterAutomaton {
    pub fn new(alphabet: Alphabet) -> RegisterAutomaton {
        RegisterAutomaton {
            alphabet,
            locations: IndexMap::new(),
            initial: None,
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    pub fn location(&self, id: usize) -> Option<&Location> {
        self.locations.get(&id)
    }

    pub fn num_locations(&self) -> usize {
        self.locations.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.locations.values().map(|l| l.transitions.len()).sum()
    }

    pub fn initial(&self) -> Option<usize> {
        self.initial
    }

    pub fn add_location(&mut self, id: usize, name: impl Into<String>, accepting: bool) -> Result<(), DraError> {
        if self.locations.contains_key(&id) {
            return Err(DraError::StructureError(format!(
                "location with id {id} already exists"
            )));
        }
        self.locations.insert(
            id,
            Location {
                id,
                name: name.into(),
                accepting,
                transitions: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn set_accepting(&mut self, id: usize, accepting: bool) -> Result<(), DraError> {
        let loc = self
            .locations
            .get_mut(&id)
            .ok_or_else(|| DraError::StructureError(format!("unknown location id {id}")))?;
        loc.accepting = accepting;
        Ok(())
    }

    pub fn set_initial(&mut self, id: usize) -> Result<(), DraError> {
        if !self.locations.contains_key(&id) {
            return Err(DraError::StructureError(format!("unknown location id {id}")));
        }
        self.initial = Some(id);
        Ok(())
    }

    pub fn add_transition(
        &mut self,
        source: usize,
        tau: Sequence,
        forget: BTreeSet<usize>,
        target: usize,
    ) -> Result<(), DraError> {
        if !self.locations.contains_key(&source) {
            return Err(DraError::StructureError(format!("unknown source location {source}")));
        }
        if !self.locations.contains_key(&target) {
            return Err(DraError::StructureError(format!("unknown target location {target}")));
        }
        let transition = Transition {
            source,
            tau,
            forget,
            target,
        };
        let loc = self.locations.get_mut(&source).unwrap();
        if !loc.transitions.contains(&transition) {
            loc.transitions.push(transition);
        }
        Ok(())
    }

    /// Advances one step: forms `extended = registers · input`, scans the
    /// current location's outgoing transitions in insertion order, and
    /// takes the unique one whose `τ` is same-length and same-type as
    /// `extended`. Returns `None` if no transition matches.
    pub fn step(&self, config: &Configuration, input: &Value) -> Result<Option<Configuration>, DraError> {
        let extended = config
            .registers
            .append(input.clone())
            .map_err(DraError::TypeMismatch)?;
        let loc = self
            .locations
            .get(&config.location)
            .ok_or_else(|| DraError::StructureError(format!("unknown location {}", config.location)))?;

        for transition in &loc.transitions {
            if extended.len() != transition.tau.len() {
                continue;
            }
            if extended.domain() != transition.tau.domain() {
                continue;
            }
            if self.alphabet.same_type(&extended, &transition.tau) {
                let next_registers = extended.remove_at(&transition.forget);
                return Ok(Some(Configuration {
                    location: transition.target,
                    registers: next_registers,
                    last: Some(transition.clone()),
                }));
            }
        }
        Ok(None)
    }

    /// Starts at `(initial, ε, None)` and stops on the first missing
    /// transition (it does not extend past it).
    pub fn run(&self, word: &Sequence) -> Result<Vec<Configuration>, DraError> {
        let initial = self
            .initial
            .ok_or_else(|| DraError::StructureError("initial location not set".into()))?;
        let mut configs = vec![Configuration {
            location: initial,
            registers: self.alphabet.empty_sequence(),
            last: None,
        }];
        for value in word.values() {
            let current = configs.last().unwrap();
            match self.step(current, value)? {
                Some(next) => configs.push(next),
                None => break,
            }
        }
        Ok(configs)
    }

    /// True iff the last reached configuration's location is accepting. A
    /// partial run on an incomplete automaton is rejecting unless the last
    /// reached location happens to be accepting.
    pub fn is_accepted(&self, word: &Sequence) -> Result<bool, DraError> {
        let configs = self.run(word)?;
        let last = configs.last().expect("run always yields at least one configuration");
        let loc = self
            .locations
            .get(&last.location)
            .ok_or_else(|| DraError::StructureError(format!("unknown location {}", last.location)))?;
        Ok(loc.accepting)
    }

    /// True iff `word` has a complete run (every letter consumed).
    pub fn has_run(&self, word: &Sequence) -> Result<(bool, Option<usize>), DraError> {
        let configs = self.run(word)?;
        let complete = configs.len() == word.len() + 1;
        Ok((complete, configs.last().map(|c| c.location)))
    }

    /// Locations that are non-accepting and every outgoing transition
    /// targets themselves.
    pub fn get_sink_rejecting(&self) -> BTreeSet<usize> {
        self.locations
            .values()
            .filter(|loc| {
                !loc.accepting
                    && !loc.transitions.is_empty()
                    && loc.transitions.iter().all(|t| t.target == loc.id)
            })
            .map(|loc| loc.id)
            .collect()
    }

    /// Completes the automaton: for each location, computes its shared
    /// memorable pattern and locally used inputs, then routes every
    /// missing letter-extension member to a (possibly freshly created)
    /// rejecting sink that clears all registers.
    pub fn make_complete(&self) -> Result<RegisterAutomaton, DraError> {
        let mut result = self.clone();
        let mut sink: Option<usize> = result.get_sink_rejecting().iter().next().copied();

        let ids: Vec<usize> = result.locations.keys().copied().collect();
        for id in ids {
            let loc = result.locations.get(&id).unwrap();
            if loc.transitions.is_empty() {
                continue;
            }
            let pattern = loc.transitions[0].register_pattern();
            for other in &loc.transitions[1..] {
                if !result.alphabet.same_type(&pattern, &other.register_pattern()) {
                    return Err(DraError::InvariantViolation(format!(
                        "location {id}'s outgoing transitions do not share a memorable type"
                    )));
                }
            }
            let extension = result.alphabet.letter_extension(&pattern);
            for b in extension.values() {
                let extended = pattern.append(b.clone()).map_err(DraError::TypeMismatch)?;
                let covered = result.locations[&id]
                    .transitions
                    .iter()
                    .any(|t| t.tau.len() == extended.len() && result.alphabet.same_type(&t.tau, &extended));
                if covered {
                    continue;
                }
                let sink_id = match sink {
                    Some(s) => s,
                    None => {
                        let fresh = result.locations.keys().copied().max().map(|m| m + 1).unwrap_or(0);
                        result.add_location(fresh, "sink", false)?;
                        let forget: BTreeSet<usize> = [0].into_iter().collect();
                        let self_tau = result
                            .alphabet
                            .make_sequence(vec![Value::zero(result.alphabet.domain())])?;
                        result.add_transition(fresh, self_tau, forget, fresh)?;
                        sink = Some(fresh);
                        fresh
                    }
                };
                trace!(location = id, sink = sink_id, "routing missing extension to sink");
                let forget_all: BTreeSet<usize> = (0..extended.len()).collect();
                result.add_transition(id, extended, forget_all, sink_id)?;
            }
        }
        Ok(result)
    }

    /// Produces a canonical equivalent: each location's register is
    /// relabelled `0, …, k−1` in ascending value order, each transition's
    /// input letter is projected through the resulting bijective map, and
    /// the result is completed. Fails with `InvariantViolation` if a
    /// location's outgoing transitions do not share a memorable type.
    pub fn normalise(&self) -> Result<RegisterAutomaton, DraError> {
        let mut result = RegisterAutomaton::new(self.alphabet);
        for loc in self.locations.values() {
            result.add_location(loc.id, loc.name.clone(), loc.accepting)?;
        }
        if let Some(initial) = self.initial {
            result.set_initial(initial)?;
        }

        for loc in self.locations.values() {
            if loc.transitions.is_empty() {
                continue;
            }
            let pattern = loc.transitions[0].register_pattern();
            for t in &loc.transitions {
                if !self.alphabet.same_type(&pattern, &t.register_pattern()) {
                    return Err(DraError::InvariantViolation(format!(
                        "location {}'s outgoing transitions do not share a memorable type",
                        loc.id
                    )));
                }
            }
            let canonical_pattern = ascending_value_rank(&pattern);
            let sigma = self
                .alphabet
                .bijective_map(&pattern, &canonical_pattern)
                .map_err(DraError::TypeMismatch)?;

            for t in &loc.transitions {
                let canonical_input = sigma.apply(t.input_pattern());
                let canonical_tau = canonical_pattern
                    .append(canonical_input)
                    .map_err(DraError::TypeMismatch)?;
                result.add_transition(loc.id, canonical_tau, t.forget.clone(), t.target)?;
            }
        }

        result.make_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dra_core::{Comparator, Domain, Value};

    fn lt_automaton_l_lt() -> RegisterAutomaton {
        // Scenario 1: strictly increasing or strictly decreasing words of length 2.
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Lt);
        let mut a = RegisterAutomaton::new(alphabet);
        // 0 = start, 1 = saw one letter, 2 = accept, 3 = reject sink
        a.add_location(0, "eps", false).unwrap();
        a.add_location(1, "a", false).unwrap();
        a.add_location(2, "acc", true).unwrap();
        a.add_location(3, "rej", false).unwrap();
        a.set_initial(0).unwrap();

        let tau0 = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        a.add_transition(0, tau0, BTreeSet::new(), 1).unwrap();

        // from 1, register = [x]; if next < x or next > x -> accept; if == x -> reject
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

        // accept/reject are sinks on any further letter
        let acc_tau = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        a.add_transition(2, acc_tau, [0].into_iter().collect(), 3).unwrap();
        let rej_tau = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        a.add_transition(3, rej_tau, [0].into_iter().collect(), 3).unwrap();

        a
    }

    #[test]
    fn scenario_1_accepts_increasing_and_decreasing_pairs() {
        let a = lt_automaton_l_lt();
        let w12 = a
            .alphabet()
            .make_sequence(vec![Value::rational_from_i64(1), Value::rational_from_i64(2)])
            .unwrap();
        assert!(a.is_accepted(&w12).unwrap());

        let w21 = a
            .alphabet()
            .make_sequence(vec![Value::rational_from_i64(2), Value::rational_from_i64(1)])
            .unwrap();
        assert!(a.is_accepted(&w21).unwrap());

        let w11 = a
            .alphabet()
            .make_sequence(vec![Value::rational_from_i64(1), Value::rational_from_i64(1)])
            .unwrap();
        assert!(!a.is_accepted(&w11).unwrap());

        let empty = a.alphabet().empty_sequence();
        assert!(!a.is_accepted(&empty).unwrap());
    }

    #[test]
    fn get_sink_rejecting_finds_self_looping_reject_state() {
        let a = lt_automaton_l_lt();
        let sinks = a.get_sink_rejecting();
        assert!(sinks.contains(&3));
        assert!(!sinks.contains(&2));
    }
}
