use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use dra_core::{Sequence, Value};
use dra::{Configuration, DraError, RegisterAutomaton, Sample};

use crate::error::LearningError;

/// The transition `set_transition` decided to commit (spec §4.F).
struct DecidedTransition {
    source: usize,
    tau: Sequence,
    forget: BTreeSet<usize>,
    target: usize,
}

/// Incrementally builds a DRA consistent with a labeled sample via prefix-
/// ordered state construction, preserving S-completability at every step.
///
/// Grounded directly on `original_source/rpni.py`'s
/// `RegisterAutomatonRPNILearner`.
pub struct RpniLearner<'s> {
    sample: &'s Sample,
}

impl<'s> RpniLearner<'s> {
    pub fn new(sample: &'s Sample) -> RpniLearner<'s> {
        RpniLearner { sample }
    }

    /// True iff `w` has the same type as some sample word of the given
    /// polarity — matching `rpni.py`'s `search`, which tests type
    /// membership rather than literal equality, since the sample words are
    /// representatives and any same-type access word inherits their label.
    fn matches_sample(&self, w: &Sequence, positive: bool) -> bool {
        let set = if positive {
            &self.sample.positive
        } else {
            &self.sample.negative
        };
        set.iter().any(|s| self.sample.alphabet.same_type(w, s))
    }

    pub fn learn(&self) -> Result<RegisterAutomaton, LearningError> {
        let alphabet = self.sample.alphabet;
        let mut automaton = RegisterAutomaton::new(alphabet);
        let initial = 0usize;
        automaton.add_location(initial, "eps", false)?;
        automaton.set_initial(initial)?;

        let mut reg_size: HashMap<usize, usize> = HashMap::new();
        reg_size.insert(initial, 0);

        if self.sample.positive.iter().any(Sequence::is_empty) {
            automaton.set_accepting(initial, true)?;
        }

        let mut seen: HashSet<Vec<Value>> = HashSet::new();
        let mut worklist: Vec<Sequence> = Vec::new();
        for w in self.sample.positive.iter().chain(self.sample.negative.iter()) {
            for i in 1..=w.len() {
                let p = w.prefix(i);
                if seen.insert(p.values().to_vec()) {
                    worklist.push(p);
                }
            }
        }
        worklist.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.values().cmp(b.values())));
        let mut worklist: VecDeque<Sequence> = worklist.into();

        while let Some(ua) = worklist.pop_front() {
            let u = ua.prefix(ua.len() - 1);
            let a = ua.get(ua.len() - 1).unwrap().clone();

            let configs = automaton.run(&u)?;
            let last = configs
                .last()
                .expect("run always returns at least one configuration");
            if configs.len() != u.len() + 1 {
                return Err(LearningError::LearningFailure(format!(
                    "prefix {u} popped before it became readable"
                )));
            }
            let q = last.location;
            let r = last.registers.clone();

            let decided = self.set_transition(&automaton, &reg_size, q, &r, &a)?;

            if decided.target >= automaton.num_locations() {
                automaton.add_location(decided.target, decided.target.to_string(), false)?;
                let new_size = reg_size[&q] + 1 - decided.forget.len();
                reg_size.insert(decided.target, new_size);
            }
            automaton.add_transition(
                decided.source,
                decided.tau.clone(),
                decided.forget.clone(),
                decided.target,
            )?;

            if self.matches_sample(&ua, true) {
                automaton.set_accepting(decided.target, true)?;
            }

            let mut still_unreadable = VecDeque::new();
            for w in worklist.drain(..) {
                let (complete, loc) = automaton.has_run(&w)?;
                if complete {
                    if self.matches_sample(&w, true) {
                        automaton.set_accepting(loc.unwrap(), true)?;
                    }
                } else {
                    still_unreadable.push_back(w);
                }
            }
            worklist = still_unreadable;
        }

        Ok(automaton)
    }

    /// `SET_TRANSITION(q, r, a)`: erase as much of the extended register as
    /// possible while staying S-completable, then prefer an existing
    /// same-size location as target, falling back to a fresh one.
    fn set_transition(
        &self,
        automaton: &RegisterAutomaton,
        reg_size: &HashMap<usize, usize>,
        q: usize,
        reg: &Sequence,
        a: &Value,
    ) -> Result<DecidedTransition, LearningError> {
        let i = reg_size[&q];
        let tau = reg.append(a.clone()).map_err(DraError::TypeMismatch)?;

        let mut to_erase: BTreeSet<usize> = BTreeSet::new();
        let mut to_retain: Vec<usize> = (0..=i).collect();
        if let Some(j) = reg.index_of(a) {
            to_erase.insert(j);
            to_retain.retain(|&h| h != j);
        }

        while let Some(h) = to_retain.pop() {
            let mut candidate = automaton.clone();
            let f = candidate.num_locations();
            candidate.add_location(f, f.to_string(), false)?;
            to_erase.insert(h);
            candidate.add_transition(q, tau.clone(), to_erase.clone(), f)?;
            if !self.s_completable(&candidate)? {
                to_erase.remove(&h);
            }
        }

        let new_reg_size = i + 1 - to_erase.len();
        for p in 0..automaton.num_locations() {
            if reg_size.get(&p).copied() != Some(new_reg_size) {
                continue;
            }
            let mut candidate = automaton.clone();
            candidate.add_transition(q, tau.clone(), to_erase.clone(), p)?;
            if self.s_completable(&candidate)? {
                return Ok(DecidedTransition {
                    source: q,
                    tau,
                    forget: to_erase,
                    target: p,
                });
            }
        }

        Ok(DecidedTransition {
            source: q,
            tau,
            forget: to_erase,
            target: automaton.num_locations(),
        })
    }

    /// Conservative S-completability check (spec §4.F): reject if a
    /// negative sample is already accepted, or if some positive/negative
    /// pair is forced to agree by reaching the same location with
    /// same-type registers and same-type continuations.
    fn s_completable(&self, automaton: &RegisterAutomaton) -> Result<bool, LearningError> {
        for z in &self.sample.negative {
            if automaton.is_accepted(z)? {
                return Ok(false);
            }
        }

        let alphabet = *automaton.alphabet();
        let initial = automaton
            .initial()
            .ok_or_else(|| LearningError::LearningFailure("no initial location".into()))?;

        for w in &self.sample.positive {
            for z in &self.sample.negative {
                let mut w_state = initial;
                let mut w_reg = alphabet.empty_sequence();
                let mut w_pos = 0usize;

                loop {
                    let mut z_state = initial;
                    let mut z_reg = alphabet.empty_sequence();
                    let mut z_readable = true;

                    for j in 0..=z.len() {
                        if j == 0 {
                            if w_pos == 0 {
                                continue;
                            }
                        } else {
                            let letter = z.get(j - 1).unwrap();
                            let cfg = Configuration {
                                location: z_state,
                                registers: z_reg.clone(),
                                last: None,
                            };
                            match automaton.step(&cfg, letter)? {
                                Some(next) => {
                                    z_state = next.location;
                                    z_reg = next.registers;
                                }
                                None => {
                                    z_readable = false;
                                }
                            }
                        }
                        if !z_readable {
                            break;
                        }
                        let z_suffix = z.suffix(j);

                        if w_state != z_state {
                            continue;
                        }
                        if !alphabet.same_type(&w_reg, &z_reg) {
                            return Ok(false);
                        }
                        let w_suffix = w.suffix(w_pos);
                        let w_type = w_reg.concat(&w_suffix).map_err(DraError::TypeMismatch)?;
                        let z_type = z_reg.concat(&z_suffix).map_err(DraError::TypeMismatch)?;
                        if alphabet.same_type(&w_type, &z_type) {
                            return Ok(false);
                        }
                    }

                    if w_pos >= w.len() {
                        break;
                    }
                    let letter = w.get(w_pos).unwrap();
                    let cfg = Configuration {
                        location: w_state,
                        registers: w_reg.clone(),
                        last: None,
                    };
                    match automaton.step(&cfg, letter)? {
                        Some(next) => {
                            w_state = next.location;
                            w_reg = next.registers;
                            w_pos += 1;
                        }
                        None => break,
                    }
                }
            }
        }
        Ok(true)
    }
}
