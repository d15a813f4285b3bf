use std::collections::BTreeSet;

use dra_core::{Alphabet, Sequence, Value};
use dra::{Configuration, DraError, RegisterAutomaton, Teacher};

use crate::error::LearningError;
use crate::table::ObservationTable;

/// The L*-style active learner: drives an [`ObservationTable`], builds a
/// hypothesis DRA from it, and processes counterexamples from a
/// [`Teacher`]'s equivalence queries until none remain (spec §4.E).
///
/// Grounded on spec §4.E directly (the closest prior art, `learner.py`, only
/// sketches example automata, not the loop); the drive-to-convergence shape
/// follows `automata-learning/src/active/oracle.rs`'s `Oracle`/`lstar` loop.
pub struct ActiveLearner<'a, 'b> {
    teacher: &'b mut Teacher<'a>,
    alphabet: Alphabet,
    table: ObservationTable,
}

/// Positions of `extended` (a row's register appended with the just-read
/// input `a`) to forget when transitioning into a row whose memorable
/// register is `next_memorable`: positions whose value is absent from
/// `next_memorable`, or an earlier duplicate of `a` itself (spec §4.E).
fn extended_forget_set(extended: &Sequence, next_memorable: &Sequence, a: &Value) -> BTreeSet<usize> {
    let n = extended.len() - 1;
    let mut forget = BTreeSet::new();
    for k in 0..extended.len() {
        let v = extended.get(k).unwrap();
        let not_retained = !next_memorable.values().contains(v);
        let earlier_duplicate = k < n && v == a;
        if not_retained || earlier_duplicate {
            forget.insert(k);
        }
    }
    forget
}

impl<'a, 'b> ActiveLearner<'a, 'b> {
    pub fn new(teacher: &'b mut Teacher<'a>, alphabet: Alphabet) -> ActiveLearner<'a, 'b> {
        ActiveLearner {
            teacher,
            alphabet,
            table: ObservationTable::new(alphabet),
        }
    }

    pub fn table(&self) -> &ObservationTable {
        &self.table
    }

    /// Creates the empty table, seeds row `(ε, ε)` and column `ε`, and
    /// closes it.
    pub fn start(&mut self) -> Result<(), LearningError> {
        self.table.insert_row(self.teacher, self.alphabet.empty_sequence())?;
        self.table.insert_column(self.teacher, self.alphabet.empty_sequence())?;
        self.table.close(self.teacher)?;
        Ok(())
    }

    /// Builds a hypothesis DRA with one location per row.
    pub fn hypothesis(&mut self) -> Result<RegisterAutomaton, LearningError> {
        let mut ra = RegisterAutomaton::new(self.alphabet);
        let row_count = self.table.rows().len();
        for i in 0..row_count {
            ra.add_location(i, format!("q{i}"), false)?;
        }
        for i in 0..row_count {
            let prefix = self.table.rows()[i].prefix.clone();
            let accepting = self.teacher.member(&prefix)?;
            ra.set_accepting(i, accepting)?;
        }

        let eps = self.alphabet.empty_sequence();
        let initial_idx = self
            .table
            .rows()
            .iter()
            .position(|r| r.prefix == eps)
            .ok_or_else(|| LearningError::LearningFailure("no row for the empty prefix".into()))?;
        ra.set_initial(initial_idx)?;

        for i in 0..row_count {
            let row_memorable = self.table.rows()[i].memorable.clone();
            let candidates = self.table.extension_candidates(self.teacher, i)?;
            for (a, cand_prefix, cand_mem) in candidates {
                let j = self
                    .table
                    .equivalent_row_index(self.teacher, &cand_prefix, &cand_mem)?
                    .ok_or_else(|| {
                        LearningError::LearningFailure(format!(
                            "extension candidate {cand_prefix} has no equivalent row after close()"
                        ))
                    })?;
                let tau = row_memorable.append(a.clone()).map_err(DraError::TypeMismatch)?;
                let forget = extended_forget_set(&tau, &cand_mem, &a);
                ra.add_transition(i, tau, forget, j)?;
            }
        }
        Ok(ra)
    }

    /// Processes a counterexample on which the current hypothesis and the
    /// target disagree, adding exactly one new row and one new column.
    ///
    /// Walks `cex` against the hypothesis, comparing at each step the
    /// walked-to location's representative `(rep_p, rep_μ)` against the
    /// counterexample's own `(p, μ_p)`; the first disagreement fixes the
    /// split point. `p·s = cex` throughout; this differs from a literal
    /// `s = cex[i+1..]` reading, which would drop the letter at `i` and
    /// break that invariant — see `DESIGN.md`.
    pub fn refine(&mut self, cex: &Sequence) -> Result<(), LearningError> {
        let hypothesis = self.hypothesis()?;
        let cex_accept = self.teacher.member(cex)?;

        let mut location = hypothesis
            .initial()
            .ok_or_else(|| LearningError::LearningFailure("hypothesis has no initial location".into()))?;
        let mut registers = self.alphabet.empty_sequence();

        for i in 0..cex.len() {
            let p = cex.prefix(i);
            let s = cex.suffix(i);
            let mu_p = self.teacher.memorable(&p)?;

            let row = self.table.rows()[location].clone();
            let rep_p = row.prefix;
            let rep_mu = row.memorable;

            let same_type = self.alphabet.same_type(&rep_mu, &mu_p);
            let mut must_split = !same_type;
            if same_type {
                let sigma = self
                    .alphabet
                    .bijective_map(&mu_p, &rep_mu)
                    .map_err(DraError::TypeMismatch)?;
                let mapped_s = s.apply_map(&sigma);
                let word = rep_p.concat(&mapped_s).map_err(DraError::TypeMismatch)?;
                if self.teacher.member(&word)? != cex_accept {
                    must_split = true;
                }
            }

            if must_split {
                let sigma_inv = self
                    .alphabet
                    .bijective_map(&rep_mu, &mu_p)
                    .map_err(DraError::TypeMismatch)?;
                let new_prefix = p.apply_map(&sigma_inv);
                let new_memorable = mu_p.apply_map(&sigma_inv);
                let sigma = self
                    .alphabet
                    .bijective_map(&mu_p, &rep_mu)
                    .map_err(DraError::TypeMismatch)?;
                let new_column = s.apply_map(&sigma);

                self.table.insert_row(self.teacher, new_prefix)?;
                self.table.insert_column(self.teacher, new_column)?;
                let _ = new_memorable;
                return Ok(());
            }

            let letter = cex.get(i).unwrap();
            let cfg = Configuration {
                location,
                registers: registers.clone(),
                last: None,
            };
            match hypothesis.step(&cfg, letter)? {
                Some(next) => {
                    location = next.location;
                    registers = next.registers;
                }
                None => {
                    return Err(LearningError::LearningFailure(
                        "hypothesis has no transition while walking a counterexample".into(),
                    ))
                }
            }
        }

        Err(LearningError::LearningFailure(
            "counterexample did not produce a refinement".into(),
        ))
    }

    /// Runs `start`, then alternates `hypothesis`/`equivalent`/`refine`
    /// until the teacher reports no distinguishing word.
    pub fn learn(&mut self) -> Result<RegisterAutomaton, LearningError> {
        self.start()?;
        loop {
            let hyp = self.hypothesis()?;
            match self.teacher.equivalent(&hyp)? {
                None => return Ok(hyp),
                Some(cex) => {
                    self.refine(&cex)?;
                    self.table.close(self.teacher)?;
                }
            }
        }
    }
}
