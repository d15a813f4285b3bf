use std::collections::HashSet;

use dra_core::{Alphabet, Sequence, Value};
use dra::{DraError, Teacher};

use crate::error::LearningError;

/// A row keyed by `(prefix, memorable)` (spec §4.D): `prefix` is an access
/// word to a putative location, `memorable = μ(prefix)`, and `cells[c]`
/// holds the acceptance of `prefix · columns[c]`.
#[derive(Debug, Clone)]
pub struct Row {
    pub prefix: Sequence,
    pub memorable: Sequence,
    pub cells: Vec<bool>,
}

/// The shared mutable structure the active learner drives: rows grow via
/// `close`, columns grow via counterexample refinement, both monotonically.
///
/// Grounded on `original_source/obtable.py`'s bare row/column/cell sketch,
/// filled out per spec §4.D with the bijective-remapping equivalence test
/// and the negative-equivalence cache.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    alphabet: Alphabet,
    rows: Vec<Row>,
    columns: Vec<Sequence>,
    negative_cache: HashSet<(String, usize)>,
}

impl ObservationTable {
    pub fn new(alphabet: Alphabet) -> ObservationTable {
        ObservationTable {
            alphabet,
            rows: Vec::new(),
            columns: Vec::new(),
            negative_cache: HashSet::new(),
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[Sequence] {
        &self.columns
    }

    /// Adds a row for `prefix`, filling every existing column via
    /// membership queries.
    pub fn insert_row(&mut self, teacher: &mut Teacher, prefix: Sequence) -> Result<usize, LearningError> {
        let memorable = teacher.memorable(&prefix)?;
        let mut cells = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let word = prefix.concat(col).map_err(DraError::TypeMismatch)?;
            cells.push(teacher.member(&word)?);
        }
        let idx = self.rows.len();
        self.rows.push(Row {
            prefix,
            memorable,
            cells,
        });
        Ok(idx)
    }

    /// Extends every existing row with one new membership query.
    pub fn insert_column(&mut self, teacher: &mut Teacher, suffix: Sequence) -> Result<(), LearningError> {
        for row in &mut self.rows {
            let word = row.prefix.concat(&suffix).map_err(DraError::TypeMismatch)?;
            let value = teacher.member(&word)?;
            row.cells.push(value);
        }
        self.columns.push(suffix);
        Ok(())
    }

    /// The extension candidates of row `row_idx`: `(a, prefix·a, μ(prefix·a))`
    /// for every `a` in the letter extension of the row's memorable pattern.
    pub fn extension_candidates(
        &self,
        teacher: &mut Teacher,
        row_idx: usize,
    ) -> Result<Vec<(Value, Sequence, Sequence)>, LearningError> {
        let row = &self.rows[row_idx];
        let extension = self.alphabet.letter_extension(&row.memorable);
        let mut out = Vec::with_capacity(extension.len());
        for a in extension.values() {
            let candidate_prefix = row.prefix.append(a.clone()).map_err(DraError::TypeMismatch)?;
            let candidate_memorable = teacher.memorable(&candidate_prefix)?;
            out.push((a.clone(), candidate_prefix, candidate_memorable));
        }
        Ok(out)
    }

    /// Finds a row equivalent to `(candidate_prefix, candidate_memorable)`:
    /// same-type memorables, and for every column `c`,
    /// `member(σ(candidate_prefix) · c) == row.cells[c]` where
    /// `σ = bijective_map(candidate_memorable, row.memorable)`.
    ///
    /// Negative results are cached per `(candidate, row)` pair and never
    /// evicted: inserting a new column can only turn a cached equivalence
    /// into a disagreement, never the reverse, so a cached "not equivalent"
    /// stays valid as columns grow.
    pub fn equivalent_row_index(
        &mut self,
        teacher: &mut Teacher,
        candidate_prefix: &Sequence,
        candidate_memorable: &Sequence,
    ) -> Result<Option<usize>, LearningError> {
        let candidate_key = format!("{candidate_prefix}|{candidate_memorable}");
        for i in 0..self.rows.len() {
            if self.negative_cache.contains(&(candidate_key.clone(), i)) {
                continue;
            }
            let row = &self.rows[i];
            if !self.alphabet.same_type(candidate_memorable, &row.memorable) {
                continue;
            }
            let sigma = self
                .alphabet
                .bijective_map(candidate_memorable, &row.memorable)
                .map_err(DraError::TypeMismatch)?;
            let mapped_prefix = candidate_prefix.apply_map(&sigma);

            let mut equivalent = true;
            for (c, col) in self.columns.iter().enumerate() {
                let word = mapped_prefix.concat(col).map_err(DraError::TypeMismatch)?;
                let value = teacher.member(&word)?;
                if value != self.rows[i].cells[c] {
                    equivalent = false;
                    break;
                }
            }
            if equivalent {
                return Ok(Some(i));
            }
            self.negative_cache.insert((candidate_key.clone(), i));
        }
        Ok(None)
    }

    /// Iterates: for each extension candidate of every row, inserts it as a
    /// new row if no equivalent row exists. Repeats until a round adds
    /// nothing. Each round may add rows but never columns.
    pub fn close(&mut self, teacher: &mut Teacher) -> Result<(), LearningError> {
        loop {
            let mut added = false;
            let row_count = self.rows.len();
            for i in 0..row_count {
                let candidates = self.extension_candidates(teacher, i)?;
                for (_a, cand_prefix, cand_mem) in candidates {
                    if self
                        .equivalent_row_index(teacher, &cand_prefix, &cand_mem)?
                        .is_none()
                    {
                        self.insert_row(teacher, cand_prefix)?;
                        added = true;
                    }
                }
            }
            if !added {
                break;
            }
        }
        Ok(())
    }

    /// Renders the table as a grid (prefix, memorable, one column per
    /// suffix) for `--verbose` CLI output, using the same `tabled` builder
    /// the teacher depends on for tabular debug output.
    pub fn render(&self) -> String {
        let mut builder = tabled::builder::Builder::default();

        let mut header = vec!["prefix".to_string(), "memorable".to_string()];
        header.extend(self.columns.iter().map(|c| format!("{c}")));
        builder.push_record(header);

        for row in &self.rows {
            let mut record = vec![format!("{}", row.prefix), format!("{}", row.memorable)];
            record.extend(row.cells.iter().map(|b| if *b { "+".to_string() } else { "-".to_string() }));
            builder.push_record(record);
        }

        builder.build().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dra::RegisterAutomaton;
    use dra_core::{Comparator, Domain};
    use std::collections::BTreeSet;

    fn trivial_lt_automaton() -> RegisterAutomaton {
        // Accepts every word of length >= 1 (register forgets everything).
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Lt);
        let mut ra = RegisterAutomaton::new(alphabet);
        ra.add_location(0, "eps", false).unwrap();
        ra.add_location(1, "acc", true).unwrap();
        ra.set_initial(0).unwrap();
        let tau = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        ra.add_transition(0, tau, [0].into_iter().collect::<BTreeSet<_>>(), 1)
            .unwrap();
        let self_tau = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        ra.add_transition(1, self_tau, [0].into_iter().collect(), 1)
            .unwrap();
        ra
    }

    #[test]
    fn start_and_close_produces_two_rows() {
        let ra = trivial_lt_automaton();
        let mut teacher = Teacher::new(&ra);
        let alphabet = *ra.alphabet();

        let mut table = ObservationTable::new(alphabet);
        table.insert_row(&mut teacher, alphabet.empty_sequence()).unwrap();
        table.insert_column(&mut teacher, alphabet.empty_sequence()).unwrap();
        table.close(&mut teacher).unwrap();

        assert!(table.rows().len() >= 2);
    }

    #[test]
    fn render_includes_header_and_every_row() {
        let ra = trivial_lt_automaton();
        let mut teacher = Teacher::new(&ra);
        let alphabet = *ra.alphabet();

        let mut table = ObservationTable::new(alphabet);
        table.insert_row(&mut teacher, alphabet.empty_sequence()).unwrap();
        table.insert_column(&mut teacher, alphabet.empty_sequence()).unwrap();
        table.close(&mut teacher).unwrap();

        let rendered = table.render();
        assert!(rendered.contains("prefix"));
        assert!(rendered.contains("memorable"));
    }
}
