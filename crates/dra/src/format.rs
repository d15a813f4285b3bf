use std::collections::BTreeSet;
use std::fmt::Write as _;

use dra_core::{Alphabet, Comparator, Domain, Sequence, Value};

use crate::automaton::RegisterAutomaton;
use crate::error::DraError;

/// A labeled sample of positive/negative data-words sharing one alphabet
/// (spec §6 "Sample format").
#[derive(Debug, Clone)]
pub struct Sample {
    pub alphabet: Alphabet,
    pub positive: Vec<Sequence>,
    pub negative: Vec<Sequence>,
}

fn parse_alphabet_line(line: &str) -> Result<Alphabet, DraError> {
    let rest = line
        .strip_prefix("alphabet:")
        .ok_or_else(|| DraError::InvalidInput(format!("expected 'alphabet:' line, found {line:?}")))?;
    let (domain_raw, comparator_raw) = rest
        .split_once(',')
        .ok_or_else(|| DraError::InvalidInput(format!("malformed alphabet line: {line:?}")))?;
    let domain: Domain = domain_raw.trim().parse().map_err(DraError::TypeMismatch)?;
    let comparator: Comparator = comparator_raw.trim().parse().map_err(DraError::TypeMismatch)?;
    Ok(Alphabet::new(domain, comparator))
}

fn format_alphabet_line(alphabet: &Alphabet) -> String {
    format!("alphabet: {}, {}", alphabet.domain(), alphabet.comparator())
}

/// Writes a DRA to the textual format of spec §6.
pub fn to_text(ra: &RegisterAutomaton) -> String {
    let mut out = String::new();
    writeln!(out, "# Register Automaton").unwrap();
    writeln!(out, "{}", format_alphabet_line(ra.alphabet())).unwrap();
    writeln!(out, "initial: {}", ra.initial().unwrap_or(0)).unwrap();
    writeln!(out, "locations:").unwrap();
    for loc in ra.locations() {
        writeln!(out, "  {} \"{}\" accepting={}", loc.id, loc.name, loc.accepting).unwrap();
    }
    writeln!(out, "transitions:").unwrap();
    for loc in ra.locations() {
        for t in &loc.transitions {
            let values: Vec<String> = t.tau.values().iter().map(|v| v.to_string()).collect();
            let forget: Vec<String> = t.forget.iter().map(|i| i.to_string()).collect();
            writeln!(
                out,
                "  {} -> {} : tau=[{}], E={{{}}}",
                t.source,
                t.target,
                values.join(","),
                forget.join(",")
            )
            .unwrap();
        }
    }
    out
}

fn parse_values(alphabet: &Alphabet, raw: &str) -> Result<Vec<Value>, DraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|v| alphabet.make_value(v.trim()).map_err(DraError::TypeMismatch))
        .collect()
}

fn parse_indices(raw: &str) -> Result<BTreeSet<usize>, DraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(BTreeSet::new());
    }
    trimmed
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| DraError::InvalidInput(format!("malformed index {v:?} in E set")))
        })
        .collect()
}

/// Parses a DRA from the textual format of spec §6. The parser does not
/// enforce determinism, completeness, or transition type-sharing — that is
/// `normalise`'s job.
pub fn from_text(text: &str) -> Result<RegisterAutomaton, DraError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let header = lines
        .next()
        .ok_or_else(|| DraError::InvalidInput("empty input".into()))?;
    if header != "# Register Automaton" {
        return Err(DraError::InvalidInput(format!(
            "expected '# Register Automaton' header, found {header:?}"
        )));
    }

    let alphabet_line = lines
        .next()
        .ok_or_else(|| DraError::InvalidInput("missing alphabet line".into()))?;
    let alphabet = parse_alphabet_line(alphabet_line)?;

    let initial_line = lines
        .next()
        .ok_or_else(|| DraError::InvalidInput("missing initial line".into()))?;
    let initial: usize = initial_line
        .strip_prefix("initial:")
        .ok_or_else(|| DraError::InvalidInput(format!("expected 'initial:' line, found {initial_line:?}")))?
        .trim()
        .parse()
        .map_err(|_| DraError::InvalidInput(format!("malformed initial location in {initial_line:?}")))?;

    let locations_header = lines
        .next()
        .ok_or_else(|| DraError::InvalidInput("missing 'locations:' header".into()))?;
    if locations_header != "locations:" {
        return Err(DraError::InvalidInput(format!(
            "expected 'locations:' header, found {locations_header:?}"
        )));
    }

    let mut ra = RegisterAutomaton::new(alphabet);
    let mut rest: Vec<&str> = lines.collect();

    let split_at = rest
        .iter()
        .position(|l| *l == "transitions:")
        .ok_or_else(|| DraError::InvalidInput("missing 'transitions:' header".into()))?;
    let transition_lines = rest.split_off(split_at + 1);
    let location_lines = &rest[..split_at];

    for line in location_lines {
        let (id_raw, rest) = line
            .split_once(' ')
            .ok_or_else(|| DraError::InvalidInput(format!("malformed location line: {line:?}")))?;
        let id: usize = id_raw
            .trim()
            .parse()
            .map_err(|_| DraError::InvalidInput(format!("malformed location id in {line:?}")))?;
        let rest = rest.trim();
        let name_end = rest
            .strip_prefix('"')
            .and_then(|s| s.find('"'))
            .ok_or_else(|| DraError::InvalidInput(format!("malformed location name in {line:?}")))?;
        let name = &rest[1..1 + name_end];
        let accepting_raw = rest[1 + name_end + 1..]
            .trim()
            .strip_prefix("accepting=")
            .ok_or_else(|| DraError::InvalidInput(format!("missing 'accepting=' in {line:?}")))?;
        let accepting = match accepting_raw.trim() {
            "True" => true,
            "False" => false,
            other => {
                return Err(DraError::InvalidInput(format!(
                    "expected True/False for accepting, found {other:?}"
                )))
            }
        };
        ra.add_location(id, name, accepting)?;
    }
    ra.set_initial(initial)?;

    for line in transition_lines {
        let (src_tgt, rest) = line
            .split_once(':')
            .ok_or_else(|| DraError::InvalidInput(format!("malformed transition line: {line:?}")))?;
        let (src_raw, tgt_raw) = src_tgt
            .split_once("->")
            .ok_or_else(|| DraError::InvalidInput(format!("missing '->' in {line:?}")))?;
        let source: usize = src_raw
            .trim()
            .parse()
            .map_err(|_| DraError::InvalidInput(format!("malformed source in {line:?}")))?;
        let target: usize = tgt_raw
            .trim()
            .parse()
            .map_err(|_| DraError::InvalidInput(format!("malformed target in {line:?}")))?;

        let rest = rest.trim();
        let tau_raw = rest
            .strip_prefix("tau=[")
            .and_then(|s| s.split_once(']'))
            .ok_or_else(|| DraError::InvalidInput(format!("malformed tau in {line:?}")))?;
        let (tau_values_raw, after_tau) = tau_raw;
        let tau_values = parse_values(&alphabet, tau_values_raw)?;
        let tau = alphabet.make_sequence(tau_values).map_err(DraError::TypeMismatch)?;

        let forget_raw = after_tau
            .trim()
            .trim_start_matches(',')
            .trim()
            .strip_prefix("E={")
            .and_then(|s| s.split_once('}'))
            .ok_or_else(|| DraError::InvalidInput(format!("malformed E set in {line:?}")))?
            .0;
        let forget = parse_indices(forget_raw)?;

        ra.add_transition(source, tau, forget, target)?;
    }

    Ok(ra)
}

fn format_sample_line(s: &Sequence) -> String {
    s.values()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes a sample to the textual format of spec §6.
pub fn sample_to_text(sample: &Sample) -> String {
    let mut out = String::new();
    writeln!(out, "{}", format_alphabet_line(&sample.alphabet)).unwrap();
    for w in &sample.positive {
        writeln!(out, "pos: {}", format_sample_line(w)).unwrap();
    }
    for w in &sample.negative {
        writeln!(out, "neg: {}", format_sample_line(w)).unwrap();
    }
    out
}

/// Parses a sample from the textual format of spec §6.
pub fn sample_from_text(text: &str) -> Result<Sample, DraError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let alphabet_line = lines
        .next()
        .ok_or_else(|| DraError::InvalidInput("empty input".into()))?;
    let alphabet = parse_alphabet_line(alphabet_line)?;

    let mut positive = Vec::new();
    let mut negative = Vec::new();
    for line in lines {
        if let Some(rest) = line.strip_prefix("pos:") {
            positive.push(parse_sample_word(&alphabet, rest)?);
        } else if let Some(rest) = line.strip_prefix("neg:") {
            negative.push(parse_sample_word(&alphabet, rest)?);
        } else {
            return Err(DraError::InvalidInput(format!(
                "expected 'pos:' or 'neg:' line, found {line:?}"
            )));
        }
    }
    Ok(Sample {
        alphabet,
        positive,
        negative,
    })
}

fn parse_sample_word(alphabet: &Alphabet, raw: &str) -> Result<Sequence, DraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(alphabet.empty_sequence());
    }
    let values: Vec<Value> = trimmed
        .split_whitespace()
        .map(|v| alphabet.make_value(v).map_err(DraError::TypeMismatch))
        .collect::<Result<_, _>>()?;
    alphabet.make_sequence(values).map_err(DraError::TypeMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn small_automaton() -> RegisterAutomaton {
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Lt);
        let mut ra = RegisterAutomaton::new(alphabet);
        ra.add_location(0, "eps", false).unwrap();
        ra.add_location(1, "acc", true).unwrap();
        ra.set_initial(0).unwrap();
        let tau = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        ra.add_transition(0, tau, BTreeSet::new(), 1).unwrap();
        let self_tau = alphabet.make_sequence(vec![Value::rational_from_i64(0)]).unwrap();
        ra.add_transition(1, self_tau, [0].into_iter().collect(), 1)
            .unwrap();
        ra
    }

    #[test]
    fn round_trips_through_text() {
        let ra = small_automaton();
        let text = to_text(&ra);
        let parsed = from_text(&text).unwrap();
        assert_eq!(parsed.num_locations(), ra.num_locations());
        assert_eq!(parsed.num_transitions(), ra.num_transitions());
        assert_eq!(parsed.initial(), ra.initial());
    }

    #[test]
    fn rejects_missing_header() {
        let err = from_text("alphabet: rational, <\n").unwrap_err();
        assert!(matches!(err, DraError::InvalidInput(_)));
    }

    #[test]
    fn sample_round_trips() {
        let alphabet = Alphabet::new(Domain::Rational, Comparator::Eq);
        let w = alphabet
            .make_sequence(vec![Value::rational_from_i64(1), Value::rational_from_i64(2)])
            .unwrap();
        let sample = Sample {
            alphabet,
            positive: vec![w.clone()],
            negative: vec![alphabet.empty_sequence()],
        };
        let text = sample_to_text(&sample);
        let parsed = sample_from_text(&text).unwrap();
        assert_eq!(parsed.positive, vec![w]);
        assert_eq!(parsed.negative.len(), 1);
    }
}
