//! Dense ordered alphabets and register sequences for register automata.
//!
//! This crate owns the leaf data model (spec §4.A): [`value::Value`] and
//! [`value::Domain`]/[`value::Comparator`], [`sequence::Sequence`] with its
//! same-type predicate and bijective dense map, and the [`alphabet::Alphabet`]
//! that ties a domain and comparator together. It has no notion of
//! automata, locations, or transitions — that lives in the `dra` crate.

pub mod alphabet;
pub mod error;
pub mod sequence;
pub mod value;

pub use alphabet::Alphabet;
pub use error::CoreError;
pub use sequence::{
    ascending_value_rank, bijective_map, letter_extension, same_type, type_signature,
    BijectiveMap, Sequence,
};
pub use value::{Comparator, Domain, Value};
