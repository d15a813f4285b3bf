pub mod active;
pub mod characteristic;
pub mod error;
pub mod passive;
pub mod table;

pub use active::ActiveLearner;
pub use characteristic::CharacteristicSampleGenerator;
pub use error::LearningError;
pub use passive::RpniLearner;
pub use table::{ObservationTable, Row};
