pub mod duplicate;
pub mod economics;
pub mod legality;

pub use duplicate::DuplicateStage;
pub use economics::EconomicStage;
pub use legality::LegalityStage;
