pub mod correlation;
pub mod fuzzy;
