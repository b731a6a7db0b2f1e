pub mod outcome;
pub mod transform;
