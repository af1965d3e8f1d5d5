pub mod core;
pub mod grades;
pub mod weights;
