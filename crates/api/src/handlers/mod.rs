pub mod generation;
pub mod system;
