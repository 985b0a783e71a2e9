pub mod atom;
pub mod paper;
