// Business domains
pub mod generation;
