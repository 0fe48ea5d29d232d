pub mod backends;
pub mod generator;
