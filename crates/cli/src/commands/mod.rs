pub mod config;
pub mod generate;
pub mod inspect;
pub mod version;

pub use config::*;
pub use generate::*;
pub use inspect::*;
pub use version::*;
