#[cfg(feature = "elf-reader")]
pub mod elf;
pub mod ldd;

#[cfg(feature = "elf-reader")]
pub use elf::ElfReader;
pub use ldd::{parse_ldd_output, LddQuery};
