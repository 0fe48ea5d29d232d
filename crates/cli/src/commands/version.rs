use anyhow::Result;

/// Print the CLI and core versions.
pub fn version_command() -> Result<()> {
    println!("abi-facts v{}", env!("CARGO_PKG_VERSION"));
    println!("abi-facts-core v{}", abi_facts_core::version());
    Ok(())
}
