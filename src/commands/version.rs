use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("devpulse version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
