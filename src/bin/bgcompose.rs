//! Background composition CLI tool
//!
//! Composes cut-out subjects onto preset, local or searched backgrounds.

#[cfg(feature = "cli")]
use bgcompose::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
