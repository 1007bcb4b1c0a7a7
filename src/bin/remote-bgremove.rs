//! Remote Background Removal CLI Tool
//!
//! Command-line interface for removing image backgrounds through a remote
//! service using the remote-bgremove library.

#[cfg(feature = "cli")]
use remote_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
