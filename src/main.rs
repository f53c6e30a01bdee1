//! Equity by Design backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = equity_backend::run().await {
        tracing::error!(error = %e, "Server exited with error");
        eprintln!("equity-backend: {e}");
        std::process::exit(1);
    }
}
