//! Similarity search engine - entry point.
//!
//! Minimal entry point that delegates to the library crate.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    search_engine::run().await
}
