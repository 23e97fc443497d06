#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examtrack::run().await {
        eprintln!("examtrack fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
