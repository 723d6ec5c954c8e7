use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    infraquery::cli::run_cli().await
}
