#[tokio::main]
async fn main() -> anyhow::Result<()> {
    zendo_lib::run().await
}
