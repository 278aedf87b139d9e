use hemmer_provider_terraxcel::{init_logging, serve, TerraxcelProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(TerraxcelProvider::new()).await
}
