use vmcloud_provider::{init_logging, serve, VmCloudProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(VmCloudProvider::new()).await
}
