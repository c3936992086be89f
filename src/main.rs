#[tokio::main]
async fn main() {
    if let Err(err) = redash_mcp::mcp::server::run_stdio().await {
        eprintln!("redash-mcp: {}", err);
        std::process::exit(1);
    }
}
