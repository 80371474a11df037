use anyhow::Result;
use topsy::Client;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Set RUST_LOG=topsy=debug to see each request.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Configure the key via TOPSY_API_KEY or a `.topsyrc` file.
    let client = Client::from_env()?;

    let author = client.call("authorinfo", [("url", "http://twitter.com/thesmart")])?;
    println!("name: {}", author["name"]);

    match client.last_limit() {
        Some(remaining) => println!("calls remaining: {}", remaining),
        None => println!("calls remaining: unknown"),
    }
    Ok(())
}
