//! Example: print link-preview metadata as JSON
//!
//! ```text
//! cargo run --example fetch_demo -- https://github.com/colszowka/simplecov
//! cargo run --example fetch_demo -- --text "see www.xkcd.com/about/ and http://example.com."
//! RUST_LOG=metapage=debug cargo run --example fetch_demo -- http://localhost:3000
//! ```

use metapage::Metapage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("metapage=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let client = Metapage::new();

    match args.as_slice() {
        [flag, text @ ..] if flag == "--text" => {
            let text = text.join(" ");
            let records = client.try_extract(&text).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        [] => {
            eprintln!("usage: fetch_demo <url>... | --text <text>");
        }
        urls => {
            for url in urls {
                println!("Fetching: {}", url);
                match client.try_fetch(url).await {
                    Ok(meta) => println!("{}", serde_json::to_string_pretty(&meta)?),
                    Err(err) => println!("  failed ({:?}): {}", err.kind(), err),
                }
            }
        }
    }

    Ok(())
}
