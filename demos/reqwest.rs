//! Read events from an SSE endpoint until it closes or Ctrl-C is pressed
//!
//! Run with: RUST_LOG=ssereader=trace cargo run --example reqwest -- http://localhost:8080/events

use futures::StreamExt;
use ssereader::EventReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/events".to_string());

    let mut reader = EventReader::new();
    let mut events = reader.start(reqwest::Client::new().get(url));

    // stopping from another task ends the stream cleanly
    let stop = events.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    println!("Connecting to SSE stream...");

    while let Some(result) = events.next().await {
        match result {
            Ok(event) => println!("Data: {event}"),
            Err(e) if e.is_status_err() => {
                eprintln!("Server returned error response: {e}");
                break;
            }
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    println!("Stream ended");
    Ok(())
}
