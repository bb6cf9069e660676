//! Bookshelf demo binary
//!
//! Runs one lending session against an in-memory catalog: the catalog loads,
//! three books are borrowed, a fourth is refused, one is returned and the
//! refused one goes through. The remote catalog then changes and reports an
//! error while the session is live.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p bookshelf-demo
//! ```

use bookshelf_catalog::{FeedConfig, InMemoryCatalogSource};
use bookshelf_core::source::FeedError;
use bookshelf_demo::{Session, seed_catalog};
use bookshelf_runtime::metrics::PrometheusRecorder;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bookshelf_demo=debug,bookshelf_runtime=debug,bookshelf_catalog=info,bookshelf_lending=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut recorder = PrometheusRecorder::new();
    recorder.install()?;

    println!("=== Bookshelf Demo ===\n");

    let source = InMemoryCatalogSource::new();
    source.set_collection("books", seed_catalog());

    let session = Session::start(source.clone(), FeedConfig::default().with_endpoint("in-memory"))?;
    if !session.loaded().await {
        anyhow::bail!("catalog feed stopped before loading");
    }

    let catalog = session.catalog();
    println!("Available Books ({})", catalog.len());
    for book in &catalog {
        println!("  {} - {} by {} ({} pages)", book.id, book.title, book.author, book.pages);
    }

    println!("\n>>> Borrowing b1, b2, b3");
    for id in ["b1", "b2", "b3"] {
        session.borrow(id)?;
    }

    println!("\n>>> Borrowing b4 (over the limit)");
    match session.borrow("b4") {
        Ok(_) => println!("Unexpectedly borrowed b4"),
        Err(error) => println!("Refused: {error:#}"),
    }

    println!("\n>>> Returning b2, then borrowing b4");
    session.return_book("b2");
    let state = session.borrow("b4")?;
    println!(
        "Borrowed: {}",
        state.ids().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );

    println!("\n>>> Borrowing b3 again");
    if let Err(error) = session.borrow("b3") {
        println!("Refused: {error:#}");
    }

    println!("\n>>> Remote catalog changes");
    source.put_entry(
        "books",
        "b6",
        json!({
            "title": "Piranesi",
            "author": "Susanna Clarke",
            "genre": "Fantasy",
            "pages": 272,
            "coverImage": "https://covers.example/piranesi.jpg",
            "description": "The beauty of the House is immeasurable."
        }),
    );
    source.report_error("books", &FeedError::Transport("connection reset".into()));
    println!("Catalog now holds {} books", session.catalog().len());

    session.stop();
    source.remove_entry("books", "b1");
    println!("After stop the session still shows {} books", session.catalog().len());

    if let Some(metrics) = recorder.render() {
        println!("\n=== Metrics ===\n{metrics}");
    }

    println!("=== Session complete ===");
    Ok(())
}
