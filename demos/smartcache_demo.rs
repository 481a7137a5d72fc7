//! Smart Cache Demo
//!
//! Shows a table answering repeated queries from its cache while writes keep
//! the cached results current.
//!
//! Usage:
//!   cargo run --example smartcache_demo
//!
//! Environment variables:
//!   DOCSTORE_CACHE_CAPACITY - number of cached queries (default: 10)
//!   DOCSTORE_CACHE_EVICTION - fifo or lru (default: fifo)
//!   RUST_LOG                - log filter (default: info)

use ouroboros_docstore::{field, fields, CacheConfig, Document, Query, Table, Update};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("=== Smart Cache Demo ===");

    let config = CacheConfig::from_env()?;
    info!("Cache config: {:?}", config);
    let mut table = Table::with_config("people", config);

    table.insert_multiple(vec![
        fields(json!({"name": "Ann", "age": 5, "city": "Oslo"})),
        fields(json!({"name": "Bo", "age": 20, "city": "Rome"})),
        fields(json!({"name": "Cy", "age": 41, "city": "Oslo"})),
    ]);

    let young = field("age").lt(10);
    let in_oslo = field("city").eq("Oslo");

    info!("\n--- First searches (cache misses) ---");
    info!("young: {}", names(&table.search(&young)?));
    info!("in Oslo: {}", names(&table.search(&in_oslo)?));

    info!("\n--- Writes patch the cached entries ---");
    let dee = table.insert(fields(json!({"name": "Dee", "age": 2, "city": "Rome"})));
    table.update(Update::set(json!({"city": "Oslo"})), &field("name").eq("Bo"))?;
    table.remove_ids(&[dee])?;

    info!("young: {}", names(&table.search(&young)?));
    info!("in Oslo: {}", names(&table.search(&in_oslo)?));

    info!("\n--- Ad hoc queries always scan ---");
    let long_names = Query::ad_hoc(|doc| {
        doc.get("name")
            .and_then(|v| v.as_str())
            .map_or(false, |n| n.len() > 2)
    });
    info!("long names: {}", names(&table.search(&long_names)?));

    info!("\n--- Cache statistics ---");
    info!("{}", table.cache_stats());

    Ok(())
}

fn names(docs: &[Document]) -> String {
    docs.iter()
        .filter_map(|d| d.get("name").and_then(|v| v.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}
