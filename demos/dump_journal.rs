// Dump the newest journaled records as JSON (decodes the wincode BLOBs).
//
// Usage: cargo run --example dump_journal -- [DB_PATH] [LIMIT]
//   DB_PATH  default: ./data/journal.db
//   LIMIT    default: 5

use statwatch::journal::Journal;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let path = args.get(1).map(String::as_str).unwrap_or("./data/journal.db");
    let limit: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);

    let journal = Journal::connect(path).await?;
    let records = journal.recent(limit).await?;
    eprintln!("{} of {} rows", records.len(), journal.count().await?);

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
