use nursery_catalog::infra::{Config, StaticTokenVerifier};
use nursery_catalog::storage::document;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight\n\
         \n\
         Reads env vars (or .env):\n\
           DATABASE_URL        PostgreSQL URL; unset means the in-memory store\n\
           BIND_ADDR           default 0.0.0.0:3000\n\
           DB_MAX_CONNECTIONS  default 5\n\
           LIST_LIMIT          default 50\n\
           API_TOKENS          token:user_id:role,...\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    let config = Config::from_env()?;
    let verifier = StaticTokenVerifier::from_entries(&config.api_tokens)?;

    println!("> Preflight:");
    println!(
        "  DATABASE_URL={}",
        if config.database_url.is_some() { "<set>" } else { "<unset, in-memory store>" }
    );
    println!("  BIND_ADDR={}", config.bind_addr);
    println!("  DB_MAX_CONNECTIONS={}", config.max_connections);
    println!("  LIST_LIMIT={}", config.list_limit);
    println!("  API tokens: {}", verifier.len());
    if verifier.is_empty() {
        eprintln!("  Warning: no API tokens configured; write endpoints will reject every request.");
    }

    let store = document::connect(
        config.database_url.as_deref(),
        config.max_connections,
        &nursery_catalog::collections(),
    )
    .await?;
    store
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Store ping failed: {}", e))?;
    println!("  Store reachable, collections ready: {}", nursery_catalog::collections().join(", "));
    store.close().await;

    println!("> Preflight OK.");
    Ok(())
}
