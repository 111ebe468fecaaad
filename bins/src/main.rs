use std::env;

use dotenv::dotenv;
use eyre::Context;
use log::info;
use mongodb::bson::oid::ObjectId;

/// Bootstrap for the points engine: connects the storage, builds the
/// ledger and runs the requested maintenance command. The UI embeds
/// the `ledger` crate directly; this binary exists for operations.
#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Err(err) = dotenv() {
        info!("Failed to load .env file: {}", err);
    }
    pretty_env_logger::init();
    color_eyre::install()?;

    info!("connecting to mongo");
    let mongo_url = env::var("MONGO_URL").context("Failed to get MONGO_URL from env")?;
    let storage = storage::Storage::new(&mongo_url)
        .await
        .context("Failed to create storage")?;
    info!("creating ledger");
    let ledger = ledger::Ledger::new(storage);

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("backup") => {
            let path = args.get(2).map(String::as_str).unwrap_or("points-backup.zip");
            let mut session = ledger.db.start_session(ObjectId::new()).await?;
            let dump = ledger.backup.make_backup(&mut session).await?;
            std::fs::write(path, dump).context("Failed to write backup file")?;
            info!("backup written to {}", path);
        }
        Some("restore") => {
            let path = args
                .get(2)
                .map(String::as_str)
                .ok_or_else(|| eyre::eyre!("Usage: points-cli restore <file>"))?;
            let dump = std::fs::read(path).context("Failed to read backup file")?;
            let mut session = ledger.db.start_session(ObjectId::new()).await?;
            ledger.backup.apply_backup(&mut session, dump).await?;
            info!("backup restored from {}", path);
        }
        _ => {
            info!("points engine is reachable; commands: backup [file], restore <file>");
        }
    }

    Ok(())
}
