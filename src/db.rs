use anyhow::Context;
use mongodb::{bson::doc, options::ClientOptions, Client, Database};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::AppConfig;

static CLIENT: OnceCell<Client> = OnceCell::const_new();

/// Process-wide Mongo client. The first successful connection is memoized;
/// a failed attempt leaves the cell empty so the next call retries.
pub async fn client(uri: &str) -> anyhow::Result<&'static Client> {
    CLIENT
        .get_or_try_init(|| async {
            let mut opts = ClientOptions::parse(uri)
                .await
                .context("parse MONGODB_URI")?;
            if opts.app_name.is_none() {
                opts.app_name = Some("fitness-auth".to_string());
            }
            let client = Client::with_options(opts).context("build mongo client")?;
            client
                .database("admin")
                .run_command(doc! { "ping": 1 }, None)
                .await
                .context("ping mongodb")?;
            info!("MongoDB connected");
            Ok(client)
        })
        .await
}

/// Database named by `MONGODB_DB`, else the one in the URI, else `fitness`.
pub async fn database(config: &AppConfig) -> anyhow::Result<Database> {
    let client = client(&config.mongodb_uri).await?;
    let name = config
        .mongodb_db
        .clone()
        .or_else(|| client.default_database().map(|d| d.name().to_string()))
        .unwrap_or_else(|| "fitness".to_string());
    Ok(client.database(&name))
}
