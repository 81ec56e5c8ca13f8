use anyhow::{Context, Result};

use apigee_client::config::{Command, Config};
use apigee_client::management::ManagementClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level; stdout is reserved for results
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(config = ?config, "Configuration loaded");
    tracing::info!(
        organization = %config.organization,
        base_url = %config.base_url,
        "Apigee client starting"
    );

    let management = ManagementClient::from_config(&config)?;

    match command {
        Command::List {
            resource,
            envelope,
            cursor_field,
        } => {
            let items = match envelope {
                Some(envelope) => management
                    .list_entities(&resource, &envelope, &cursor_field)
                    .await
                    .with_context(|| format!("Failed to list {}", resource))?,
                None => management
                    .list_names(&resource)
                    .await
                    .with_context(|| format!("Failed to list {}", resource))?
                    .into_iter()
                    .map(serde_json::Value::String)
                    .collect(),
            };

            tracing::info!(resource = %resource, count = items.len(), "Listing complete");
            print_json(&serde_json::Value::Array(items))?;
        }

        Command::Get { resource, name } => {
            let entity = management
                .get_entity(&resource, &name)
                .await
                .with_context(|| format!("Failed to get {}/{}", resource, name))?;
            print_json(&entity)?;
        }

        Command::Import {
            resource,
            name,
            archive,
        } => {
            let imported = management
                .import_archive(&resource, &name, &archive)
                .await
                .with_context(|| format!("Failed to import {} into {}", archive.display(), resource))?;
            print_json(&imported)?;
        }

        Command::Token => {
            let credential = management
                .client()
                .tokens()
                .authorize(false)
                .await
                .context("Failed to obtain an access token")?;

            print_json(&serde_json::json!({
                "token_type": credential.token_type,
                "expires_in": credential.expires_in,
                "acquired_at": credential.acquired_at.to_rfc3339(),
                "scope": credential.scope,
            }))?;
        }
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to render JSON output")?;
    println!("{}", text);
    Ok(())
}
