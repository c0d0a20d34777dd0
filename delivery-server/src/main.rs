use delivery_server::{Config, Server, ServerState, catalog, init_logger_with_file};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    // 2. Logging (guard flushes the file writer on exit)
    let _log_guard = init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        Some(&config.log_dir()),
    );
    tracing::info!(
        environment = %config.environment,
        work_dir = %config.work_dir,
        "Delivery server starting..."
    );

    // 3. State
    let state = ServerState::initialize(&config)?;

    // 4. Optional catalog seed
    if let Some(path) = &config.catalog_file {
        let summary = catalog::import_file(&state.storage, path)?;
        tracing::info!(path = %path, ?summary, "Catalog imported");
    }

    // 5. Serve
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
