//! `jobtrail mcp`: serve the stdio MCP interface.

use std::path::PathBuf;

use crate::error::JobError;
use crate::mcp::Server;

pub async fn run(config_path: &Option<PathBuf>) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    if !config.mcp.enabled {
        return Err(JobError::Config(
            "MCP is disabled in the config (set mcp.enabled = true)".into(),
        ));
    }

    let db = super::open_database(&config)?;
    let cancel = super::cancel_on_ctrl_c();

    let server = Server::new(db, config);
    server.run(&cancel).await
}
