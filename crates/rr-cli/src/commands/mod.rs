//! Subcommand implementations.

pub mod cautions;
pub mod inspect;
pub mod replay;
pub mod snapshot;

use std::path::Path;

use anyhow::{Context, Result};

use rr_core::ReplaySession;

use crate::config::Config;
use crate::input;

/// Loads a log and builds a session, attaching the classifier when one is
/// configured.
pub fn build_session(file: &Path, config: &Config) -> Result<ReplaySession> {
    let rows = input::read_rows(file)?;
    let session =
        rr_core::load(rows, &config.engine_config()).context("failed to ingest telemetry log")?;

    match &config.classifier_url {
        Some(url) => {
            let client = rr_predict::Client::new(url.clone())
                .context("failed to build classifier client")?;
            let circuit = config.circuit_id().context("invalid circuit name")?;
            Ok(session.with_classifier(Box::new(client), circuit, config.circuit_code()))
        }
        None => Ok(session),
    }
}
