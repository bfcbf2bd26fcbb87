//! Summary providers.
//!
//! A provider turns one change unit plus its evidence into one bullet
//! line. Remote backends speak the OpenAI-compatible chat completions
//! API; the heuristic backend derives the bullet from unit metadata and
//! never fails.

pub mod heuristic;
pub mod remote;
pub mod retry;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::unit::{ChangeUnit, EvidenceSet};

pub use heuristic::HeuristicProvider;
pub use remote::RemoteProvider;
pub use retry::call_with_retry;

/// Everything a provider may look at for one unit.
pub struct UnitContext<'a> {
    pub unit: &'a ChangeUnit,
    pub evidence: &'a EvidenceSet,
    /// Rendered user prompt for remote backends.
    pub prompt: String,
}

/// One bullet line per unit. Implementations must be safe to share
/// across the concurrent map phase.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn id(&self) -> &'static str;
    fn model(&self) -> &str;
    async fn summarize(&self, ctx: &UnitContext<'_>) -> Result<String, ProviderError>;
}

/// Pick the provider for a run.
///
/// A forced name must resolve or the run fails; otherwise the first
/// entry of the configured preference order with credentials wins, and
/// no credentials anywhere means heuristic summaries.
pub fn select_provider(
    config: &ProvidersConfig,
    forced: Option<&str>,
) -> Result<Box<dyn Summarizer>, ProviderError> {
    match forced {
        Some("heuristic") => return Ok(Box::new(HeuristicProvider)),
        Some("openai") => return Ok(Box::new(RemoteProvider::openai(&config.openai)?)),
        Some("cerebras") => return Ok(Box::new(RemoteProvider::cerebras(&config.cerebras)?)),
        Some(other) => {
            // The CLI restricts the value; config preference lists are
            // free-form, so tolerate and fall through.
            warn!("Unknown provider '{other}' requested, selecting automatically");
        }
        None => {}
    }

    for name in &config.prefer {
        let attempt = match name.as_str() {
            "openai" => RemoteProvider::openai(&config.openai),
            "cerebras" => RemoteProvider::cerebras(&config.cerebras),
            "heuristic" => return Ok(Box::new(HeuristicProvider)),
            other => {
                warn!("Ignoring unknown provider '{other}' in preference list");
                continue;
            }
        };
        match attempt {
            Ok(provider) => return Ok(Box::new(provider)),
            Err(ProviderError::MissingCredentials { provider, .. }) => {
                info!("No credentials for {provider}, trying next provider");
            }
            Err(e) => return Err(e),
        }
    }

    info!("No provider credentials found, using heuristic summaries");
    Ok(Box::new(HeuristicProvider))
}
