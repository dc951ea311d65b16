mod bars;
mod check;
mod order;
mod quote;
mod stream;
mod watch;

use std::sync::Arc;
use std::time::Instant;

use marketdesk_core::{Config, MarketDataProvider, ProviderError, ProviderId};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{Envelope, EnvelopeError};

/// Upper bound on up-front buffer reservations sized from user input.
const MAX_PREALLOCATED: usize = 1024;

fn collection_buffer<T>(wanted: usize) -> Vec<T> {
    Vec::with_capacity(wanted.min(MAX_PREALLOCATED))
}

pub struct CommandResult {
    pub provider: ProviderId,
    pub data: Value,
    pub errors: Vec<EnvelopeError>,
}

impl CommandResult {
    pub fn ok(provider: ProviderId, data: Value) -> Self {
        Self {
            provider,
            data,
            errors: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: EnvelopeError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_provider_error(self, error: &ProviderError) -> Self {
        self.with_error(EnvelopeError::from(error))
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    let config = load_config(cli)?;
    let provider: Arc<dyn MarketDataProvider> = config.build_provider()?;
    let started = Instant::now();

    let result = match &cli.command {
        Command::Check => check::run(&config, provider.as_ref()).await?,
        Command::Quote(args) => quote::run(args, provider.as_ref()).await?,
        Command::Bars(args) => bars::run(args, provider.as_ref()).await?,
        Command::Watch(args) => watch::run(args, &config, provider).await?,
        Command::Stream(args) => stream::run(args, &config).await?,
        Command::Order(args) => order::run(args, &config, provider).await?,
    };

    let CommandResult {
        provider,
        data,
        errors,
    } = result;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(Envelope::new(provider, latency_ms, data, errors))
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::from_env()?;
    if let Some(selector) = cli.provider {
        config = config.with_provider(selector.into())?;
    }
    if let Some(token) = &cli.token {
        config = config.with_api_token(token.clone());
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_counts_do_not_reserve_huge_buffers() {
        let buffer: Vec<u64> = collection_buffer(usize::MAX);
        assert!(buffer.capacity() >= MAX_PREALLOCATED);
        assert!(buffer.capacity() < 2 * MAX_PREALLOCATED);

        let small: Vec<u64> = collection_buffer(3);
        assert!(small.capacity() >= 3 && small.capacity() < MAX_PREALLOCATED);
    }
}
