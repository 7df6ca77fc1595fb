//! Cache command - inspect and maintain the review cache

use clap::{Args, Subcommand};

use corvid_core::cache::CacheStore;
use corvid_core::ReviewConfig;

/// Arguments for the cache command
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Remove entries past their TTL
    Evict,
    /// Remove all entries
    Clear,
}

impl CacheArgs {
    /// Execute the cache command
    pub fn execute(&self, config: &ReviewConfig) -> anyhow::Result<()> {
        let store = CacheStore::open(&config.cache.location, config.cache.ttl)?;

        match self.command {
            CacheCommand::Evict => {
                let removed = store.evict_expired()?;
                println!("Evicted {} expired cache entries", removed);
            }
            CacheCommand::Clear => {
                let removed = store.clear()?;
                println!("Cleared {} cache entries", removed);
            }
        }

        Ok(())
    }
}
