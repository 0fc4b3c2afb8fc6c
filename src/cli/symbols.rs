//! Symbols command implementation

use super::resolve_symbols;
use crate::config::Config;
use crate::feed::{DepthDecoder, FeedDecoder};
use crate::shard;
use clap::Args;

#[derive(Args, Debug)]
pub struct SymbolsArgs {
    /// Also print each shard's subscription topics
    #[arg(short, long)]
    pub topics: bool,
}

impl SymbolsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let symbols = resolve_symbols(config).await?;
        let shards = shard::partition(&symbols, config.shard.size);
        let decoder = DepthDecoder::new(config.feed.top_k, config.feed.depth_stream.clone());

        println!(
            "{} symbols in {} shards (size {})",
            symbols.len(),
            shards.len(),
            config.shard.size
        );
        for shard in &shards {
            let names: Vec<&str> = shard.symbols.iter().map(|s| s.as_str()).collect();
            println!("  shard {:>3} [{:>3}]: {}", shard.id, shard.len(), names.join(" "));
            if self.topics {
                for topic in decoder.topics(&shard.symbols) {
                    println!("      {topic}");
                }
            }
        }

        Ok(())
    }
}
