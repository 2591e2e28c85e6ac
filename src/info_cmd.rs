use anyhow::{Context, Result};
use log::*;
use std::path::Path;

use crate::string_utils::*;
use castr::Index;

pub fn print_index(index: &Index) {
    info!("Index:");
    info!("  Format: {}", index.format());
    info!("  Feature flags: {:#018x}", index.feature_flags());
    info!("  Chunk minimum size: {}", size_to_str(index.chunk_size_min()));
    info!("  Chunk average target size: {}", size_to_str(index.chunk_size_avg()));
    info!("  Chunk maximum size: {}", size_to_str(index.chunk_size_max()));
    info!("  Chunks in source: {}", index.len());
    if !index.is_empty() {
        info!(
            "  Average chunk size: {}",
            size_to_str(index.total_size() / index.len() as u64)
        );
    }
    info!("  Source size: {}", size_to_str(index.total_size()));
}

pub async fn info_cmd(input: &Path) -> Result<()> {
    let index_bytes = tokio::fs::read(input)
        .await
        .context(format!("Failed to read index file {}", input.display()))?;
    let index = Index::decode(&index_bytes)
        .context(format!("Failed to decode index file {}", input.display()))?;
    print_index(&index);
    Ok(())
}
