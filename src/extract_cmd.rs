use anyhow::{anyhow, Context, Result};
use log::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::info_cmd;
use crate::string_utils::*;
use castr::assemble;
use castr::catar::{self, NodeContent, Tree};
use castr::store::{ChainStore, ChunkStore, LocalStore};
use castr::{Index, IndexFormat};

#[derive(Debug, Clone)]
pub struct Options {
    pub index: PathBuf,
    pub output: PathBuf,
    pub store: PathBuf,
    pub seed_stores: Vec<PathBuf>,
    pub verify_output: bool,
    pub force_create: bool,
    pub num_chunk_buffers: usize,
}

pub async fn extract_cmd(opts: Options) -> Result<()> {
    let index_bytes = tokio::fs::read(&opts.index).await.context(format!(
        "Failed to read index file {}",
        opts.index.display()
    ))?;
    let index = Index::decode(&index_bytes).context(format!(
        "Failed to decode index file {}",
        opts.index.display()
    ))?;
    info_cmd::print_index(&index);

    let store = build_store(&opts);
    let assemble_opts = assemble::Options::default()
        .max_buffered_chunks(opts.num_chunk_buffers)
        .verify_output(opts.verify_output);

    info!(
        "Extracting {} to {}...",
        opts.index.display(),
        opts.output.display()
    );
    let stats = match index.format() {
        IndexFormat::Blob => {
            if !opts.force_create && opts.output.exists() {
                return Err(anyhow!("Output file {} exists", opts.output.display()));
            }
            assemble::to_file(&index, &store, &opts.output, &assemble_opts)
                .await
                .context("Failed to assemble output")?
        }
        IndexFormat::Archive => {
            // Rebuild the catar stream in memory, then unpack it as a tree.
            let mut archive = Cursor::new(Vec::with_capacity(index.total_size() as usize));
            let stats = assemble::to_writer(&index, &store, &mut archive, &assemble_opts)
                .await
                .context("Failed to assemble archive stream")?;
            let tree = catar::parse(archive.get_ref())
                .context("Failed to parse assembled archive stream")?;
            extract_tree(&tree, &opts.output, opts.force_create)?;
            stats
        }
    };

    if !stats.verification_passed {
        return Err(anyhow!("Verification of output failed"));
    }
    info!(
        "Extracted {} from {} chunks",
        size_to_str(stats.bytes_written),
        stats.chunks_processed
    );
    Ok(())
}

fn build_store(opts: &Options) -> ChainStore {
    let mut stores: Vec<Box<dyn ChunkStore>> = Vec::new();
    for seed in &opts.seed_stores {
        stores.push(Box::new(LocalStore::new(seed)));
    }
    stores.push(Box::new(LocalStore::new(&opts.store)));
    ChainStore::new(stores)
}

fn extract_tree(tree: &Tree, root: &Path, force_create: bool) -> Result<()> {
    if !force_create && root.exists() {
        return Err(anyhow!("Output directory {} exists", root.display()));
    }
    extract_node(tree, 0, root)
}

fn extract_node(tree: &Tree, index: usize, path: &Path) -> Result<()> {
    let node = tree.node(index);
    match &node.content {
        NodeContent::Directory { children } => {
            std::fs::create_dir_all(path)
                .context(format!("Failed to create directory {}", path.display()))?;
            for &child in children {
                extract_node(tree, child, &path.join(&tree.node(child).name))?;
            }
            set_permissions(path, node.entry.mode)?;
        }
        NodeContent::File { payload } => {
            std::fs::write(path, payload)
                .context(format!("Failed to write file {}", path.display()))?;
            set_permissions(path, node.entry.mode)?;
        }
        NodeContent::Symlink { target } => {
            make_symlink(target, path)?;
        }
        NodeContent::Device { major, minor } => {
            warn!(
                "Skipping device node {} ({}:{})",
                path.display(),
                major,
                minor
            );
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u64) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode as u32 & 0o7777))
        .context(format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u64) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &str, path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, path)
        .context(format!("Failed to create symlink {}", path.display()))
}

#[cfg(not(unix))]
fn make_symlink(_target: &str, path: &Path) -> Result<()> {
    warn!("Skipping symlink {} (unsupported platform)", path.display());
    Ok(())
}
