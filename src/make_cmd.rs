use anyhow::{anyhow, Context, Result};
use log::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::info_cmd;
use crate::string_utils::*;
use castr::api::{self, EncodeOptions, EncodeResult};
use castr::catar::{Entry, NodeContent, Tree};
use castr::store::LocalStore;
use castr::{chunker, Compression};

#[derive(Debug, Clone)]
pub struct Options {
    pub input: PathBuf,
    pub output: PathBuf,
    pub store: PathBuf,
    pub chunker_config: chunker::Config,
    pub compression: Compression,
    pub num_chunk_buffers: usize,
    pub force_create: bool,
}

pub async fn make_cmd(opts: Options) -> Result<()> {
    let mut output_file = std::fs::OpenOptions::new()
        .write(true)
        .create(opts.force_create)
        .truncate(opts.force_create)
        .create_new(!opts.force_create)
        .open(&opts.output)
        .context(format!(
            "Failed to open output file {}",
            opts.output.display()
        ))?;
    let store = LocalStore::new(&opts.store);
    fs::create_dir_all(store.root()).context(format!(
        "Failed to create store directory {}",
        opts.store.display()
    ))?;

    let encode_opts = EncodeOptions {
        chunker_config: opts.chunker_config.clone(),
        compression: opts.compression,
        num_chunk_buffers: opts.num_chunk_buffers,
        ..EncodeOptions::default()
    };
    let input_meta = fs::symlink_metadata(&opts.input).context(format!(
        "Failed to read input {}",
        opts.input.display()
    ))?;
    let result = if input_meta.is_dir() {
        info!(
            "Archiving directory {} into {}...",
            opts.input.display(),
            opts.store.display()
        );
        let tree = build_tree(&opts.input)?;
        api::encode_archive(&tree, &store, &encode_opts).await
    } else {
        info!(
            "Chunking {} into {}...",
            opts.input.display(),
            opts.store.display()
        );
        let input_file = tokio::fs::File::open(&opts.input).await.context(format!(
            "Failed to open input file {}",
            opts.input.display()
        ))?;
        api::encode_blob(input_file, &store, &encode_opts).await
    }
    .context("Failed to encode input")?;

    let index_bytes = result.index.encode();
    output_file.write_all(&index_bytes).context(format!(
        "Failed to write index to {}",
        opts.output.display()
    ))?;

    print_summary(&result);
    info_cmd::print_index(&result.index);
    Ok(())
}

fn print_summary(result: &EncodeResult) {
    info!("Source size: {}", size_to_str(result.source_size));
    info!(
        "Unique chunks in source: {} (of {})",
        result.unique_chunks,
        result.index.len()
    );
    info!(
        "New chunks written to store: {} ({} after compression)",
        result.stored_chunks,
        size_to_str(result.stored_bytes)
    );
}

fn build_tree(root: &Path) -> Result<Tree> {
    let meta = fs::symlink_metadata(root)?;
    if !meta.is_dir() {
        return Err(anyhow!("{} is not a directory", root.display()));
    }
    let mut tree = Tree::with_root(
        entry_from_meta(&meta),
        NodeContent::Directory {
            children: Vec::new(),
        },
    );
    add_dir_children(&mut tree, 0, root)?;
    Ok(tree)
}

fn add_dir_children(tree: &mut Tree, dir_index: usize, dir_path: &Path) -> Result<()> {
    for dir_entry in fs::read_dir(dir_path)
        .context(format!("Failed to read directory {}", dir_path.display()))?
    {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let name = dir_entry
            .file_name()
            .into_string()
            .map_err(|name| anyhow!("non unicode file name {:?} in {}", name, dir_path.display()))?;
        let meta = fs::symlink_metadata(&path)?;
        let entry = entry_from_meta(&meta);
        if meta.is_dir() {
            let child = tree.add_child(
                dir_index,
                name,
                entry,
                NodeContent::Directory {
                    children: Vec::new(),
                },
            );
            add_dir_children(tree, child, &path)?;
        } else if meta.file_type().is_symlink() {
            let target = fs::read_link(&path)?;
            let target = target
                .into_os_string()
                .into_string()
                .map_err(|target| anyhow!("non unicode symlink target {:?}", target))?;
            tree.add_child(dir_index, name, entry, NodeContent::Symlink { target });
        } else if meta.is_file() {
            let payload = fs::read(&path)
                .context(format!("Failed to read file {}", path.display()))?;
            tree.add_child(
                dir_index,
                name,
                entry,
                NodeContent::File {
                    payload: payload.into(),
                },
            );
        } else {
            warn!("Skipping {} (unsupported file type)", path.display());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn entry_from_meta(meta: &fs::Metadata) -> Entry {
    use std::os::unix::fs::MetadataExt;
    Entry {
        feature_flags: 0,
        mode: meta.mode() as u64,
        flags: 0,
        uid: meta.uid() as u64,
        gid: meta.gid() as u64,
        mtime: meta.mtime().max(0) as u64 * 1_000_000_000 + meta.mtime_nsec().max(0) as u64,
    }
}

#[cfg(not(unix))]
fn entry_from_meta(meta: &fs::Metadata) -> Entry {
    Entry {
        feature_flags: 0,
        mode: if meta.is_dir() { 0o40755 } else { 0o100644 },
        flags: 0,
        uid: 0,
        gid: 0,
        mtime: 0,
    }
}
