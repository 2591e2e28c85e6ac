use std::io::Write;

use crate::format::{
    CA_FORMAT_DEVICE, CA_FORMAT_ENTRY, CA_FORMAT_FILENAME, CA_FORMAT_GOODBYE, CA_FORMAT_PAYLOAD,
    CA_FORMAT_SYMLINK, RECORD_HEADER_SIZE,
};

use super::{NodeContent, Tree};

/// Write a tree as a catar record stream.
///
/// The output is deterministic, each directory's children are emitted in
/// byte-wise name order and closed with a single GOODBYE record.
pub fn assemble<W: Write>(tree: &Tree, writer: &mut W) -> std::io::Result<()> {
    emit_node(tree, 0, writer)
}

fn write_header<W: Write>(writer: &mut W, size: u64, record_type: u64) -> std::io::Result<()> {
    writer.write_all(&size.to_le_bytes())?;
    writer.write_all(&record_type.to_le_bytes())
}

fn emit_node<W: Write>(tree: &Tree, index: usize, writer: &mut W) -> std::io::Result<()> {
    let node = tree.node(index);
    write_header(writer, RECORD_HEADER_SIZE + 48, CA_FORMAT_ENTRY)?;
    for field in [
        node.entry.feature_flags,
        node.entry.mode,
        node.entry.flags,
        node.entry.uid,
        node.entry.gid,
        node.entry.mtime,
    ] {
        writer.write_all(&field.to_le_bytes())?;
    }
    for raw in &node.opaque {
        write_header(
            writer,
            RECORD_HEADER_SIZE + raw.data.len() as u64,
            raw.record_type,
        )?;
        writer.write_all(&raw.data)?;
    }
    match &node.content {
        NodeContent::File { payload } => {
            write_header(
                writer,
                RECORD_HEADER_SIZE + payload.len() as u64,
                CA_FORMAT_PAYLOAD,
            )?;
            writer.write_all(payload)?;
        }
        NodeContent::Symlink { target } => {
            write_header(
                writer,
                RECORD_HEADER_SIZE + target.len() as u64 + 1,
                CA_FORMAT_SYMLINK,
            )?;
            writer.write_all(target.as_bytes())?;
            writer.write_all(&[0])?;
        }
        NodeContent::Device { major, minor } => {
            write_header(writer, RECORD_HEADER_SIZE + 16, CA_FORMAT_DEVICE)?;
            writer.write_all(&major.to_le_bytes())?;
            writer.write_all(&minor.to_le_bytes())?;
        }
        NodeContent::Directory { children } => {
            let mut order = children.clone();
            order.sort_by(|&a, &b| tree.node(a).name.as_bytes().cmp(tree.node(b).name.as_bytes()));
            for &child in &order {
                let name = &tree.node(child).name;
                write_header(
                    writer,
                    RECORD_HEADER_SIZE + name.len() as u64 + 1,
                    CA_FORMAT_FILENAME,
                )?;
                writer.write_all(name.as_bytes())?;
                writer.write_all(&[0])?;
                emit_node(tree, child, writer)?;
            }
            write_header(writer, RECORD_HEADER_SIZE, CA_FORMAT_GOODBYE)?;
        }
    }
    Ok(())
}
