//! casync archive (catar) stream codec.
//!
//! An archive is an ordered stream of `{size, type}` records encoding a
//! directory tree depth-first. Parsing materializes the stream into a flat
//! node arena, assembling walks the arena back into the identical stream.
mod assemble;
mod parse;

pub use assemble::assemble;
pub use parse::parse;

use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatarError {
    /// Malformed, truncated or out-of-place record at the given offset.
    BadRecord { offset: u64 },
    /// Stream ended with open directories (missing GOODBYE).
    UnterminatedDirectory,
}

impl std::error::Error for CatarError {}

impl std::fmt::Display for CatarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRecord { offset } => write!(f, "bad archive record at offset {}", offset),
            Self::UnterminatedDirectory => write!(f, "archive ends inside a directory"),
        }
    }
}

/// Inode-like metadata carried by every archive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry {
    pub feature_flags: u64,
    pub mode: u64,
    pub flags: u64,
    pub uid: u64,
    pub gid: u64,
    /// Modification time in nanoseconds since the epoch.
    pub mtime: u64,
}

/// A record the parser does not interpret, preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub record_type: u64,
    pub data: Bytes,
}

/// Content of a single archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    /// Children as indices into the tree arena.
    Directory { children: Vec<usize> },
    File { payload: Bytes },
    Symlink { target: String },
    Device { major: u64, minor: u64 },
}

/// A single archive member stored in the tree arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Name under the parent directory, empty for the root.
    pub name: String,
    pub parent: Option<usize>,
    pub entry: Entry,
    /// Records between the entry and its content, passed through unmodified.
    pub opaque: Vec<RawRecord>,
    pub content: NodeContent,
}

/// Archive members in an arena, index 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a tree holding only a root member.
    pub fn with_root(entry: Entry, content: NodeContent) -> Self {
        Self {
            nodes: vec![Node {
                name: String::new(),
                parent: None,
                entry,
                opaque: Vec::new(),
                content,
            }],
        }
    }
    /// Add a member under the given directory. Returns the new member's index.
    ///
    /// Panics if `parent` is not a directory.
    pub fn add_child(
        &mut self,
        parent: usize,
        name: impl Into<String>,
        entry: Entry,
        content: NodeContent,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            name: name.into(),
            parent: Some(parent),
            entry,
            opaque: Vec::new(),
            content,
        });
        match &mut self.nodes[parent].content {
            NodeContent::Directory { children } => children.push(index),
            _ => panic!("parent node is not a directory"),
        }
        index
    }
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }
    /// Number of members including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{
        CA_FORMAT_ENTRY, CA_FORMAT_GOODBYE, CA_FORMAT_PAYLOAD, CA_FORMAT_XATTR,
    };
    use bytes::Bytes;

    fn entry(mode: u64) -> Entry {
        Entry {
            mode,
            uid: 1000,
            gid: 1000,
            mtime: 1_700_000_000_000_000_000,
            ..Entry::default()
        }
    }

    fn dir() -> NodeContent {
        NodeContent::Directory {
            children: Vec::new(),
        }
    }

    fn sample_tree() -> Tree {
        // Children added in byte-wise name order so that parse() rebuilds
        // the identical arena.
        let mut tree = Tree::with_root(entry(0o40755), dir());
        tree.add_child(
            0,
            "dat",
            entry(0o100644),
            NodeContent::File {
                payload: Bytes::from(vec![0x5a; 300]),
            },
        );
        let sub = tree.add_child(0, "sub", entry(0o40755), dir());
        tree.add_child(
            sub,
            "dev",
            entry(0o20644),
            NodeContent::Device { major: 1, minor: 3 },
        );
        tree.add_child(
            sub,
            "link",
            entry(0o120777),
            NodeContent::Symlink {
                target: "../dat".into(),
            },
        );
        tree
    }

    fn record(record_type: u64, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend((16 + payload.len() as u64).to_le_bytes());
        out.extend(record_type.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn entry_record(mode: u64) -> Vec<u8> {
        let mut payload = Vec::new();
        for field in [0, mode, 0, 1000, 1000, 1_700_000_000_000_000_000] {
            payload.extend(field.to_le_bytes());
        }
        record(CA_FORMAT_ENTRY, &payload)
    }

    #[test]
    fn assemble_parse_roundtrip() {
        let tree = sample_tree();
        let mut stream = Vec::new();
        assemble(&tree, &mut stream).unwrap();
        let parsed = parse(&stream).unwrap();
        assert_eq!(parsed, tree);
        let mut reassembled = Vec::new();
        assemble(&parsed, &mut reassembled).unwrap();
        assert_eq!(reassembled, stream);
    }

    #[test]
    fn assemble_is_deterministic_and_sorted() {
        let mut tree = Tree::with_root(entry(0o40755), dir());
        // Insertion order differs from name order.
        tree.add_child(0, "zz", entry(0o100644), NodeContent::File { payload: Bytes::new() });
        tree.add_child(0, "aa", entry(0o100644), NodeContent::File { payload: Bytes::new() });
        let mut first = Vec::new();
        assemble(&tree, &mut first).unwrap();
        let mut second = Vec::new();
        assemble(&tree, &mut second).unwrap();
        assert_eq!(first, second);
        let parsed = parse(&first).unwrap();
        assert_eq!(parsed.node(1).name, "aa");
        assert_eq!(parsed.node(2).name, "zz");
    }

    #[test]
    fn file_root_without_directory() {
        let tree = Tree::with_root(
            entry(0o100644),
            NodeContent::File {
                payload: Bytes::from_static(b"just a file"),
            },
        );
        let mut stream = Vec::new();
        assemble(&tree, &mut stream).unwrap();
        let parsed = parse(&stream).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn unknown_records_pass_through() {
        let mut stream = entry_record(0o100644);
        stream.extend(record(CA_FORMAT_XATTR, b"user.test\0value"));
        stream.extend(record(CA_FORMAT_PAYLOAD, b"payload"));
        let parsed = parse(&stream).unwrap();
        assert_eq!(
            parsed.root().opaque,
            vec![RawRecord {
                record_type: CA_FORMAT_XATTR,
                data: Bytes::from_static(b"user.test\0value"),
            }]
        );
        let mut reassembled = Vec::new();
        assemble(&parsed, &mut reassembled).unwrap();
        assert_eq!(reassembled, stream);
    }

    #[test]
    fn empty_directory_roundtrip() {
        let mut stream = entry_record(0o40755);
        stream.extend(record(CA_FORMAT_GOODBYE, &[]));
        let parsed = parse(&stream).unwrap();
        assert_eq!(
            parsed.root().content,
            NodeContent::Directory {
                children: Vec::new()
            }
        );
        let mut reassembled = Vec::new();
        assemble(&parsed, &mut reassembled).unwrap();
        assert_eq!(reassembled, stream);
    }

    #[test]
    fn rejects_stream_not_starting_with_entry() {
        let stream = record(CA_FORMAT_PAYLOAD, b"data");
        assert_eq!(parse(&stream), Err(CatarError::BadRecord { offset: 0 }));
    }

    #[test]
    fn rejects_truncated_record() {
        let mut stream = entry_record(0o100644);
        let cut = stream.len() - 8;
        stream.truncate(cut);
        assert!(matches!(
            parse(&stream),
            Err(CatarError::BadRecord { .. })
        ));
    }

    #[test]
    fn rejects_missing_goodbye() {
        let tree = sample_tree();
        let mut stream = Vec::new();
        assemble(&tree, &mut stream).unwrap();
        // Drop the root's closing GOODBYE record.
        stream.truncate(stream.len() - 16);
        assert_eq!(parse(&stream), Err(CatarError::UnterminatedDirectory));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let tree = sample_tree();
        let mut stream = Vec::new();
        assemble(&tree, &mut stream).unwrap();
        stream.extend(record(CA_FORMAT_GOODBYE, &[]));
        assert!(matches!(parse(&stream), Err(CatarError::BadRecord { .. })));
    }
}
