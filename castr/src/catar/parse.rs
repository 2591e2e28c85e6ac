use bytes::Bytes;

use crate::format::{
    u64_from_le_slice, CA_FORMAT_DEVICE, CA_FORMAT_ENTRY, CA_FORMAT_FILENAME, CA_FORMAT_GOODBYE,
    CA_FORMAT_PAYLOAD, CA_FORMAT_SYMLINK, RECORD_HEADER_SIZE,
};

use super::{CatarError, Entry, Node, NodeContent, RawRecord, Tree};

const ENTRY_PAYLOAD_SIZE: usize = 48;

struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

struct Record<'a> {
    record_type: u64,
    payload: &'a [u8],
    offset: u64,
}

impl<'a> RecordReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn next(&mut self) -> Result<Option<Record<'a>>, CatarError> {
        if self.pos == self.buf.len() {
            return Ok(None);
        }
        let offset = self.pos as u64;
        let remaining = &self.buf[self.pos..];
        if remaining.len() < RECORD_HEADER_SIZE as usize {
            return Err(CatarError::BadRecord { offset });
        }
        let size = u64_from_le_slice(&remaining[0..8]);
        let record_type = u64_from_le_slice(&remaining[8..16]);
        if size < RECORD_HEADER_SIZE || size > remaining.len() as u64 {
            return Err(CatarError::BadRecord { offset });
        }
        let payload = &remaining[RECORD_HEADER_SIZE as usize..size as usize];
        self.pos += size as usize;
        Ok(Some(Record {
            record_type,
            payload,
            offset,
        }))
    }
}

fn parse_entry(record: &Record) -> Result<Entry, CatarError> {
    if record.payload.len() != ENTRY_PAYLOAD_SIZE {
        return Err(CatarError::BadRecord {
            offset: record.offset,
        });
    }
    let field = |index: usize| u64_from_le_slice(&record.payload[index * 8..index * 8 + 8]);
    Ok(Entry {
        feature_flags: field(0),
        mode: field(1),
        flags: field(2),
        uid: field(3),
        gid: field(4),
        mtime: field(5),
    })
}

fn parse_c_string(record: &Record) -> Result<String, CatarError> {
    let bad = CatarError::BadRecord {
        offset: record.offset,
    };
    match record.payload.split_last() {
        Some((&0, name)) if !name.contains(&0) => {
            String::from_utf8(name.to_vec()).map_err(|_| bad)
        }
        _ => Err(bad),
    }
}

fn parse_filename(record: &Record) -> Result<String, CatarError> {
    let name = parse_c_string(record)?;
    // Member names are single path components.
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(CatarError::BadRecord {
            offset: record.offset,
        });
    }
    Ok(name)
}

// What the state machine expects next.
enum State {
    // The root ENTRY record.
    RootEntry,
    // Content records for the node, or FILENAME/GOODBYE turning it into
    // a directory.
    NodeContent { node: usize },
    // A child ENTRY below the named directory member.
    ChildEntry { name: String },
    // The next FILENAME or the closing GOODBYE of the innermost directory.
    ChildName,
    // Nothing, the root has been closed.
    Done,
}

/// Parse a catar record stream into a tree.
pub fn parse(buf: &[u8]) -> Result<Tree, CatarError> {
    let mut reader = RecordReader::new(buf);
    let mut nodes: Vec<Node> = Vec::new();
    // Directories whose GOODBYE is still outstanding.
    let mut dir_stack: Vec<usize> = Vec::new();
    let mut state = State::RootEntry;

    while let Some(record) = reader.next()? {
        let bad = CatarError::BadRecord {
            offset: record.offset,
        };
        state = match state {
            State::RootEntry => {
                if record.record_type != CA_FORMAT_ENTRY {
                    return Err(bad);
                }
                nodes.push(Node {
                    name: String::new(),
                    parent: None,
                    entry: parse_entry(&record)?,
                    opaque: Vec::new(),
                    content: NodeContent::Directory {
                        children: Vec::new(),
                    },
                });
                State::NodeContent { node: 0 }
            }
            State::NodeContent { node } => match record.record_type {
                CA_FORMAT_PAYLOAD => {
                    nodes[node].content = NodeContent::File {
                        payload: Bytes::copy_from_slice(record.payload),
                    };
                    leaf_done(&dir_stack)
                }
                CA_FORMAT_SYMLINK => {
                    nodes[node].content = NodeContent::Symlink {
                        target: parse_c_string(&record)?,
                    };
                    leaf_done(&dir_stack)
                }
                CA_FORMAT_DEVICE => {
                    if record.payload.len() != 16 {
                        return Err(bad);
                    }
                    nodes[node].content = NodeContent::Device {
                        major: u64_from_le_slice(&record.payload[0..8]),
                        minor: u64_from_le_slice(&record.payload[8..16]),
                    };
                    leaf_done(&dir_stack)
                }
                CA_FORMAT_FILENAME => {
                    // The node turns out to be a directory with children.
                    dir_stack.push(node);
                    State::ChildEntry {
                        name: parse_filename(&record)?,
                    }
                }
                CA_FORMAT_GOODBYE => {
                    // An empty directory. The goodbye payload (a lookup
                    // table in some implementations) is derivable and
                    // dropped here.
                    leaf_done(&dir_stack)
                }
                CA_FORMAT_ENTRY => return Err(bad),
                record_type => {
                    // Unknown records between entry and content are kept
                    // for a bit-exact re-encode.
                    nodes[node].opaque.push(RawRecord {
                        record_type,
                        data: Bytes::copy_from_slice(record.payload),
                    });
                    State::NodeContent { node }
                }
            },
            State::ChildEntry { name } => {
                if record.record_type != CA_FORMAT_ENTRY {
                    return Err(bad);
                }
                let parent = *dir_stack.last().expect("open directory");
                let index = nodes.len();
                nodes.push(Node {
                    name,
                    parent: Some(parent),
                    entry: parse_entry(&record)?,
                    opaque: Vec::new(),
                    content: NodeContent::Directory {
                        children: Vec::new(),
                    },
                });
                match &mut nodes[parent].content {
                    NodeContent::Directory { children } => children.push(index),
                    _ => unreachable!("directory stack holds directories only"),
                }
                State::NodeContent { node: index }
            }
            State::ChildName => match record.record_type {
                CA_FORMAT_FILENAME => State::ChildEntry {
                    name: parse_filename(&record)?,
                },
                CA_FORMAT_GOODBYE => {
                    dir_stack.pop();
                    leaf_done(&dir_stack)
                }
                _ => return Err(bad),
            },
            State::Done => return Err(bad),
        };
    }
    match state {
        State::Done => Ok(Tree { nodes }),
        State::RootEntry | State::NodeContent { .. } | State::ChildEntry { .. }
            if !dir_stack.is_empty() =>
        {
            Err(CatarError::UnterminatedDirectory)
        }
        State::ChildName => Err(CatarError::UnterminatedDirectory),
        _ => Err(CatarError::BadRecord {
            offset: buf.len() as u64,
        }),
    }
}

fn leaf_done(dir_stack: &[usize]) -> State {
    if dir_stack.is_empty() {
        State::Done
    } else {
        State::ChildName
    }
}
