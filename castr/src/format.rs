//! On-disk format constants shared by the index and archive codecs.
//!
//! All integers are stored little-endian. Index files and archive streams
//! are built from records with a `{size: u64, type: u64}` header where
//! `size` covers the header itself.

/// Size of a `{size, type}` record header.
pub const RECORD_HEADER_SIZE: u64 = 16;

/// Index file header record type (`FormatIndex`).
pub const CA_FORMAT_INDEX: u64 = 0x9682_4d9c_7b12_9ff9;
/// Chunk table record type (`FormatTable`).
pub const CA_FORMAT_TABLE: u64 = 0xe75b_9e11_2f17_417d;
/// Marker closing a chunk table.
pub const CA_FORMAT_TABLE_TAIL_MARKER: u64 = 0x4b4f_050e_5549_ecd1;

/// Archive entry record (inode metadata).
pub const CA_FORMAT_ENTRY: u64 = 0x1396_fabc_ea5b_bb51;
/// Null-terminated member name.
pub const CA_FORMAT_FILENAME: u64 = 0x6dbb_6ebc_b316_1f0b;
/// Regular file contents.
pub const CA_FORMAT_PAYLOAD: u64 = 0x8b9e_1d93_d6dc_ffc9;
/// Symlink target path.
pub const CA_FORMAT_SYMLINK: u64 = 0x664a_6fb6_830e_0d6c;
/// Character or block device node.
pub const CA_FORMAT_DEVICE: u64 = 0xac3d_ace3_69df_e643;
/// End-of-directory sentinel.
pub const CA_FORMAT_GOODBYE: u64 = 0xdfd3_5c5e_8327_c403;
/// Extended attribute record, carried through opaque.
pub const CA_FORMAT_XATTR: u64 = 0xb815_7091_f80b_c486;
/// POSIX ACL user record, carried through opaque.
pub const CA_FORMAT_ACL_USER: u64 = 0x297d_c88b_2ef1_2faf;
/// POSIX ACL group record, carried through opaque.
pub const CA_FORMAT_ACL_GROUP: u64 = 0x36f2_acb5_6cb3_dd0b;

/// Index feature flag telling that chunk ids are SHA-512/256. Set for blob
/// indexes (.caibx), clear for archive indexes (.caidx).
pub const CA_FORMAT_SHA512_256: u64 = 0x2000_0000_0000_0000;

/// Magic prefix of a chunk file carrying the legacy wrapper header.
pub const CACNK_MAGIC: [u8; 3] = [0xca, 0xc4, 0x4e];

pub(crate) fn u64_from_le_slice(v: &[u8]) -> u64 {
    let mut tmp: [u8; 8] = Default::default();
    tmp.copy_from_slice(v);
    u64::from_le_bytes(tmp)
}

pub(crate) fn u32_from_le_slice(v: &[u8]) -> u32 {
    let mut tmp: [u8; 4] = Default::default();
    tmp.copy_from_slice(v);
    u32::from_le_bytes(tmp)
}
