//! Deterministic query fingerprinting over nodes and side channels.
#![allow(clippy::cast_possible_truncation)]

use super::node::{PredicateNode, QuerySnapshot, SortMode};
use crate::value::Literal;
use sha2::{Digest, Sha256};
use std::fmt;

///
/// QueryFingerprint
///
/// Stable identity of a snapshot, used to key sync progress and
/// subscriptions. Equal snapshots always share a fingerprint.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct QueryFingerprint([u8; 32]);

impl QueryFingerprint {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn as_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl QuerySnapshot {
    #[must_use]
    pub fn fingerprint(&self) -> QueryFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(b"queryfp:v1");

        write_tag(&mut hasher, 0x01);
        write_u32(&mut hasher, self.nodes.len() as u32);
        for node in &self.nodes {
            hash_node(&mut hasher, node);
        }

        write_tag(&mut hasher, 0x02);
        write_opt_bytes(&mut hasher, self.prefix_key.as_deref());

        write_tag(&mut hasher, 0x03);
        write_opt_bytes(&mut hasher, self.suggest_index.as_deref().map(str::as_bytes));

        write_tag(&mut hasher, 0x04);
        write_u32(&mut hasher, self.keys.len() as u32);
        for key in &self.keys {
            write_bytes(&mut hasher, key);
        }

        write_tag(&mut hasher, 0x05);
        write_tag(
            &mut hasher,
            match self.sort_mode {
                SortMode::None => 0x00,
                SortMode::TimeAsc => 0x01,
                SortMode::TimeDesc => 0x02,
            },
        );

        write_tag(&mut hasher, 0x06);
        write_tag(&mut hasher, u8::from(self.is_valid));

        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        QueryFingerprint(out)
    }
}

fn hash_node(hasher: &mut Sha256, node: &PredicateNode) {
    write_tag(hasher, node.op.tag());
    write_str(hasher, &node.field);
    write_tag(hasher, node.kind.tag());
    write_u32(hasher, node.values.len() as u32);
    for value in &node.values {
        hash_literal(hasher, value);
    }
}

fn hash_literal(hasher: &mut Sha256, value: &Literal) {
    write_tag(hasher, value.kind().tag());
    match value {
        Literal::Null => {}
        Literal::Bool(b) => write_tag(hasher, u8::from(*b)),
        Literal::Int32(v) => hasher.update(v.to_be_bytes()),
        Literal::Int64(v) => hasher.update(v.to_be_bytes()),
        Literal::Double(v) => hasher.update(v.to_bits().to_be_bytes()),
        Literal::String(s) => write_str(hasher, s),
    }
}

fn write_opt_bytes(hasher: &mut Sha256, bytes: Option<&[u8]>) {
    match bytes {
        Some(bytes) => {
            write_tag(hasher, 0x01);
            write_bytes(hasher, bytes);
        }
        None => write_tag(hasher, 0x00),
    }
}

fn write_str(hasher: &mut Sha256, s: &str) {
    write_bytes(hasher, s.as_bytes());
}

fn write_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    write_u32(hasher, bytes.len() as u32);
    hasher.update(bytes);
}

fn write_u32(hasher: &mut Sha256, value: u32) {
    hasher.update(value.to_be_bytes());
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}
