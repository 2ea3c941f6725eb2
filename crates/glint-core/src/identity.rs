//! Block identities and URL fragments.
//!
//! A block's identity is, in strict priority order: the DOM id its source
//! element carried before normalization, the container's own DOM id, or a
//! content hash of its raw text. Hashes are SHA-256 digests reduced to a
//! 12-character base-62 string; when no secure digest is available a
//! deterministic XXH3 digest produces the same shape.

use crate::capabilities::{ContentDigest, FallbackDigest, pad_start};

/// Length of a content-hash identity.
pub const IDENTITY_LEN: usize = 12;

const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Base-62 expansion of a big-endian unsigned integer.
pub fn base62(bytes: &[u8]) -> String {
    let mut number: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
    if number.is_empty() {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while !number.is_empty() {
        let mut quotient = Vec::with_capacity(number.len());
        let mut remainder = 0u32;
        for &byte in &number {
            let acc = remainder * 256 + u32::from(byte);
            let q = acc / 62;
            remainder = acc % 62;
            if !quotient.is_empty() || q != 0 {
                quotient.push(q as u8);
            }
        }
        digits.push(BASE62[remainder as usize]);
        number = quotient;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Reduce a digest to a fixed-width identity: the most significant
/// [`IDENTITY_LEN`] base-62 digits, left-padded with `'0'`.
pub fn reduce_to_identity(bytes: &[u8]) -> String {
    let full = pad_start(&base62(bytes), IDENTITY_LEN, '0');
    full.chars().take(IDENTITY_LEN).collect()
}

/// Content-addressed identity of `text`.
pub async fn content_hash(text: &str, digest: &dyn ContentDigest) -> String {
    let bytes = match digest.digest(text.as_bytes()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "secure digest failed, using fallback hash");
            FallbackDigest::digest_sync(text.as_bytes())
        }
    };
    reduce_to_identity(&bytes)
}

/// Where a block's identity came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// DOM id of the source element before normalization.
    Original(String),
    /// DOM id found on the container.
    DomId(String),
    ContentHash(String),
}

impl IdentitySource {
    pub fn value(&self) -> &str {
        match self {
            IdentitySource::Original(v) | IdentitySource::DomId(v) | IdentitySource::ContentHash(v) => v,
        }
    }

    pub fn is_hash(&self) -> bool {
        matches!(self, IdentitySource::ContentHash(_))
    }

    /// Lower is stronger.
    fn rank(&self) -> u8 {
        match self {
            IdentitySource::Original(_) => 0,
            IdentitySource::DomId(_) => 1,
            IdentitySource::ContentHash(_) => 2,
        }
    }

    /// The strongest non-hash identity available, if any.
    pub fn preferred(original: Option<&str>, dom_id: Option<&str>) -> Option<Self> {
        let non_empty = |s: &&str| !s.trim().is_empty();
        original
            .filter(non_empty)
            .map(|s| IdentitySource::Original(s.to_string()))
            .or_else(|| {
                dom_id
                    .filter(non_empty)
                    .map(|s| IdentitySource::DomId(s.to_string()))
            })
    }
}

/// Proof that a hash computation was requested, used to discard stale
/// results that resolve out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTicket(u64);

/// Identity state of one block.
#[derive(Debug, Default)]
pub struct BlockIdentity {
    current: Option<IdentitySource>,
    requested: u64,
    applied: u64,
}

impl BlockIdentity {
    pub fn current(&self) -> Option<&IdentitySource> {
        self.current.as_ref()
    }

    pub fn value(&self) -> Option<&str> {
        self.current.as_ref().map(IdentitySource::value)
    }

    /// Whether the identity tracks content and must be recomputed on change.
    pub fn follows_content(&self) -> bool {
        self.current.as_ref().is_none_or(IdentitySource::is_hash)
    }

    /// Assign an identity unless a stronger one is already in place.
    ///
    /// Returns whether the value changed.
    pub fn assign(&mut self, source: IdentitySource) -> bool {
        if let Some(current) = &self.current {
            if current.rank() < source.rank() || *current == source {
                return false;
            }
        }
        self.current = Some(source);
        true
    }

    /// Start a content-hash computation. `None` when a stronger identity
    /// makes hashing pointless.
    pub fn begin_hash(&mut self) -> Option<HashTicket> {
        if !self.follows_content() {
            return None;
        }
        self.requested += 1;
        Some(HashTicket(self.requested))
    }

    /// Apply a finished hash unless a newer one has already landed.
    ///
    /// Returns whether the identity changed.
    pub fn complete_hash(&mut self, ticket: HashTicket, hash: String) -> bool {
        if ticket.0 <= self.applied || !self.follows_content() {
            tracing::trace!(ticket = ticket.0, applied = self.applied, "discarding stale identity");
            return false;
        }
        self.applied = ticket.0;
        self.assign(IdentitySource::ContentHash(hash))
    }
}

/// A parsed `#id` or `#id_line` fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentTarget {
    pub id: String,
    pub line: Option<i64>,
}

/// Fragment that deep-links to one line of a block.
pub fn line_fragment(identity: &str, line: i64) -> String {
    format!("{identity}_{line}")
}

/// Interpretations of a URL fragment, most literal first.
///
/// `foo_12` may be the block `foo_12` or line 12 of `foo`; callers try each
/// candidate in order.
pub fn parse_fragment(fragment: &str) -> Vec<FragmentTarget> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment).trim();
    if fragment.is_empty() {
        return Vec::new();
    }
    let mut candidates = vec![FragmentTarget {
        id: fragment.to_string(),
        line: None,
    }];
    if let Some((id, line)) = fragment.rsplit_once('_') {
        if let (false, Ok(line)) = (id.is_empty(), line.parse::<i64>()) {
            candidates.push(FragmentTarget {
                id: id.to_string(),
                line: Some(line),
            });
        }
    }
    candidates
}
