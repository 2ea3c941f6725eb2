//! Capability shims.
//!
//! Browser primitives glint depends on (clipboard, file download, secure
//! digests, the page URL) are traits here so each can be feature-detected
//! once and replaced by a fallback. [`Capabilities`] is built once per page
//! and shared read-only afterwards.

use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, ready};
use xxhash_rust::xxh3::xxh3_128;

use crate::error::CapabilityError;

/// Asynchronous clipboard writes.
pub trait Clipboard {
    fn write_text(&self, text: &str) -> LocalBoxFuture<'static, Result<(), CapabilityError>>;
}

/// Saving text as a downloaded file.
pub trait FileSaver {
    fn save(&self, filename: &str, content: &str) -> Result<(), CapabilityError>;
}

/// Content digest used for block identities.
pub trait ContentDigest {
    /// Whether the digest is collision resistant.
    fn is_secure(&self) -> bool;
    fn digest(&self, data: &[u8]) -> LocalBoxFuture<'static, Result<Vec<u8>, CapabilityError>>;
}

/// The current page's address.
pub trait PageLocation {
    /// URL without its fragment.
    fn base_url(&self) -> String;
}

/// SHA-256 through `ring`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl ContentDigest for Sha256Digest {
    fn is_secure(&self) -> bool {
        true
    }

    fn digest(&self, data: &[u8]) -> LocalBoxFuture<'static, Result<Vec<u8>, CapabilityError>> {
        let digest = ring::digest::digest(&ring::digest::SHA256, data);
        ready(Ok(digest.as_ref().to_vec())).boxed_local()
    }
}

/// Deterministic non-cryptographic digest: 128-bit XXH3, 16 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackDigest;

impl FallbackDigest {
    pub fn digest_sync(data: &[u8]) -> Vec<u8> {
        xxh3_128(data).to_be_bytes().to_vec()
    }
}

impl ContentDigest for FallbackDigest {
    fn is_secure(&self) -> bool {
        false
    }

    fn digest(&self, data: &[u8]) -> LocalBoxFuture<'static, Result<Vec<u8>, CapabilityError>> {
        ready(Ok(Self::digest_sync(data))).boxed_local()
    }
}

/// Clipboard for environments without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClipboard;

impl Clipboard for NoClipboard {
    fn write_text(&self, _text: &str) -> LocalBoxFuture<'static, Result<(), CapabilityError>> {
        ready(Err(CapabilityError::Unavailable("clipboard"))).boxed_local()
    }
}

/// File saver for environments without downloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFileSaver;

impl FileSaver for NoFileSaver {
    fn save(&self, _filename: &str, _content: &str) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("file download"))
    }
}

/// Fixed page URL.
#[derive(Debug, Clone, Default)]
pub struct StaticLocation(pub String);

impl PageLocation for StaticLocation {
    fn base_url(&self) -> String {
        self.0.clone()
    }
}

/// Detected capabilities, shared by every block on the page.
#[derive(Clone)]
pub struct Capabilities {
    pub clipboard: Rc<dyn Clipboard>,
    pub files: Rc<dyn FileSaver>,
    pub digest: Rc<dyn ContentDigest>,
    pub location: Rc<dyn PageLocation>,
    /// Coarse-pointer device: floating buttons stay visible.
    pub touch: bool,
}

impl Capabilities {
    /// No clipboard, no downloads, SHA-256 identities, empty base URL.
    pub fn headless() -> Self {
        Self {
            clipboard: Rc::new(NoClipboard),
            files: Rc::new(NoFileSaver),
            digest: Rc::new(Sha256Digest),
            location: Rc::new(StaticLocation::default()),
            touch: false,
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("secure_digest", &self.digest.is_secure())
            .field("touch", &self.touch)
            .finish_non_exhaustive()
    }
}

/// Left-pad `s` with `fill` to at least `width` characters.
pub fn pad_start(s: &str, width: usize, fill: char) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat_n(fill, width - len));
    out.push_str(s);
    out
}
