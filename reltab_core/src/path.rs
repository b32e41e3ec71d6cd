// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pivot-tree node paths.
//!
//! A path is the sequence of pivot values leading from the root to a node. Its encoded form is a
//! string with one `#`-prefixed, percent-encoded segment per component: `["Safety", "A/B"]`
//! encodes as `#Safety#A%2FB`, and the root (empty path) encodes as the empty string.
//!
//! A component may also be null, for the group of rows whose pivot value is null. A null
//! component encodes as the bare segment [`NULL_SEGMENT`], which percent-encoding never
//! produces (an escaped `%` is always followed by two hex digits), so it cannot be confused with
//! any text, including the empty string.
//!
//! Every byte other than ASCII alphanumerics and `-_.~` is escaped, so `#` only ever appears as a
//! separator. Because `#` sorts below every character that can appear inside a segment, sorting
//! encoded paths as plain strings yields a pre-order traversal: a node is immediately followed by
//! its whole subtree.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Segment separator.
pub const SEPARATOR: char = '#';

/// Encoded segment of a null component.
pub const NULL_SEGMENT: &str = "%";

const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors raised while decoding a path.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A non-empty encoded path does not start with the separator.
    #[error("encoded path '{0}' does not start with '#'")]
    MissingSeparator(String),
    /// A segment decodes to bytes that are not valid UTF-8.
    #[error("path segment '{0}' is not valid UTF-8 after decoding")]
    InvalidUtf8(String),
}

/// One component of a path: pivot value text, or `None` for a null pivot value.
///
/// Implemented for string types, which are never null, and for `Option`s of them.
pub trait PathComponent {
    /// The component's text, or `None` if it is null.
    fn component(&self) -> Option<&str>;
}

impl PathComponent for str {
    fn component(&self) -> Option<&str> {
        Some(self)
    }
}

impl PathComponent for String {
    fn component(&self) -> Option<&str> {
        Some(self)
    }
}

impl<T: PathComponent + ?Sized> PathComponent for &T {
    fn component(&self) -> Option<&str> {
        (**self).component()
    }
}

impl<T: PathComponent> PathComponent for Option<T> {
    fn component(&self) -> Option<&str> {
        self.as_ref().and_then(PathComponent::component)
    }
}

/// Percent-encodes a single path component.
pub fn encode_component(component: &str) -> String {
    utf8_percent_encode(component, SEGMENT).collect()
}

/// Encodes a path.
pub fn encode_path<S: PathComponent>(path: &[S]) -> String {
    let mut out = String::new();
    for component in path {
        out.push(SEPARATOR);
        match component.component() {
            Some(text) => out.extend(utf8_percent_encode(text, SEGMENT)),
            None => out.push_str(NULL_SEGMENT),
        }
    }
    out
}

/// Decodes a path produced by [`encode_path`]. Null components decode to `None`.
pub fn decode_path(encoded: &str) -> Result<Vec<Option<String>>, PathError> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }
    let body = encoded
        .strip_prefix(SEPARATOR)
        .ok_or_else(|| PathError::MissingSeparator(encoded.into()))?;
    body.split(SEPARATOR)
        .map(|segment| {
            if segment == NULL_SEGMENT {
                return Ok(None);
            }
            percent_decode_str(segment)
                .decode_utf8()
                .map(|s| Some(s.into_owned()))
                .map_err(|_| PathError::InvalidUtf8(segment.into()))
        })
        .collect()
}
