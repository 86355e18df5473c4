//! Base64 renderings used by PEM export and compact JWS segments.

use alloc::string::String;
use ::base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use ::base64::Engine as _;

/// Number of encoded characters per PEM body line.
pub const PEM_LINE_WIDTH: usize = 76;

/// Exact length of the padded standard encoding of `len` bytes.
pub const fn encoded_len(len: usize) -> usize {
    4 * ((len + 2) / 3)
}

/// Encodes with the URL-safe alphabet and no `=` padding.
pub fn url_encode(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Encodes with the standard alphabet, wraps the body every
/// [`PEM_LINE_WIDTH`] characters and frames it with `prefix` and `suffix`.
///
/// Line breaks are placed between body lines only; the caller's prefix and
/// suffix carry any framing newlines.
pub fn pem_encode(input: &[u8], prefix: &str, suffix: &str) -> String {
    let body_len = encoded_len(input.len());
    let breaks = body_len.saturating_sub(1) / PEM_LINE_WIDTH;

    let mut body = String::with_capacity(body_len);
    STANDARD.encode_string(input, &mut body);

    let mut out = String::with_capacity(prefix.len() + body_len + breaks + suffix.len());
    out.push_str(prefix);
    // The standard alphabet is ASCII, so byte-wise chunking is char-safe.
    for (i, line) in body.as_bytes().chunks(PEM_LINE_WIDTH).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.extend(line.iter().map(|&b| b as char));
    }
    out.push_str(suffix);
    out
}

/// Renders `der` as a PEM block with `-----BEGIN {label}-----` framing.
pub fn pem_document(der: &[u8], label: &str) -> String {
    let mut prefix = String::with_capacity(label.len() + 17);
    prefix.push_str("-----BEGIN ");
    prefix.push_str(label);
    prefix.push_str("-----\n");

    let mut suffix = String::with_capacity(label.len() + 17);
    suffix.push_str("\n-----END ");
    suffix.push_str(label);
    suffix.push_str("-----\n");

    pem_encode(der, &prefix, &suffix)
}
