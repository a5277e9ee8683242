//! DataURI codec
//!
//! Encodes and decodes the `data:<mime>;base64,<payload>` envelope used to
//! embed binary content inside JSON documents.
//!
//! The mime type is caller-supplied metadata and is never checked against
//! a whitelist. The payload uses the standard base64 alphabet with
//! canonical padding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Leading scheme of every data URI
pub const SCHEME: &str = "data:";

/// Separator between the mime type and the base64 payload
pub const BASE64_DELIMITER: &str = ";base64,";

/// Encode bytes into a data URI string
#[must_use]
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    let mut out = String::with_capacity(
        SCHEME.len() + mime_type.len() + BASE64_DELIMITER.len() + encoded_len(bytes.len()),
    );
    out.push_str(SCHEME);
    out.push_str(mime_type);
    out.push_str(BASE64_DELIMITER);
    STANDARD.encode_string(bytes, &mut out);
    out
}

/// Decode a data URI string into its mime type and bytes
///
/// # Errors
/// Returns error if the scheme, the delimiter, or a valid base64 payload
/// is missing
pub fn decode(uri: &str) -> Result<(String, Vec<u8>), CodecError> {
    let envelope = DataUriRef::split(uri)?;
    let bytes = envelope.decode()?;
    Ok((envelope.mime_type().to_string(), bytes))
}

/// Length of the base64 text for `len` input bytes (padded)
#[inline]
#[must_use]
pub const fn encoded_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}

/// Exact decoded byte length of a canonical padded base64 payload
///
/// Computed from the text length and trailing padding only, so oversized
/// content can be rejected without decoding it.
///
/// # Errors
/// Returns error if the payload cannot be canonical padded base64
pub fn decoded_len(payload: &str) -> Result<usize, CodecError> {
    if payload.len() % 4 != 0 {
        return Err(CodecError::invalid_base64(format!(
            "payload length {} is not a multiple of 4",
            payload.len()
        )));
    }
    let padding = payload.bytes().rev().take_while(|&b| b == b'=').count();
    if padding > 2 {
        return Err(CodecError::invalid_base64("more than two padding characters"));
    }
    Ok(payload.len() / 4 * 3 - padding)
}

/// Borrowed view of a data URI split into mime type and payload text
///
/// The payload is not decoded until [`DataUriRef::decode`] is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUriRef<'a> {
    mime_type: &'a str,
    payload: &'a str,
}

impl<'a> DataUriRef<'a> {
    /// Split a data URI at its scheme and delimiter
    ///
    /// The delimiter is the last `;base64,` occurrence: base64 text never
    /// contains `;` or `,`, so any mime string round-trips.
    ///
    /// # Errors
    /// Returns error if the scheme or the delimiter is missing
    pub fn split(uri: &'a str) -> Result<Self, CodecError> {
        let rest = uri.strip_prefix(SCHEME).ok_or(CodecError::MissingScheme)?;
        let at = rest
            .rfind(BASE64_DELIMITER)
            .ok_or(CodecError::MissingDelimiter)?;
        Ok(Self {
            mime_type: &rest[..at],
            payload: &rest[at + BASE64_DELIMITER.len()..],
        })
    }

    /// Mime type segment
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &'a str {
        self.mime_type
    }

    /// Raw base64 payload text
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &'a str {
        self.payload
    }

    /// Decoded length of the payload, without decoding
    ///
    /// # Errors
    /// Returns error if the payload length is not valid base64
    #[inline]
    pub fn decoded_len(&self) -> Result<usize, CodecError> {
        decoded_len(self.payload)
    }

    /// Decode the payload
    ///
    /// # Errors
    /// Returns error if the payload is not canonical base64
    pub fn decode(&self) -> Result<Vec<u8>, CodecError> {
        STANDARD
            .decode(self.payload)
            .map_err(|e| CodecError::invalid_base64(e.to_string()))
    }
}

/// Owned, decoded data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: Vec<u8>,
}

impl DataUri {
    /// Create from mime type and bytes
    #[inline]
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Mime type
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Decoded bytes
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decoded length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the content is zero bytes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Split into mime type and bytes
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.mime_type, self.data)
    }
}

impl Display for DataUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.mime_type, &self.data))
    }
}

impl FromStr for DataUri {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mime_type, data) = decode(s)?;
        Ok(Self { mime_type, data })
    }
}

/// Malformed data URI encoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Value does not start with `data:`
    #[error("missing `data:` scheme")]
    MissingScheme,

    /// No `;base64,` delimiter after the mime type
    #[error("missing `;base64,` delimiter")]
    MissingDelimiter,

    /// Payload is not valid standard base64
    #[error("invalid base64 payload: {reason}")]
    InvalidBase64 { reason: String },
}

impl CodecError {
    fn invalid_base64(reason: impl Into<String>) -> Self {
        Self::InvalidBase64 {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_frontend_sample() {
        assert_eq!(
            encode("text/plain", b"Hello World"),
            "data:text/plain;base64,SGVsbG8gV29ybGQ="
        );
    }

    #[test]
    fn encode_empty_is_valid() {
        let uri = encode("text/plain", b"");
        assert_eq!(uri, "data:text/plain;base64,");
        let (mime, bytes) = decode(&uri).unwrap();
        assert_eq!(mime, "text/plain");
        assert!(bytes.is_empty());
    }

    #[test]
    fn decode_rejects_missing_scheme() {
        assert_eq!(
            decode("text/plain;base64,SGVsbG8="),
            Err(CodecError::MissingScheme)
        );
    }

    #[test]
    fn decode_rejects_missing_delimiter() {
        assert_eq!(
            decode("data:text/plain,Hello"),
            Err(CodecError::MissingDelimiter)
        );
    }

    #[test]
    fn decode_rejects_bad_payload() {
        assert!(matches!(
            decode("data:text/plain;base64,SGVsbG8@"),
            Err(CodecError::InvalidBase64 { .. })
        ));
        assert!(matches!(
            decode("data:text/plain;base64,SGVsbG8"),
            Err(CodecError::InvalidBase64 { .. })
        ));
    }

    #[test]
    fn mime_is_not_whitelisted() {
        let uri = encode("application/x-made-up; charset=weird", &[1, 2, 3]);
        let parsed: DataUri = uri.parse().unwrap();
        assert_eq!(parsed.mime_type(), "application/x-made-up; charset=weird");
        assert_eq!(parsed.data(), &[1, 2, 3]);
    }

    #[test]
    fn mime_containing_delimiter_roundtrips() {
        let uri = encode("odd;base64,mime", b"xyz");
        assert_eq!(decode(&uri).unwrap(), ("odd;base64,mime".to_string(), b"xyz".to_vec()));
    }

    #[test]
    fn decoded_len_matches_padding() {
        assert_eq!(decoded_len("").unwrap(), 0);
        assert_eq!(decoded_len("QQ==").unwrap(), 1);
        assert_eq!(decoded_len("QUI=").unwrap(), 2);
        assert_eq!(decoded_len("QUJD").unwrap(), 3);
        assert!(decoded_len("QUJ").is_err());
        assert!(decoded_len("Q===").is_err());
    }

    #[test]
    fn split_does_not_decode() {
        let envelope = DataUriRef::split("data:image/png;base64,not-base64!").unwrap();
        assert_eq!(envelope.mime_type(), "image/png");
        assert_eq!(envelope.payload(), "not-base64!");
        assert!(envelope.decode().is_err());
    }

    #[test]
    fn display_matches_encode() {
        let uri = DataUri::new("application/pdf", b"%PDF-1.4...".to_vec());
        assert_eq!(uri.to_string(), encode("application/pdf", b"%PDF-1.4..."));
        assert_eq!(uri.len(), 11);
    }
}
