//! Transmit payload encoding.
//!
//! Converts application-level text into the outbound byte sequence. Text
//! mode encodes UTF-8. Hex mode strips everything outside `[0-9A-Fa-f]`,
//! requires an even digit count, and parses adjacent digit pairs
//! most-significant-nibble first.

use portkit_core::SessionError;

/// Encode outbound text into raw bytes
///
/// Returns `TransmitFailure` for an empty payload and
/// `MalformedHexPayload` when hex mode is left with an odd digit count
/// after stripping separators. No partial result is ever produced.
pub fn encode_payload(text: &str, hex_mode: bool) -> Result<Vec<u8>, SessionError> {
    if text.is_empty() {
        return Err(SessionError::TransmitFailure {
            reason: "payload is empty".to_string(),
        });
    }

    if !hex_mode {
        return Ok(text.as_bytes().to_vec());
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_hexdigit()).collect();

    if digits.len() % 2 != 0 {
        return Err(SessionError::MalformedHexPayload {
            digit_count: digits.len(),
        });
    }

    hex::decode(&digits).map_err(|e| SessionError::TransmitFailure {
        reason: format!("hex decode failed: {}", e),
    })
}
