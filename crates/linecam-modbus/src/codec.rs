// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register text decoding.
//!
//! Text is packed two ASCII bytes per register, but which byte carries the
//! first character varies between devices. [`decode_words`] builds both
//! candidates and picks one with a heuristic:
//!
//! 1. a non-empty candidate beats an empty one
//! 2. the longer candidate wins
//! 3. with equal lengths, a candidate with more separators (`_ - .` or space)
//!    at even positions than at odd ones looks byte-swapped and loses
//! 4. otherwise low-byte-first wins
//!
//! The heuristic is best-effort. Callers must tolerate the occasional
//! misclassification.

use std::fmt;

// =============================================================================
// ByteOrder
// =============================================================================

/// Which byte of a register holds the first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Bits 15..8 first.
    HighFirst,
    /// Bits 7..0 first.
    LowFirst,
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighFirst => write!(f, "high-first"),
            Self::LowFirst => write!(f, "low-first"),
        }
    }
}

// =============================================================================
// DecodedText
// =============================================================================

/// Both decoding candidates and the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// High-byte-first candidate.
    pub high_first: String,
    /// Low-byte-first candidate.
    pub low_first: String,
    /// Which candidate was selected.
    pub chosen: ByteOrder,
}

impl DecodedText {
    /// Returns the selected text.
    pub fn text(&self) -> &str {
        match self.chosen {
            ByteOrder::HighFirst => &self.high_first,
            ByteOrder::LowFirst => &self.low_first,
        }
    }

    /// Consumes self and returns the selected text.
    pub fn into_text(self) -> String {
        match self.chosen {
            ByteOrder::HighFirst => self.high_first,
            ByteOrder::LowFirst => self.low_first,
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decodes packed ASCII from `words`, keeping at most `capacity` characters.
pub fn decode_words(words: &[u16], capacity: usize) -> DecodedText {
    let high_first = sanitize_ascii(&unpack(words, ByteOrder::HighFirst), capacity);
    let low_first = sanitize_ascii(&unpack(words, ByteOrder::LowFirst), capacity);
    let chosen = choose(&high_first, &low_first);

    DecodedText {
        high_first,
        low_first,
        chosen,
    }
}

fn choose(high_first: &str, low_first: &str) -> ByteOrder {
    match (high_first.is_empty(), low_first.is_empty()) {
        (true, _) => return ByteOrder::LowFirst,
        (false, true) => return ByteOrder::HighFirst,
        _ => {}
    }

    if high_first.len() != low_first.len() {
        return if high_first.len() > low_first.len() {
            ByteOrder::HighFirst
        } else {
            ByteOrder::LowFirst
        };
    }

    match (looks_byte_swapped(high_first), looks_byte_swapped(low_first)) {
        (false, true) => ByteOrder::HighFirst,
        _ => ByteOrder::LowFirst,
    }
}

fn unpack(words: &[u16], order: ByteOrder) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        let [high, low] = word.to_be_bytes();
        match order {
            ByteOrder::HighFirst => bytes.extend_from_slice(&[high, low]),
            ByteOrder::LowFirst => bytes.extend_from_slice(&[low, high]),
        }
    }
    bytes
}

/// Truncates to `capacity`, cuts at the first NUL, keeps printable ASCII
/// (0x20..=0x7E) and trims surrounding whitespace.
pub fn sanitize_ascii(bytes: &[u8], capacity: usize) -> String {
    let bytes = &bytes[..bytes.len().min(capacity)];
    let bytes = match bytes.iter().position(|&b| b == 0) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    };

    let printable: String = bytes
        .iter()
        .filter(|b| (0x20..=0x7E).contains(*b))
        .map(|&b| char::from(b))
        .collect();

    printable.trim().to_string()
}

/// Returns `true` when separators cluster on even positions, which is what a
/// byte-swapped rendering of a normally formatted code looks like.
pub fn looks_byte_swapped(value: &str) -> bool {
    if value.len() < 2 {
        return false;
    }

    let (even, odd) = value
        .bytes()
        .enumerate()
        .filter(|(_, b)| matches!(b, b'_' | b'-' | b'.' | b' '))
        .fold((0usize, 0usize), |(even, odd), (i, _)| {
            if i % 2 == 0 {
                (even + 1, odd)
            } else {
                (even, odd + 1)
            }
        });

    even > odd
}

/// Decodes camera barcode registers, one character per `words_per_char`
/// group.
///
/// The first word of each group is the full character code. Decoding stops
/// at the first zero word; any other word counts as a character and is
/// dropped later if it is not printable ASCII.
pub fn decode_barcode(words: &[u16], words_per_char: usize) -> String {
    let step = words_per_char.max(1);

    words
        .chunks(step)
        .filter(|c| c.len() == step)
        .map(|c| c[0])
        .take_while(|&w| w != 0)
        .map(|w| char::from_u32(u32::from(w)).unwrap_or(char::REPLACEMENT_CHARACTER))
        .filter(|c| (' '..='~').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pack_low_first(text: &str) -> Vec<u16> {
        text.as_bytes()
            .chunks(2)
            .map(|pair| {
                let low = u16::from(pair[0]);
                let high = pair.get(1).map(|&b| u16::from(b)).unwrap_or(0);
                (high << 8) | low
            })
            .collect()
    }

    fn pack_high_first(text: &str) -> Vec<u16> {
        text.as_bytes()
            .chunks(2)
            .map(|pair| {
                let high = u16::from(pair[0]);
                let low = pair.get(1).map(|&b| u16::from(b)).unwrap_or(0);
                (high << 8) | low
            })
            .collect()
    }

    #[test]
    fn test_low_first_wins_when_high_first_garbled() {
        let mut words = pack_low_first("ABC123");
        words.push(0x0700);
        let decoded = decode_words(&words, 40);
        assert_eq!(decoded.low_first, "ABC123");
        assert_eq!(decoded.high_first, "BA1C32");
        assert_eq!(decoded.chosen, ByteOrder::LowFirst);
        assert_eq!(decoded.into_text(), "ABC123");
    }

    #[test]
    fn test_longer_candidate_wins() {
        // Odd length: the high-first reading hits the padding NUL early.
        let decoded = decode_words(&pack_low_first("ABC12"), 40);
        assert_eq!(decoded.low_first, "ABC12");
        assert_eq!(decoded.high_first, "BA1C");
        assert_eq!(decoded.text(), "ABC12");
    }

    #[test]
    fn test_separator_heuristic_prefers_high_first() {
        let decoded = decode_words(&pack_high_first("X-Y_Z.W1"), 40);
        assert_eq!(decoded.high_first, "X-Y_Z.W1");
        assert_eq!(decoded.low_first, "-X_Y.Z1W");
        assert!(looks_byte_swapped(&decoded.low_first));
        assert!(!looks_byte_swapped(&decoded.high_first));
        assert_eq!(decoded.text(), "X-Y_Z.W1");
    }

    #[test]
    fn test_empty_candidate_loses() {
        // Only the low bytes carry data and high bytes are NUL: high-first
        // terminates immediately.
        let words = vec![0x0041, 0x0042];
        let decoded = decode_words(&words, 4);
        assert_eq!(decoded.high_first, "");
        assert_eq!(decoded.low_first, "A");
        assert_eq!(decoded.text(), "A");
    }

    #[test]
    fn test_sanitize_capacity_and_terminator() {
        assert_eq!(sanitize_ascii(b"HELLO WORLD", 5), "HELLO");
        assert_eq!(sanitize_ascii(b"AB\0CD", 10), "AB");
        assert_eq!(sanitize_ascii(b"  A\x07B  ", 10), "AB");
        assert_eq!(sanitize_ascii(b"   ", 10), "");
        assert_eq!(sanitize_ascii(b"", 10), "");
    }

    #[test]
    fn test_looks_byte_swapped_short_input() {
        assert!(!looks_byte_swapped(""));
        assert!(!looks_byte_swapped("-"));
        assert!(looks_byte_swapped("-A"));
        assert!(!looks_byte_swapped("A-"));
    }

    #[test]
    fn test_decode_barcode_full_word() {
        let words = vec![u16::from(b'X'), 0, u16::from(b'7'), 0, 0, 0];
        assert_eq!(decode_barcode(&words, 2), "X7");
    }

    #[test]
    fn test_decode_barcode_surrogates_are_dropped() {
        let words = vec![0xD841, 0, 0xD842, 0];
        assert_eq!(decode_barcode(&words, 2), "");

        let words = vec![u16::from(b'Z'), 0, 0xDC00, 0, u16::from(b'9'), 0];
        assert_eq!(decode_barcode(&words, 2), "Z9");
    }

    #[test]
    fn test_decode_barcode_leading_zero_is_empty() {
        let words = vec![0, 0, u16::from(b'A'), 0];
        assert_eq!(decode_barcode(&words, 2), "");
    }

    #[test]
    fn test_decode_barcode_filters_wide_words() {
        let words = vec![0x4141, 0, 0x4242, 0];
        assert_eq!(decode_barcode(&words, 2), "");
    }

    #[test]
    fn test_decode_barcode_ignores_partial_group() {
        let words = vec![u16::from(b'Q'), 0, u16::from(b'R')];
        assert_eq!(decode_barcode(&words, 2), "Q");
    }
}
