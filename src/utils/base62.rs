//! Base62 encoding for short codes and synthesized request IDs.
//!
//! Short codes are the base62 form of the row id, so they are unique as long
//! as ids are. The same encoding turns the request-id counter into a compact
//! header value.

const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const BASE: u64 = ALPHABET.len() as u64;

/// Errors returned by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Base62Error {
    #[error("Empty base62 input")]
    Empty,

    #[error("Invalid base62 character: {0:?}")]
    InvalidCharacter(char),

    #[error("Base62 value does not fit in 64 bits")]
    Overflow,
}

/// Encodes a non-negative integer.
///
/// `0` encodes to `"a"`, `1` to `"b"`, `62` to `"ba"`.
pub fn encode(mut value: u64) -> String {
    if value == 0 {
        return (ALPHABET[0] as char).to_string();
    }

    let mut digits = Vec::with_capacity(11);
    while value > 0 {
        digits.push(ALPHABET[(value % BASE) as usize]);
        value /= BASE;
    }
    digits.reverse();

    digits.into_iter().map(char::from).collect()
}

/// Decodes a base62 string produced by [`encode`].
///
/// # Errors
///
/// Returns [`Base62Error`] for empty input, characters outside the alphabet,
/// or values larger than `u64::MAX`.
pub fn decode(code: &str) -> Result<u64, Base62Error> {
    if code.is_empty() {
        return Err(Base62Error::Empty);
    }

    code.chars().try_fold(0u64, |acc, ch| {
        let digit = digit_value(ch).ok_or(Base62Error::InvalidCharacter(ch))?;
        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or(Base62Error::Overflow)
    })
}

fn digit_value(ch: char) -> Option<u64> {
    match ch {
        'a'..='z' => Some(ch as u64 - 'a' as u64),
        'A'..='Z' => Some(ch as u64 - 'A' as u64 + 26),
        '0'..='9' => Some(ch as u64 - '0' as u64 + 52),
        _ => None,
    }
}
