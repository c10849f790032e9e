//! Reply parsers.
//!
//! Each parser takes a reply that has already been trimmed and checked for an
//! error marker, and returns `None` when the text does not have the expected
//! shape.
use std::str::FromStr;

use super::{splitit, BATCH_DELIMITERS};

const STATUS32_LEN: usize = 9;
const STATUS64_LEN: usize = 17;
const EMPTY_BUFFER: &str = "Buffer is empty";

/// Numbers that may be read out of a reply.
pub trait ReplyNumber: FromStr + Copy {
    fn is_finite_value(&self) -> bool;
}

macro_rules! reply_float {
    ($($t:ty),*) => {$(
        impl ReplyNumber for $t {
            fn is_finite_value(&self) -> bool {
                self.is_finite()
            }
        }
    )*};
}

macro_rules! reply_int {
    ($($t:ty),*) => {$(
        impl ReplyNumber for $t {
            fn is_finite_value(&self) -> bool {
                true
            }
        }
    )*};
}

reply_float!(f32, f64);
reply_int!(i32, u32, i64, u64);

/// Parse a whole reply as one number.
///
/// Surrounding whitespace is tolerated, anything else is not. `inf`, `nan`
/// and values that overflow to infinity are rejected.
pub fn parse_number<T: ReplyNumber>(reply: &str) -> Option<T> {
    let value = reply.trim().parse::<T>().ok()?;
    value.is_finite_value().then_some(value)
}

/// Reply to a single boolean query: exactly `1` or `0`.
pub fn parse_bool(reply: &str) -> Option<bool> {
    match reply {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Reply to a two-expression boolean query such as `Plc[1].Active Plc[1].Running`.
pub fn parse_bool_pair(reply: &str) -> Option<(bool, bool)> {
    let mut values = reply.split_whitespace().map(|token| token.parse::<i32>().ok());
    let first = values.next()??;
    let second = values.next()??;
    Some((flag(first)?, flag(second)?))
}

fn flag(value: i32) -> Option<bool> {
    match value {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// `$XXXXXXXX`: one flag character then eight hex digits.
pub fn parse_status32(reply: &str) -> Option<u32> {
    if reply.len() != STATUS32_LEN {
        return None;
    }
    hex_word(reply.get(1..9)?)
}

/// `$HHHHHHHHLLLLLLLL`: one flag character then two eight-digit halves, high first.
pub fn parse_status64(reply: &str) -> Option<u64> {
    if reply.len() != STATUS64_LEN {
        return None;
    }
    let high = hex_word(reply.get(1..9)?)?;
    let low = hex_word(reply.get(9..17)?)?;
    Some((u64::from(high) << 32) | u64::from(low))
}

fn hex_word(digits: &str) -> Option<u32> {
    let mut bytes = [0u8; 4];
    hex::decode_to_slice(digits, &mut bytes).ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Split a batch reply and parse every token with `parse`.
///
/// The reply must hold exactly `count` tokens and every one of them must
/// parse; otherwise nothing is returned.
pub fn parse_batch<T, F>(reply: &str, count: usize, parse: F) -> Option<Vec<T>>
where
    F: Fn(&str) -> Option<T>,
{
    let tokens = splitit(reply, BATCH_DELIMITERS);
    if tokens.len() != count {
        log::debug!("Batch reply has {} tokens, expected {}", tokens.len(), count);
        return None;
    }
    tokens.into_iter().map(parse).collect()
}

/// Reply to `buffer`: one line per program, the name being the first word.
pub fn parse_program_names(reply: &str) -> Option<Vec<String>> {
    if reply.is_empty() || reply == EMPTY_BUFFER {
        return Some(Vec::new());
    }
    splitit(reply, "\r\n")
        .into_iter()
        .map(|line| splitit(line, " ").first().map(|name| name.to_string()))
        .collect()
}

/// Lenient read of a fixed list of counters. Missing or unreadable
/// tokens count as zero.
pub fn parse_counters<const N: usize>(reply: &str) -> [f64; N] {
    let mut counters = [0.0; N];
    for (slot, token) in counters.iter_mut().zip(splitit(reply, BATCH_DELIMITERS)) {
        *slot = parse_number::<f64>(token).unwrap_or(0.0);
    }
    counters
}
