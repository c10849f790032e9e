//! Text handling for the gpascii shell: command lines going out, replies coming back.
//!
//! Nothing in here performs I/O. Parsers return `None` for any reply that does
//! not have the expected shape and leave the error classification to the session.
pub mod command;
pub mod reply;
pub mod value;

pub use command::{BatchRange, Command};
pub use value::{VarKind, VarValue};

/// Acknowledge byte that ends every normal gpascii reply
pub const ACK: u8 = 0x06;

/// Size of the reply buffer handed to the transport
pub const REPLY_BUFFER_LEN: usize = 5120;

/// Most items one batch query may ask for
pub const MAX_BATCH_ITEMS: usize = 32;

/// Delimiters separating the tokens of a batch reply
pub const BATCH_DELIMITERS: &str = " \r\n";

const ERROR_MARKER: &str = "error #";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Command is {len} bytes, limit is {max}")]
    CommandTooLong { len: usize, max: usize },

    #[error("Range {first}..{last} is out of order")]
    OutOfOrder { first: i32, last: i32 },

    #[error("Range of {count} items exceeds the limit of {max}")]
    TooManyItems { count: usize, max: usize },
}

/// Remove trailing CR and LF characters.
pub fn trim_right_crlf(s: &str) -> &str {
    s.trim_end_matches(['\r', '\n'])
}

/// Extract the controller error number from an `error #<N>:` marker.
///
/// Returns 0 when there is no marker, when the colon is missing, or when the
/// text between `#` and `:` is not a number.
pub fn check_error(reply: &str) -> u32 {
    let Some(index) = reply.find(ERROR_MARKER) else {
        return 0;
    };
    let rest = &reply[index + ERROR_MARKER.len()..];
    let Some(colon) = rest.find(':') else {
        log::debug!("Error marker without ':' ignored in {:?}", reply);
        return 0;
    };
    rest[..colon].trim().parse::<u32>().unwrap_or(0)
}

/// Split `s` into the maximal runs of characters not in `delimiters`.
///
/// Runs of delimiters collapse, so no empty tokens are produced.
pub fn splitit<'a>(s: &'a str, delimiters: &str) -> Vec<&'a str> {
    s.split(|c: char| delimiters.contains(c))
        .filter(|token| !token.is_empty())
        .collect()
}
