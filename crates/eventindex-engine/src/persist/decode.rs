//! Minimal word-level decoding for the token-transfer sub-indexer.
//!
//! Transfer events have fixed, well-known shapes, so the sub-indexer
//! reads topics and 32-byte data words directly instead of going
//! through the generated bindings layer.

/// `Transfer(address,address,uint256)` — ERC-20 and ERC-721.
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
/// `TransferSingle(address,address,address,uint256,uint256)` — ERC-1155.
pub const TRANSFER_SINGLE_TOPIC: &str =
    "0xc3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62";
/// `TransferBatch(address,address,address,uint256[],uint256[])` — ERC-1155.
pub const TRANSFER_BATCH_TOPIC: &str =
    "0x4a39dc06d4c0dbc64b70af90fd698a233a518aa5d07e595d983b8c0526c8f7fb";

/// Extract the address packed into a 32-byte topic.
pub fn topic_to_address(topic: &str) -> Option<String> {
    let hex = strip_hex(topic);
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", &hex[24..].to_ascii_lowercase()))
}

/// The `index`-th 32-byte word of ABI-encoded data, as 64 hex chars.
pub fn data_word(data: &str, index: usize) -> Option<&str> {
    let hex = strip_hex(data);
    let start = index * 64;
    hex.get(start..start + 64)
}

/// Parse a 32-byte hex word into `u64`; `None` when the value does not
/// fit (offsets and lengths always do).
pub fn word_to_u64(word: &str) -> Option<u64> {
    let trimmed = word.trim_start_matches('0');
    if trimmed.len() > 16 {
        return None;
    }
    if trimmed.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(trimmed, 16).ok()
}

/// Convert an arbitrary-width hex quantity to a decimal string.
///
/// uint256 values do not fit in any primitive, so this does schoolbook
/// base conversion over a digit vector.
pub fn hex_to_decimal(hex: &str) -> Option<String> {
    let hex = strip_hex(hex);
    if hex.is_empty() {
        return None;
    }
    // Base-10 digits, least significant first.
    let mut digits: Vec<u8> = vec![0];
    for c in hex.chars() {
        let nibble = c.to_digit(16)?;
        let mut carry = nibble;
        for d in digits.iter_mut() {
            let v = u32::from(*d) * 16 + carry;
            *d = (v % 10) as u8;
            carry = v / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    while digits.len() > 1 && *digits.last().unwrap() == 0 {
        digits.pop();
    }
    Some(digits.iter().rev().map(|d| char::from(b'0' + d)).collect())
}

/// Decode a dynamic `uint256[]` from ABI-encoded data. `head_word` is
/// the index of the head word holding the array's byte offset.
/// Returns decimal strings.
pub fn decode_u256_array(data: &str, head_word: usize) -> Option<Vec<String>> {
    let offset = word_to_u64(data_word(data, head_word)?)?;
    if offset % 32 != 0 {
        return None;
    }
    let len_index = (offset / 32) as usize;
    let len = word_to_u64(data_word(data, len_index)?)? as usize;

    let mut values = Vec::with_capacity(len);
    for i in 0..len {
        values.push(hex_to_decimal(data_word(data, len_index + 1 + i)?)?);
    }
    Some(values)
}

fn strip_hex(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}
