use crate::error::AppError;

/// RFC 4648 Base32 アルファベット（`A-Z2-7`）
const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// バイト列を Base32 エンコード（パディングなし）
///
/// 8ビットずつビットバッファへ積み、5ビット単位で切り出して
/// アルファベットへ写像する。20バイトの入力は32文字になる。
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &b in bytes {
        buffer = (buffer << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }

    // 端数ビットは左詰めで1文字にする
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

/// Base32 文字列をバイト列へデコード（パディングなし）
///
/// 各文字を5ビット値へ写像してビットを連結し、8ビットずつ
/// 切り出す。8ビットに満たない末尾のビットは捨てる。
///
/// # Note
/// アルファベット外の文字は読み飛ばす（既発行シークレットとの
/// 互換のため現行挙動を維持）。有効な文字が1つもない場合のみ
/// `InvalidSecretFormat` を返す。
pub fn decode(input: &str) -> Result<Vec<u8>, AppError> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    let mut saw_valid = false;

    for c in input.chars() {
        let Some(value) = char_value(c) else {
            continue;
        };
        saw_valid = true;

        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }

    if !saw_valid {
        return Err(AppError::InvalidSecretFormat);
    }

    Ok(out)
}

/// 1文字を5ビット値へ写像（大文字小文字は同一視）
fn char_value(c: char) -> Option<u8> {
    let c = c.to_ascii_uppercase();
    match c {
        'A'..='Z' => Some(c as u8 - b'A'),
        '2'..='7' => Some(c as u8 - b'2' + 26),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_vector() {
        // "Hello!\xde\xad\xbe\xef" の Base32 表現は広く知られたテストベクタ
        assert_eq!(encode(b"Hello!\xde\xad\xbe\xef"), "JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn test_decode_known_vector() {
        let decoded = decode("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(decoded, b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn test_roundtrip_20_bytes() {
        let bytes: Vec<u8> = (0..20).collect();
        let encoded = encode(&bytes);
        // 160ビット = 32文字、端数なし
        assert_eq!(encoded.len(), 32);
        assert_eq!(decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_decode_skips_invalid_characters() {
        // 空白やハイフンは読み飛ばされ、同じバイト列になる
        let decoded = decode("JBSW Y3DP-EHPK=3PXP").unwrap();
        assert_eq!(decoded, b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn test_decode_lowercase() {
        let decoded = decode("jbswy3dpehpk3pxp").unwrap();
        assert_eq!(decoded, b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn test_decode_all_invalid_is_error() {
        let result = decode("!!!0189");
        assert!(matches!(result, Err(AppError::InvalidSecretFormat)));
    }

    #[test]
    fn test_decode_discards_incomplete_trailing_bits() {
        // 1文字 = 5ビットは1バイトに満たないため空になる
        let decoded = decode("A").unwrap();
        assert!(decoded.is_empty());
    }
}
