/// `"4111 **** **** 1234"` for a 16-digit PAN; `None` for anything else.
pub fn mask_pan(pan: &str) -> Option<String> {
    if pan.len() != 16 || !pan.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{} **** **** {}", &pan[..4], &pan[12..]))
}

/// Fallback display when the vault cannot resolve a token.
pub fn mask_token(token: &str) -> String {
    let tail: String = {
        let chars: Vec<char> = token.chars().collect();
        let start = chars.len().saturating_sub(4);
        chars[start..].iter().collect()
    };
    format!("**** **** **** {tail}")
}
