//! Source text to tokens.
//!
//! Tokens carry no type tag, only their spelling. The structural characters are padded
//! with spaces so that `(a(b))` and `( a ( b ) )` split the same way, then the text is
//! split on whitespace. Lexing never fails: anything that is not structural ends up in
//! an atom token, and malformed input is rejected later by the parser.

/// Characters that always form a token on their own
pub(crate) const STRUCTURAL_CHARS: &[char] = &['(', ')', '\'', '[', ']'];

/// Split source text into a flat list of tokens, in source order.
pub fn tokenize(source: &str) -> Vec<String> {
    pad_structural(source)
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

/// Insert a space before and after every structural character
fn pad_structural(source: &str) -> String {
    let mut padded = String::with_capacity(source.len() * 2);
    for ch in source.chars() {
        if STRUCTURAL_CHARS.contains(&ch) {
            padded.push(' ');
            padded.push(ch);
            padded.push(' ');
        } else {
            padded.push(ch);
        }
    }
    padded
}
