//! Console helpers shared by the probe binaries.

pub const RULE_WIDTH: usize = 80;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn thin_rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Print a title between two full-width rules.
pub fn banner(title: &str) {
    println!("{}", rule());
    println!("{}", title);
    println!("{}", rule());
}

/// First `max_chars` characters of `s`, with an ellipsis when something was cut.
pub fn excerpt(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().nth(max_chars).is_some() {
        out.push('…');
    }
    out
}

/// Last `max_chars` characters of `s`.
pub fn tail(s: &str, max_chars: usize) -> String {
    let total = s.chars().count();
    s.chars().skip(total.saturating_sub(max_chars)).collect()
}

/// Token preview safe to print: a short prefix plus the full length.
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(12).collect();
    format!("{}… ({} chars)", prefix, token.chars().count())
}

/// Pretty-print a JSON body when possible, otherwise return it unchanged.
pub fn pretty_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) => serde_json::to_string_pretty(&v).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}
