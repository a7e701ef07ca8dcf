use url::Url;

/// Derive a company name from a page address.
///
/// Strips a leading `www.`, keeps the label before the first dot and
/// title-cases it. Example: `"https://www.copyleaks.com/careers"` → `"Copyleaks"`.
/// Returns `"Unknown"` when the address has no usable host.
pub fn company_from_url(url: &str) -> String {
    let Some(host) = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
    else {
        return "Unknown".to_string();
    };

    let host = host.strip_prefix("www.").unwrap_or(&host);
    match host.split('.').next() {
        Some(label) if !label.is_empty() => title_case(label),
        _ => "Unknown".to_string(),
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
/// `"nvidia.wd5"` → `"Nvidia.Wd5"`, `"copy-leaks"` → `"Copy-Leaks"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Case-insensitive substring match against any keyword.
pub fn contains_any(text: &str, keywords: &[String]) -> bool {
    let text = text.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_at_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
