use std::collections::HashMap;

use once_cell::sync::Lazy;

// Keyed by the already-cleaned form, so entries never carry FC/AFC or punctuation.
static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("man united", "manchester united"),
        ("man utd", "manchester united"),
        ("manchester utd", "manchester united"),
        ("man city", "manchester city"),
        ("spurs", "tottenham hotspur"),
        ("tottenham", "tottenham hotspur"),
        ("wolves", "wolverhampton wanderers"),
        ("wolverhampton", "wolverhampton wanderers"),
        ("newcastle", "newcastle united"),
        ("brighton and hove albion", "brighton"),
        ("west ham", "west ham united"),
        ("nottm forest", "nottingham forest"),
        ("nott ham forest", "nottingham forest"),
        ("leeds", "leeds united"),
        ("leicester", "leicester city"),
        ("ipswich", "ipswich town"),
    ])
});

/// Normalised lookup key for a team display name.
///
/// "Arsenal FC", "arsenal" and "ARSENAL" all map to `arsenal`; "Brighton & Hove
/// Albion" maps to `brighton` through the alias table.
pub fn canonical_key(name: &str) -> String {
    let cleaned = canonical_words(name).join(" ");
    match ALIASES.get(cleaned.as_str()) {
        Some(alias) => (*alias).to_string(),
        None => cleaned,
    }
}

fn canonical_words(name: &str) -> Vec<String> {
    let lowered = name.trim().to_lowercase().replace('&', " and ");
    // "A.F.C." has to collapse into a single token before punctuation splits it.
    let lowered = lowered.replace("a.f.c.", " afc ").replace("f.c.", " fc ");

    let mut cleaned = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }

    cleaned
        .split_whitespace()
        .filter(|w| !matches!(*w, "fc" | "afc"))
        .map(str::to_string)
        .collect()
}
