use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::ChannelSnapshot;

/// `t.me/<name>` style links. Group 1 marks private invites, group 2 is the path head.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.)?\b(?:t|telegram)\.me/(\+|joinchat/)?([A-Za-z0-9_]+)")
        .expect("valid regex")
});

/// `@name` mentions not glued to an e-mail address or URL path.
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_/.@])@([A-Za-z][A-Za-z0-9_]{4,31})").expect("valid regex")
});

/// Link paths that are platform features rather than channels.
const RESERVED_PATHS: &[&str] = &[
    "addstickers",
    "addemoji",
    "addtheme",
    "joinchat",
    "share",
    "proxy",
    "socks",
    "setlanguage",
    "login",
    "confirmphone",
];

/// Canonical stored form: trimmed, without a leading `@`, lowercased.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_ascii_lowercase()
}

/// Public usernames are 5–32 chars of `[A-Za-z0-9_]` and start with a letter.
pub fn is_valid_username(name: &str) -> bool {
    let len = name.len();
    if !(5..=32).contains(&len) {
        return false;
    }
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    first_ok && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether the text carries a private invite link (`t.me/+…`, `t.me/joinchat/…`).
pub fn has_private_invite(text: &str) -> bool {
    LINK_RE
        .captures_iter(text)
        .any(|caps| caps.get(1).is_some())
}

/// Public channel references found in one piece of text.
pub fn references_in(text: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();

    for caps in LINK_RE.captures_iter(text) {
        if caps.get(1).is_some() {
            continue;
        }
        if let Some(name) = caps.get(2) {
            push_candidate(&mut found, name.as_str());
        }
    }
    for caps in MENTION_RE.captures_iter(text) {
        if let Some(name) = caps.get(1) {
            push_candidate(&mut found, name.as_str());
        }
    }

    found
}

/// Outbound channel references across a snapshot's description and posts,
/// excluding the channel itself. Sorted and deduplicated.
pub fn extract_references(snapshot: &ChannelSnapshot) -> Vec<String> {
    let own = normalize_username(&snapshot.username);
    let mut all = references_in(&snapshot.description);
    for post in &snapshot.posts {
        all.extend(references_in(&post.text));
        if let Some(source) = &post.forwarded_from {
            let name = normalize_username(source);
            if is_valid_username(&name) {
                all.insert(name);
            }
        }
    }
    all.remove(&own);
    all.into_iter().collect()
}

fn push_candidate(found: &mut BTreeSet<String>, raw: &str) {
    let name = normalize_username(raw);
    if !is_valid_username(&name) {
        return;
    }
    if RESERVED_PATHS.contains(&name.as_str()) {
        return;
    }
    // Bot accounts share the namespace but are never channels.
    if name.ends_with("bot") {
        return;
    }
    found.insert(name);
}
