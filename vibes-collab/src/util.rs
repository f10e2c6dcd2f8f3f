use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;

lazy_static! {
    /// Matches an optional http(s) scheme at the start of a URL
    pub static ref URL_SCHEME_REGEX: Regex =
        Regex::new(r"^(?:https?://)?").expect("url scheme regex is valid");
    static ref NON_SLUG_REGEX: Regex = Regex::new(r"[^a-z0-9]+").expect("slug regex is valid");
}

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Turns a room name into a join key, e.g. "Late Night Jazz!" becomes "late-night-jazz-x7k2q9".
/// The random suffix keeps slugs unique between rooms of the same name.
pub fn slugify(name: &str) -> String {
    let lowercase = name.to_lowercase();
    let base = NON_SLUG_REGEX.replace_all(&lowercase, "-");
    let base: String = base.trim_matches('-').chars().take(32).collect();
    let suffix = random_string(6).to_lowercase();

    if base.is_empty() {
        suffix
    } else {
        format!("{}-{}", base.trim_end_matches('-'), suffix)
    }
}

/// Shortens a string to at most `max` characters.
pub fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
