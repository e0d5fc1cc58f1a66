//! URL slugs
//!
//! Slugs are lowercase ASCII words joined by single hyphens. Collisions get a
//! numeric suffix (`-2`, `-3`, ...).

use anyhow::Result;
use std::future::Future;

const MAX_SLUG_LENGTH: usize = 100;

/// Static path segments routed next to `{slug}` (`/articles/latest`, `/talents/me`)
const RESERVED_SLUGS: &[&str] = &["latest", "me"];

pub fn is_reserved(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

/// Slugify a name or title.
///
/// Returns an empty string when nothing slug-worthy remains.
pub fn generate_slug(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_hyphen = false;

    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    if result.len() > MAX_SLUG_LENGTH {
        result.truncate(MAX_SLUG_LENGTH);
    }
    result.trim_end_matches('-').to_string()
}

/// Slug from an explicit value if given, else from `fallback_text`.
/// Falls back to `default` when both slugify to nothing.
pub fn slug_or(explicit: Option<&str>, fallback_text: &str, default: &str) -> String {
    let slug = explicit
        .map(generate_slug)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| generate_slug(fallback_text));
    if slug.is_empty() {
        default.to_string()
    } else {
        slug
    }
}

/// First of `base`, `base-2`, `base-3`, ... that is not reserved and for
/// which `exists` answers false.
pub async fn unique_slug<F, Fut>(base: &str, mut exists: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    if !is_reserved(base) && !exists(base.to_string()).await? {
        return Ok(base.to_string());
    }

    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}
