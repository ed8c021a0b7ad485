//! Locale negotiation between configured language tags and device locales.
//!
//! Tags are compared on language and, when the configured tag names one,
//! region. Scripts and variants are ignored.

/// A language tag reduced to the parts used for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageTag {
    /// Lowercase ISO 639 language code.
    pub language: String,
    /// Uppercase ISO 3166 region or UN M.49 area code.
    pub region: Option<String>,
}

/// Normalizes separators and drops dangling ones.
///
/// Returns `None` for tags with nothing usable left (`""`, `"-"`, `"_"`).
pub fn sanitize(tag: &str) -> Option<String> {
    let normalized = tag.trim().replace('_', "-");
    let trimmed = normalized.trim_end_matches('-');
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return None;
    }
    Some(trimmed.to_string())
}

/// Parses a language tag after sanitizing it.
pub fn parse(tag: &str) -> Option<LanguageTag> {
    let sanitized = sanitize(tag)?;
    let mut parts = sanitized.split('-').filter(|part| !part.is_empty());

    let language = parts.next()?;
    if !language.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some(LanguageTag {
        language: language.to_ascii_lowercase(),
        region: parts
            .find(|part| is_region(part))
            .map(|part| part.to_ascii_uppercase()),
    })
}

fn is_region(part: &str) -> bool {
    (part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
        || (part.len() == 3 && part.chars().all(|c| c.is_ascii_digit()))
}

/// Returns true if any configured tag matches any device locale.
///
/// An empty list, or one made only of unusable tags, matches everything.
pub fn matches(configured: &[String], device_locales: &[String]) -> bool {
    let wanted: Vec<LanguageTag> = configured.iter().filter_map(|tag| parse(tag)).collect();
    if wanted.is_empty() {
        return true;
    }

    let available: Vec<LanguageTag> = device_locales
        .iter()
        .filter_map(|tag| parse(tag))
        .collect();

    wanted.iter().any(|want| {
        available.iter().any(|have| {
            have.language == want.language
                && want
                    .region
                    .as_ref()
                    .is_none_or(|region| have.region.as_ref() == Some(region))
        })
    })
}
