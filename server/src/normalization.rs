use serde::{Deserialize, Deserializer};

/// Normalizes free text by stripping surrounding whitespace and
/// composing it into Unicode Normalization Form C.
///
/// ```
/// use directory::normalization::normalize_text;
/// assert_eq!(normalize_text(" Jose\u{301} "), "José");
/// ```
pub fn normalize_text(text: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    text.as_ref().trim().nfc().to_string()
}

/// Normalizes optional text, mapping blank values to `None`.
pub fn normalize_optional(text: Option<impl AsRef<str>>) -> Option<String> {
    text.map(normalize_text).filter(|s| !s.is_empty())
}

/// Deserializes a `String` after running it through `normalize_text`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(normalize_text(s))
}

/// Deserializes an optional `String` after running it through
/// `normalize_text`. Blank strings become `None`.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
    let o: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(normalize_optional(o))
}

/// Deserializes a patch field for optional text. Used together with
/// `#[serde(default)]`: a missing key stays `None` (leave unchanged),
/// while `null` or a blank string become `Some(None)` (clear).
pub fn deserialize_patch<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where D: Deserializer<'de> {
    let o: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(Some(normalize_optional(o)))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::Deserialize;
    use unicode_normalization::is_nfc;

    use super::normalize_text;

    fn count_whitespace(s: impl AsRef<str>) -> usize {
        s.as_ref().chars().filter(|c| c.is_whitespace()).count()
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "super::deserialize_patch")]
        website: Option<Option<String>>,
    }

    #[test]
    fn patch_fields_distinguish_absent_from_cleared() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.website, None);

        let null: Patch = serde_json::from_str(r#"{"website": null}"#).unwrap();
        assert_eq!(null.website, Some(None));

        let blank: Patch = serde_json::from_str(r#"{"website": "  "}"#).unwrap();
        assert_eq!(blank.website, Some(None));

        let set: Patch = serde_json::from_str(r#"{"website": " https://example.com "}"#).unwrap();
        assert_eq!(set.website, Some(Some("https://example.com".to_owned())));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 10000, ..ProptestConfig::default()
        })]

        #[test]
        fn normalization_works(string in "(\\S.*\\S|\\S+)", space_before in "\\s*", space_after in "\\s*") {
            let normalized = normalize_text(format!("{}{}{}", space_before, string, space_after));

            prop_assert!(is_nfc(&normalized), "{:?} (normalized form of {:?}) is in NFC", normalized, string);

            prop_assert!(!normalized.starts_with(char::is_whitespace) && !normalized.ends_with(char::is_whitespace), "{:?} (normalized form of {:?}) has no leading or trailing whitespace", normalized, string);

            let trimmed = normalized.trim();

            prop_assert_eq!(count_whitespace(&normalized), count_whitespace(&trimmed), "{:?} (normalized form of {:?}) preserves inner whitespace", normalized, string);
        }
    }
}
