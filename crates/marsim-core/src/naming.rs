//! Display-name helpers.

use std::cmp::Ordering;

use crate::constants::{SHORT_NAME_PART, SHORT_NAME_THRESHOLD};

/// Shorten a long two-part name for compact display.
///
/// Names longer than the threshold that contain a space get their first
/// word clipped if it is long, otherwise the remainder. Other names are
/// only trimmed.
pub fn shortened_name(name: &str) -> String {
    let name = name.trim();
    if name.chars().count() <= SHORT_NAME_THRESHOLD {
        return name.to_string();
    }
    let Some((first, rest)) = name.split_once(' ') else {
        return name.to_string();
    };
    if first.chars().count() > SHORT_NAME_PART {
        format!("{} {}", clip(first), rest)
    } else if rest.chars().count() > SHORT_NAME_PART {
        format!("{} {}", first, clip(rest))
    } else {
        name.to_string()
    }
}

fn clip(part: &str) -> String {
    part.chars().take(SHORT_NAME_PART).collect()
}

/// Case-insensitive name ordering.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_untouched() {
        assert_eq!(shortened_name("  Ada Lovelace "), "Ada Lovelace");
        assert_eq!(shortened_name("Schiaparelli"), "Schiaparelli");
    }

    #[test]
    fn test_long_first_word_clipped() {
        assert_eq!(
            shortened_name("Bartholomew-Jones Smith"),
            "Bartholome Smith"
        );
    }

    #[test]
    fn test_long_last_word_clipped() {
        assert_eq!(
            shortened_name("Ada Wolfeschlegelsteinhausen"),
            "Ada Wolfeschle"
        );
    }

    #[test]
    fn test_long_name_without_space() {
        let name = "Supercalifragilisticexpialidocious";
        assert_eq!(shortened_name(name), name);
    }

    #[test]
    fn test_compare_ignores_case() {
        assert_eq!(compare_names("alpha", "Beta"), Ordering::Less);
        assert_eq!(compare_names("ROVER", "rover"), Ordering::Equal);
    }
}
