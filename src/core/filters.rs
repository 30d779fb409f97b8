use crate::models::NameFilters;

/// Apply the name filter pipeline
///
/// Stages run in order: minimum length, maximum length, hyphen exclusion,
/// digit exclusion. Surviving names keep their input order. No filters
/// means every name survives.
pub fn apply_filters(names: &[String], filters: Option<&NameFilters>) -> Vec<String> {
    let Some(filters) = filters else {
        return names.to_vec();
    };

    names
        .iter()
        .filter(|name| passes_filters(name, filters))
        .cloned()
        .collect()
}

/// Check a single name against the filter pipeline
#[inline]
pub fn passes_filters(name: &str, filters: &NameFilters) -> bool {
    let length = name.chars().count();

    if let Some(min) = filters.min_length {
        if length < min {
            return false;
        }
    }

    if let Some(max) = filters.max_length {
        if length > max {
            return false;
        }
    }

    if !filters.include_hyphens && name.contains('-') {
        return false;
    }

    if filters.exclude_digits && name.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_filters_is_identity() {
        let input = names(&["b-c", "a1", "x"]);
        assert_eq!(apply_filters(&input, None), input);
    }

    #[test]
    fn test_filter_composition() {
        let input = names(&["ab", "a-b", "a1", "abcd"]);
        let filters = NameFilters {
            min_length: Some(3),
            max_length: None,
            include_hyphens: false,
            exclude_digits: true,
        };

        assert_eq!(apply_filters(&input, Some(&filters)), names(&["abcd"]));
    }

    #[test]
    fn test_max_length() {
        let filters = NameFilters {
            max_length: Some(4),
            include_hyphens: true,
            ..Default::default()
        };

        assert!(passes_filters("abcd", &filters));
        assert!(!passes_filters("abcde", &filters));
    }

    #[test]
    fn test_hyphens_kept_when_included() {
        let filters = NameFilters {
            include_hyphens: true,
            ..Default::default()
        };

        assert!(passes_filters("my-brand", &filters));
    }

    #[test]
    fn test_order_preserved() {
        let input = names(&["zeta", "alpha", "mid"]);
        let filters = NameFilters::default();
        assert_eq!(apply_filters(&input, Some(&filters)), input);
    }
}
