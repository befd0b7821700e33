//! Content negotiation preferences.

use indexmap::IndexMap;
use podium_core::{Error, Result};

/// Weighted preferences a caller states for the representation it wants.
///
/// Each map goes from a (lowercased) range such as `text/turtle`, `text/*` or
/// `*/*` to a weight in `0.0..=1.0`. An empty map expresses no preference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepresentationPreferences {
    pub media_types: IndexMap<String, f32>,
    pub languages: IndexMap<String, f32>,
    pub charsets: IndexMap<String, f32>,
    pub encodings: IndexMap<String, f32>,
}

impl RepresentationPreferences {
    /// Preferences accepting anything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Builds media type preferences from an `Accept` header value.
    pub fn from_accept(accept: &str) -> Result<Self> {
        Ok(Self {
            media_types: parse_weighted(accept)?,
            ..Self::default()
        })
    }

    /// Adds a single media type preference.
    pub fn with_media_type(mut self, range: impl Into<String>, weight: f32) -> Self {
        self.media_types
            .insert(range.into().to_ascii_lowercase(), weight);
        self
    }

    /// The weight of `media_type`, taken from the most specific matching range.
    pub fn weight_for(&self, media_type: &str) -> f32 {
        if self.media_types.is_empty() {
            return 1.0;
        }
        let media_type = essence(media_type);
        let wildcard_sub = media_type
            .split_once('/')
            .map(|(main, _)| format!("{}/*", main));

        if let Some(weight) = self.media_types.get(&media_type) {
            return *weight;
        }
        if let Some(weight) = wildcard_sub.and_then(|range| self.media_types.get(&range)) {
            return *weight;
        }
        self.media_types.get("*/*").copied().unwrap_or(0.0)
    }

    /// Picks the best of `available`, which is listed in the store's default order.
    ///
    /// The type with the greatest positive weight wins; ties go to the type
    /// listed first. Fails with [`Error::NotAcceptable`] if nothing is
    /// acceptable.
    pub fn select_type<'a>(&self, available: &[&'a str]) -> Result<&'a str> {
        let mut best: Option<(&'a str, f32)> = None;
        for candidate in available {
            let weight = self.weight_for(candidate);
            if weight <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, w)| weight > w) {
                best = Some((*candidate, weight));
            }
        }
        best.map(|(t, _)| t).ok_or_else(|| {
            Error::NotAcceptable(format!(
                "none of {} satisfies the preferences",
                available.join(", ")
            ))
        })
    }
}

/// Parses `value1;q=0.5, value2` syntax into a range → weight map.
///
/// Parameters other than `q` are dropped. A malformed weight is rejected.
pub fn parse_weighted(header: &str) -> Result<IndexMap<String, f32>> {
    let mut result = IndexMap::new();
    for part in header.split(',') {
        let mut pieces = part.split(';');
        let range = pieces.next().unwrap_or_default().trim().to_ascii_lowercase();
        if range.is_empty() {
            continue;
        }
        let mut weight = 1.0;
        for param in pieces {
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("q") {
                weight = parse_weight(value.trim())?;
            }
        }
        result.insert(range, weight);
    }
    Ok(result)
}

fn parse_weight(value: &str) -> Result<f32> {
    let weight: f32 = value
        .parse()
        .map_err(|_| Error::BadRequest(format!("invalid weight: {}", value)))?;
    if !(0.0..=1.0).contains(&weight) {
        return Err(Error::BadRequest(format!("weight out of range: {}", value)));
    }
    Ok(weight)
}

/// `text/html; charset=utf-8` → `text/html`
pub fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVAILABLE: [&str; 3] = ["text/turtle", "application/ld+json", "application/json"];

    #[test]
    fn test_parse_accept() {
        let prefs =
            RepresentationPreferences::from_accept("text/turtle;q=0.5, application/json, */*;q=0.1")
                .unwrap();
        assert_eq!(prefs.media_types.get("text/turtle"), Some(&0.5));
        assert_eq!(prefs.media_types.get("application/json"), Some(&1.0));
        assert_eq!(prefs.media_types.get("*/*"), Some(&0.1));
    }

    #[test]
    fn test_malformed_weight() {
        assert!(RepresentationPreferences::from_accept("text/turtle;q=abc").is_err());
        assert!(RepresentationPreferences::from_accept("text/turtle;q=1.5").is_err());
    }

    #[test]
    fn test_most_specific_range_wins() {
        let prefs = RepresentationPreferences::any()
            .with_media_type("text/*", 0.2)
            .with_media_type("text/turtle", 0.9)
            .with_media_type("*/*", 0.5);
        assert_eq!(prefs.weight_for("text/turtle"), 0.9);
        assert_eq!(prefs.weight_for("text/plain; charset=utf-8"), 0.2);
        assert_eq!(prefs.weight_for("image/png"), 0.5);
    }

    #[test]
    fn test_select_by_weight() {
        let prefs = RepresentationPreferences::from_accept("application/json, text/turtle;q=0.8")
            .unwrap();
        assert_eq!(prefs.select_type(&AVAILABLE).unwrap(), "application/json");
    }

    #[test]
    fn test_ties_use_declared_order() {
        let prefs = RepresentationPreferences::from_accept("*/*").unwrap();
        assert_eq!(prefs.select_type(&AVAILABLE).unwrap(), "text/turtle");
        assert_eq!(
            RepresentationPreferences::any().select_type(&AVAILABLE).unwrap(),
            "text/turtle"
        );
    }

    #[test]
    fn test_not_acceptable() {
        let prefs = RepresentationPreferences::from_accept("image/png, text/turtle;q=0").unwrap();
        let err = prefs.select_type(&AVAILABLE).unwrap_err();
        assert!(matches!(err, Error::NotAcceptable(_)));
    }
}
