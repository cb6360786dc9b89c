//! User-supplied import options
//!
//! The options blob is uploaded alongside the CSV and persisted with the
//! job, so a redelivered job replans rows with the same mapping.

use crate::models::library::Judgment;
use serde::{Deserialize, Serialize};

/// What a given star rating maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingAction {
    Accepted,
    Rejected,
    #[default]
    Unjudged,
}

impl RatingAction {
    pub fn judgment(self) -> Option<Judgment> {
        match self {
            RatingAction::Accepted => Some(Judgment::Accepted),
            RatingAction::Rejected => Some(Judgment::Rejected),
            RatingAction::Unjudged => None,
        }
    }
}

/// Parsed user options for one import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// When false, judgment is always None regardless of the row's rating
    pub map_ratings: bool,
    /// Independent mapping for each of the five star values; index 0 is
    /// one star. Ratings are never inferred from a threshold.
    pub rating_mapping: [RatingAction; 5],
}

impl ImportOptions {
    /// Judgment for a star rating (1..=5). Zero means unrated.
    pub fn judgment_for_rating(&self, stars: u8) -> Option<Judgment> {
        if !self.map_ratings {
            return None;
        }
        match stars {
            1..=5 => self.rating_mapping[(stars - 1) as usize].judgment(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> ImportOptions {
        ImportOptions {
            map_ratings: true,
            rating_mapping: [
                RatingAction::Rejected,
                RatingAction::Unjudged,
                RatingAction::Unjudged,
                RatingAction::Accepted,
                RatingAction::Accepted,
            ],
        }
    }

    #[test]
    fn each_star_maps_independently() {
        let options = mapping();
        assert_eq!(options.judgment_for_rating(1), Some(Judgment::Rejected));
        assert_eq!(options.judgment_for_rating(2), None);
        assert_eq!(options.judgment_for_rating(3), None);
        assert_eq!(options.judgment_for_rating(4), Some(Judgment::Accepted));
        assert_eq!(options.judgment_for_rating(5), Some(Judgment::Accepted));
    }

    #[test]
    fn zero_stars_is_unrated() {
        assert_eq!(mapping().judgment_for_rating(0), None);
    }

    #[test]
    fn disabled_mapping_never_judges() {
        let options = ImportOptions {
            map_ratings: false,
            ..mapping()
        };
        for stars in 0..=5 {
            assert_eq!(options.judgment_for_rating(stars), None);
        }
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ImportOptions = serde_json::from_str("{}").unwrap();
        assert!(!options.map_ratings);

        let options: ImportOptions = serde_json::from_str(
            r#"{"map_ratings": true,
                "rating_mapping": ["rejected", "unjudged", "unjudged", "accepted", "accepted"]}"#,
        )
        .unwrap();
        assert_eq!(options.judgment_for_rating(4), Some(Judgment::Accepted));
    }
}
