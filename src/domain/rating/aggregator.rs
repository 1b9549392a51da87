//! Average rating of a reviewable entity.
//!
//! The same numbers come out of two places: here, for a single fetched entity, and
//! from the store's `Stage::Average` for bulk listings. The in-memory store calls
//! [`average_of_values`] directly and the postgres store computes
//! `round(avg(rating)::numeric, 2)`; both round half away from zero on the exact
//! decimal average.

use crate::domain::model::review::Review;
use crate::domain::model::{RATING_FIELD, REVIEWS_FIELD};
use crate::storage::document::Document;
use serde_json::Value as JsonValue;

/// Decimal places kept in every reported average.
pub const RATING_PLACES: u32 = 2;

/// Anything that carries an embedded review sequence.
pub trait Reviewable {
    /// Average rating rounded to [`RATING_PLACES`], or `0.0` without reviews.
    fn average_rating(&self) -> f64;
}

impl Reviewable for [Review] {
    fn average_rating(&self) -> f64 {
        let mut acc = RatingSum::default();
        for review in self {
            acc.push_int(review.rating);
        }
        acc.average(RATING_PLACES)
    }
}

impl Reviewable for Vec<Review> {
    fn average_rating(&self) -> f64 {
        self.as_slice().average_rating()
    }
}

/// Raw stored documents: an absent or non-array `reviews` field counts as empty.
impl Reviewable for Document {
    fn average_rating(&self) -> f64 {
        let ratings = self
            .get(REVIEWS_FIELD)
            .and_then(|v| v.as_array())
            .map(|reviews| {
                reviews
                    .iter()
                    .filter_map(|r| r.get(RATING_FIELD))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        average_of_values(ratings, RATING_PLACES)
    }
}

/// Averages the numeric values, ignoring anything that is not a JSON number.
pub fn average_of_values<'a, I>(values: I, places: u32) -> f64
where
    I: IntoIterator<Item = &'a JsonValue>,
{
    let mut acc = RatingSum::default();
    for value in values {
        if let Some(n) = value.as_i64() {
            acc.push_int(n);
        } else if let Some(x) = value.as_f64() {
            acc.push_float(x);
        }
    }
    acc.average(places)
}

#[derive(Default)]
struct RatingSum {
    int_sum: i128,
    float_sum: f64,
    count: u64,
    fractional: bool,
}

impl RatingSum {
    fn push_int(&mut self, n: i64) {
        self.int_sum += n as i128;
        self.float_sum += n as f64;
        self.count += 1;
    }

    fn push_float(&mut self, x: f64) {
        self.float_sum += x;
        self.count += 1;
        self.fractional = true;
    }

    fn average(&self, places: u32) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        if self.fractional {
            let scale = 10f64.powi(places as i32);
            return (self.float_sum / self.count as f64 * scale).round() / scale;
        }
        // Integer sums are rounded exactly in hundredths so that e.g. 801/200 gives
        // 4.01 like the database does, not 4.0 from a float that is a hair below 4.005.
        let scale = 10i128.pow(places);
        let n = self.count as i128;
        let scaled = self.int_sum.abs() * scale;
        let rounded = (2 * scaled + n) / (2 * n);
        let signed = if self.int_sum < 0 { -rounded } else { rounded };
        signed as f64 / scale as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reviews(ratings: &[i64]) -> Vec<Review> {
        ratings
            .iter()
            .map(|r| Review::new("author".to_string(), *r, String::new()))
            .collect()
    }

    fn reference(ratings: &[i64]) -> f64 {
        let sum: i64 = ratings.iter().sum();
        (sum as f64 / ratings.len() as f64 * 100.0).round() / 100.0
    }

    #[test]
    fn empty_sequence_is_zero() {
        assert_eq!(reviews(&[]).average_rating(), 0.0);
    }

    #[test]
    fn matches_rounded_mean() {
        for ratings in [
            vec![5],
            vec![1, 2],
            vec![4, 4, 5],
            vec![1, 1, 2],
            vec![5, 4, 3, 2, 1],
            vec![3, 4, 4, 4, 5, 5, 2],
        ] {
            let got = reviews(&ratings).average_rating();
            assert!(
                (got - reference(&ratings)).abs() < 1e-9,
                "{:?}: got {} expected {}",
                ratings,
                got,
                reference(&ratings)
            );
        }
        assert_eq!(reviews(&[4, 4, 5]).average_rating(), 4.33);
        assert_eq!(reviews(&[4, 5, 5]).average_rating(), 4.67);
    }

    #[test]
    fn halves_round_away_from_zero() {
        // 801 / 200 = 4.005 exactly
        let mut ratings = vec![4; 199];
        ratings.push(5);
        assert_eq!(reviews(&ratings).average_rating(), 4.01);
        // 33 / 8 = 4.125
        assert_eq!(reviews(&[4, 4, 4, 4, 4, 4, 4, 5]).average_rating(), 4.13);
    }

    #[test]
    fn documents_without_reviews_field_count_as_empty() {
        let doc = json!({ "_id": "x", "name": "Fern Hollow" });
        assert_eq!(doc.as_object().unwrap().average_rating(), 0.0);

        let doc = json!({ "_id": "x", "reviews": null });
        assert_eq!(doc.as_object().unwrap().average_rating(), 0.0);
    }

    #[test]
    fn documents_ignore_non_numeric_ratings() {
        let doc = json!({
            "reviews": [
                { "rating": 5 },
                { "rating": "bad" },
                { "comment": "no rating" },
                { "rating": 4 }
            ]
        });
        assert_eq!(doc.as_object().unwrap().average_rating(), 4.5);
    }

    #[test]
    fn typed_and_raw_reviews_agree() {
        let typed = reviews(&[5, 3, 4, 4, 2, 5]);
        let raw = json!({ "reviews": serde_json::to_value(&typed).unwrap() });
        let a = typed.average_rating();
        let b = raw.as_object().unwrap().average_rating();
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn fractional_values_use_float_rounding() {
        let values = [json!(4.5), json!(3), json!(4.25)];
        assert_eq!(average_of_values(values.iter(), 2), 3.92);
    }
}
