// service/rating_aggregator.rs
use crate::models::usermodel::Rating;

/// Fold one review score into a running rating.
/// `avg' = (avg * count + rating) / (count + 1)`, `count' = count + 1`.
pub fn update_rating(current: Rating, rating: i32) -> Rating {
    let count = current.count + 1;
    let avg = (current.avg * f64::from(current.count) + f64::from(rating)) / f64::from(count);

    Rating { avg, count }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_review_sets_average() {
        let rating = update_rating(Rating::default(), 4);
        assert_eq!(rating, Rating { avg: 4.0, count: 1 });
    }

    #[test]
    fn test_running_mean() {
        let rating = update_rating(Rating { avg: 4.5, count: 10 }, 5);
        assert_eq!(rating.count, 11);
        assert!((rating.avg - 50.0 / 11.0).abs() < 1e-12);
        assert!((rating.avg - 4.545).abs() < 1e-3);
    }

    #[test]
    fn test_sequence_matches_plain_mean() {
        let scores = [5, 3, 4, 1, 2, 5];
        let rating = scores
            .iter()
            .fold(Rating::default(), |acc, &s| update_rating(acc, s));

        let mean = scores.iter().sum::<i32>() as f64 / scores.len() as f64;
        assert_eq!(rating.count, scores.len() as i32);
        assert!((rating.avg - mean).abs() < 1e-9);
    }
}
