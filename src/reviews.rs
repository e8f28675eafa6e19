use crate::error::ServiceError;
use crate::models::{Product, Review, ReviewRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Created,
    Updated,
}

pub fn mean_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>() / reviews.len() as f64
}

/// A review is keyed by (user, order): resubmitting for the same order
/// overwrites in place. The product rating is recomputed over all reviews.
pub fn submit(
    product: &mut Product,
    user_id: &str,
    request: &ReviewRequest,
    now: i64,
) -> Result<ReviewOutcome, ServiceError> {
    if !(1..=5).contains(&request.rating) {
        return Err(ServiceError::Validation("rating must be between 1 and 5".to_string()));
    }

    let existing = request.order_id.as_ref().and_then(|order_id| {
        product
            .reviews
            .iter_mut()
            .find(|r| r.user_id == user_id && r.order_id.as_ref() == Some(order_id))
    });

    let outcome = match existing {
        Some(review) => {
            review.rating = request.rating;
            review.comment = request.comment.clone();
            review.purchase_date = request.purchase_date.or(review.purchase_date);
            review.date = now;
            ReviewOutcome::Updated
        }
        None => {
            product.reviews.push(Review {
                user_id: user_id.to_string(),
                order_id: request.order_id.clone(),
                purchase_date: request.purchase_date,
                rating: request.rating,
                comment: request.comment.clone(),
                date: now,
            });
            ReviewOutcome::Created
        }
    };

    product.rating = mean_rating(&product.reviews);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn product() -> Product {
        Product {
            id: "p1".to_string(),
            name: "Amigurumi Bear".to_string(),
            description: String::new(),
            price: 450.0,
            size_prices: HashMap::new(),
            image: Vec::new(),
            category: "Toys".to_string(),
            sub_category: String::new(),
            sizes: Vec::new(),
            default_size: None,
            bestseller: false,
            date: 0,
            rating: 0.0,
            reviews: Vec::new(),
            shipping_fee: None,
        }
    }

    fn request(order_id: Option<&str>, rating: u8, comment: &str) -> ReviewRequest {
        ReviewRequest {
            product_id: "p1".to_string(),
            order_id: order_id.map(str::to_string),
            purchase_date: Some(100),
            rating,
            comment: comment.to_string(),
        }
    }

    #[test]
    fn no_reviews_means_zero_rating() {
        assert_eq!(mean_rating(&[]), 0.0);
    }

    #[test]
    fn same_order_overwrites() {
        let mut p = product();
        assert_eq!(submit(&mut p, "u1", &request(Some("o1"), 2, "meh"), 1).unwrap(), ReviewOutcome::Created);
        assert_eq!(submit(&mut p, "u1", &request(Some("o1"), 5, "love it"), 2).unwrap(), ReviewOutcome::Updated);

        assert_eq!(p.reviews.len(), 1);
        assert_eq!(p.reviews[0].rating, 5);
        assert_eq!(p.reviews[0].comment, "love it");
        assert_eq!(p.rating, 5.0);
    }

    #[test]
    fn other_user_same_order_appends() {
        let mut p = product();
        submit(&mut p, "u1", &request(Some("o1"), 4, ""), 1).unwrap();
        submit(&mut p, "u2", &request(Some("o1"), 2, ""), 1).unwrap();

        assert_eq!(p.reviews.len(), 2);
        assert_eq!(p.rating, 3.0);
    }

    #[test]
    fn reviews_without_order_always_append() {
        let mut p = product();
        submit(&mut p, "u1", &request(None, 4, ""), 1).unwrap();
        submit(&mut p, "u1", &request(None, 5, ""), 2).unwrap();
        assert_eq!(p.reviews.len(), 2);
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        let mut p = product();
        assert!(submit(&mut p, "u1", &request(None, 0, ""), 1).is_err());
        assert!(submit(&mut p, "u1", &request(None, 6, ""), 1).is_err());
        assert!(p.reviews.is_empty());
    }

    proptest! {
        #[test]
        fn rating_is_mean_and_count_never_drops(
            submissions in prop::collection::vec((0usize..4, 0usize..3, 1u8..=5), 1..40)
        ) {
            let mut p = product();
            let mut previous_len = 0;
            for (user, order, rating) in submissions {
                let req = request(Some(&format!("o{}", order)), rating, "");
                submit(&mut p, &format!("u{}", user), &req, 0).unwrap();

                prop_assert!(p.reviews.len() >= previous_len);
                previous_len = p.reviews.len();

                let expected = p.reviews.iter().map(|r| r.rating as f64).sum::<f64>() / p.reviews.len() as f64;
                prop_assert!((p.rating - expected).abs() < 1e-9);
            }
        }
    }
}
