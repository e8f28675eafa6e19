//! Wishlist and the restock request workflow.
//!
//! Per item: `none → pending → {message_received | accepted}`, where
//! `message_received` may repeat or move on to `accepted`. All mutations touch
//! only the user document, so cart and wishlist changes are persisted together.

use crate::cart;
use crate::error::ServiceError;
use crate::models::{Product, RequestStatus, User, WishlistItem};

pub const FALLBACK_SIZE: &str = "Free Size";
pub const ACCEPTED_MESSAGE: &str =
    "Good news! Your requested product is available and has been added to your cart.";

pub fn snapshot(product: &Product, now: i64) -> WishlistItem {
    WishlistItem {
        product_id: product.id.clone(),
        name: product.name.clone(),
        price: product.price,
        image: product.image.first().cloned(),
        description: product.description.clone(),
        added_at: now,
        request_status: RequestStatus::None,
        admin_message: None,
        requested_at: None,
    }
}

pub fn add(user: &mut User, product: &Product, now: i64) -> Result<(), ServiceError> {
    if user.wishlist.iter().any(|item| item.product_id == product.id) {
        return Err(ServiceError::Policy("Product already in wishlist".to_string()));
    }
    user.wishlist.push(snapshot(product, now));
    Ok(())
}

pub fn remove(user: &mut User, product_id: &str) -> Result<(), ServiceError> {
    let before = user.wishlist.len();
    user.wishlist.retain(|item| item.product_id != product_id);
    if user.wishlist.len() == before {
        return Err(ServiceError::not_found("Wishlist item"));
    }
    Ok(())
}

fn item_mut<'a>(user: &'a mut User, product_id: &str) -> Result<&'a mut WishlistItem, ServiceError> {
    user.wishlist
        .iter_mut()
        .find(|item| item.product_id == product_id)
        .ok_or_else(|| ServiceError::not_found("Wishlist item"))
}

/// Re-requesting an already pending item just refreshes the timestamp.
/// An accepted request is closed.
pub fn request(user: &mut User, product_id: &str, now: i64) -> Result<(), ServiceError> {
    let item = item_mut(user, product_id)?;
    if item.request_status == RequestStatus::Accepted {
        return Err(ServiceError::Policy("Request already accepted".to_string()));
    }
    item.request_status = RequestStatus::Pending;
    item.requested_at = Some(now);
    Ok(())
}

fn requested_item<'a>(user: &'a mut User, product_id: &str) -> Result<&'a mut WishlistItem, ServiceError> {
    let item = item_mut(user, product_id)?;
    match item.request_status {
        RequestStatus::Pending | RequestStatus::MessageReceived => Ok(item),
        RequestStatus::None => Err(ServiceError::Policy("No request found for this product".to_string())),
        RequestStatus::Accepted => Err(ServiceError::Policy("Request already accepted".to_string())),
    }
}

pub fn post_message(user: &mut User, product_id: &str, message: &str) -> Result<(), ServiceError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ServiceError::Validation("message is required".to_string()));
    }
    let item = requested_item(user, product_id)?;
    item.admin_message = Some(message.to_string());
    item.request_status = RequestStatus::MessageReceived;
    Ok(())
}

pub fn default_size(product: &Product) -> String {
    product
        .default_size
        .clone()
        .filter(|size| !size.is_empty())
        .or_else(|| product.sizes.first().cloned())
        .unwrap_or_else(|| FALLBACK_SIZE.to_string())
}

/// Moves one unit of the product into the cart and closes the request.
/// Returns the size that was added.
pub fn accept(user: &mut User, product: &Product) -> Result<String, ServiceError> {
    let size = default_size(product);
    {
        let item = requested_item(user, &product.id)?;
        item.request_status = RequestStatus::Accepted;
        item.admin_message = Some(ACCEPTED_MESSAGE.to_string());
    }
    cart::increment(&mut user.cart_data, &product.id, &size);
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cart, Role};
    use std::collections::HashMap;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password: "hash".to_string(),
            phone: None,
            image: None,
            address: None,
            addresses: Vec::new(),
            cart_data: Cart::new(),
            wishlist: Vec::new(),
            role: Role::User,
        }
    }

    fn product(id: &str, sizes: &[&str], default_size: Option<&str>) -> Product {
        Product {
            id: id.to_string(),
            name: "Crochet Tote".to_string(),
            description: "Hand made".to_string(),
            price: 899.0,
            size_prices: HashMap::new(),
            image: vec!["https://cdn.example/tote.jpg".to_string()],
            category: "Bags".to_string(),
            sub_category: String::new(),
            sizes: sizes.iter().map(|s| s.to_string()).collect(),
            default_size: default_size.map(str::to_string),
            bestseller: false,
            date: 0,
            rating: 0.0,
            reviews: Vec::new(),
            shipping_fee: None,
        }
    }

    #[test]
    fn duplicate_add_is_rejected_and_length_unchanged() {
        let mut user = user();
        let p = product("p1", &["M"], None);
        add(&mut user, &p, 10).unwrap();

        let err = add(&mut user, &p, 20).unwrap_err();
        assert_eq!(err.to_string(), "Product already in wishlist");
        assert_eq!(user.wishlist.len(), 1);
        assert_eq!(user.wishlist[0].added_at, 10);
    }

    #[test]
    fn snapshot_keeps_add_time_price() {
        let mut user = user();
        let mut p = product("p1", &["M"], None);
        add(&mut user, &p, 10).unwrap();
        p.price = 1.0;

        assert_eq!(user.wishlist[0].price, 899.0);
        assert_eq!(user.wishlist[0].request_status, RequestStatus::None);
    }

    #[test]
    fn request_requires_item() {
        let mut user = user();
        assert!(matches!(request(&mut user, "nope", 1), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn re_request_restamps_time() {
        let mut user = user();
        add(&mut user, &product("p1", &[], None), 1).unwrap();
        request(&mut user, "p1", 5).unwrap();
        request(&mut user, "p1", 9).unwrap();

        assert_eq!(user.wishlist[0].request_status, RequestStatus::Pending);
        assert_eq!(user.wishlist[0].requested_at, Some(9));
    }

    #[test]
    fn messages_can_repeat_then_accept() {
        let mut user = user();
        let p = product("p1", &["S", "M"], None);
        add(&mut user, &p, 1).unwrap();
        request(&mut user, "p1", 2).unwrap();

        post_message(&mut user, "p1", "Back in two weeks").unwrap();
        post_message(&mut user, "p1", "Next Monday").unwrap();
        assert_eq!(user.wishlist[0].request_status, RequestStatus::MessageReceived);
        assert_eq!(user.wishlist[0].admin_message.as_deref(), Some("Next Monday"));

        accept(&mut user, &p).unwrap();
        assert_eq!(user.wishlist[0].request_status, RequestStatus::Accepted);
    }

    #[test]
    fn admin_actions_need_an_open_request() {
        let mut user = user();
        let p = product("p1", &[], None);
        add(&mut user, &p, 1).unwrap();

        assert!(post_message(&mut user, "p1", "hello").is_err());
        assert!(accept(&mut user, &p).is_err());
        assert!(user.cart_data.is_empty());
    }

    #[test]
    fn accept_increments_cart_by_exactly_one() {
        let mut user = user();
        let p = product("p1", &["S", "M"], Some("M"));
        user.cart_data.insert("p1".to_string(), HashMap::from([("M".to_string(), 2)]));
        add(&mut user, &p, 1).unwrap();
        request(&mut user, "p1", 2).unwrap();

        let size = accept(&mut user, &p).unwrap();

        assert_eq!(size, "M");
        assert_eq!(user.cart_data["p1"]["M"], 3);
        assert_eq!(user.wishlist[0].admin_message.as_deref(), Some(ACCEPTED_MESSAGE));
        assert!(accept(&mut user, &p).is_err());
        assert_eq!(user.cart_data["p1"]["M"], 3);
    }

    #[test]
    fn accepted_request_cannot_be_reopened() {
        let mut user = user();
        let p = product("p1", &["M"], None);
        add(&mut user, &p, 1).unwrap();
        request(&mut user, "p1", 2).unwrap();
        accept(&mut user, &p).unwrap();

        let err = request(&mut user, "p1", 3).unwrap_err();
        assert_eq!(err.to_string(), "Request already accepted");
        assert_eq!(user.wishlist[0].request_status, RequestStatus::Accepted);
        assert_eq!(user.wishlist[0].requested_at, Some(2));
        assert!(accept(&mut user, &p).is_err());
        assert_eq!(user.cart_data["p1"]["M"], 1);
    }

    #[test]
    fn default_size_precedence() {
        assert_eq!(default_size(&product("p", &["S", "M"], Some("M"))), "M");
        assert_eq!(default_size(&product("p", &["S", "M"], None)), "S");
        assert_eq!(default_size(&product("p", &[], None)), FALLBACK_SIZE);
    }

    #[test]
    fn remove_missing_item_fails() {
        let mut user = user();
        add(&mut user, &product("p1", &[], None), 1).unwrap();
        remove(&mut user, "p1").unwrap();
        assert!(remove(&mut user, "p1").is_err());
    }
}
