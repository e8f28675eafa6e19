use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::Cursor;
use serde::de::DeserializeOwned;

use crate::config::MongoConfig;
use crate::error::ServiceError;
use crate::models::{Product, User};

pub mod custom_orders;
pub mod festival;
pub mod orders;
pub mod products;
pub mod sellers;
pub mod users;

/// Ids are ObjectId hex strings; anything else is rejected before touching the store.
pub(crate) fn check_id(id: &str, entity: &str) -> Result<(), ServiceError> {
    ObjectId::parse_str(id)
        .map(|_| ())
        .map_err(|_| ServiceError::Validation(format!("Invalid {} id", entity)))
}

pub(crate) async fn find_user(db: &MongoConfig, user_id: &str) -> Result<User, ServiceError> {
    db.users()
        .find_one(doc! { "_id": user_id }, None)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))
}

pub(crate) async fn find_product(db: &MongoConfig, product_id: &str) -> Result<Product, ServiceError> {
    check_id(product_id, "product")?;
    db.products()
        .find_one(doc! { "_id": product_id }, None)
        .await?
        .ok_or_else(|| ServiceError::not_found("Product"))
}

pub(crate) async fn collect<T>(mut cursor: Cursor<T>) -> Result<Vec<T>, ServiceError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(item) = cursor.try_next().await? {
        items.push(item);
    }
    Ok(items)
}

/// Cart and wishlist live in the user document and are written in one update.
pub(crate) async fn save_cart_and_wishlist(db: &MongoConfig, user: &User) -> Result<(), ServiceError> {
    let result = db
        .users()
        .update_one(
            doc! { "_id": &user.id },
            doc! { "$set": {
                "cartData": to_bson(&user.cart_data)?,
                "wishlist": to_bson(&user.wishlist)?,
            } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ServiceError::not_found("User"));
    }
    Ok(())
}

pub(crate) async fn clear_cart(db: &MongoConfig, user_id: &str) -> Result<(), ServiceError> {
    db.users()
        .update_one(doc! { "_id": user_id }, doc! { "$set": { "cartData": {} } }, None)
        .await?;
    Ok(())
}
