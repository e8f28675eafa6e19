use actix_web::{web, HttpResponse};
use mongodb::bson::{doc, from_document, to_bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use validator::Validate;

use crate::auth::Claims;
use crate::cart;
use crate::config::MongoConfig;
use crate::error::{success, success_message, success_with, ServiceError};
use crate::handlers::{check_id, collect, find_product, find_user, save_cart_and_wishlist};
use crate::models::{
    now_millis, Address, CartAddRequest, CartUpdateRequest, ProductIdRequest, RequestAction,
    RequestHandleRequest, UserProfile, WishlistItem,
};
use crate::notify::{request_accepted_email, request_message_email, Notifier};
use crate::wishlist;

pub async fn profile(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ServiceError> {
    let user = find_user(&db, claims.user_id()).await?;
    Ok(success(json!({ "user": UserProfile::from(user) })))
}

/// The first saved address becomes the primary one.
pub async fn add_address(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    address: web::Json<Address>,
) -> Result<HttpResponse, ServiceError> {
    address.validate()?;
    let user = find_user(&db, claims.user_id()).await?;
    let address = to_bson(&address.into_inner())?;

    let update = if user.address.is_none() {
        doc! { "$set": { "address": address } }
    } else {
        doc! { "$push": { "addresses": address } }
    };
    db.users().update_one(doc! { "_id": &user.id }, update, None).await?;

    info!("Address saved for user {}", user.id);
    Ok(success_message("Address saved"))
}

// ---- cart ----

pub async fn get_cart(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ServiceError> {
    let user = find_user(&db, claims.user_id()).await?;
    Ok(success(json!({ "cartData": user.cart_data })))
}

pub async fn add_to_cart(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    req: web::Json<CartAddRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Adding {} ({}) to cart of {}", req.product_id, req.size, claims.user_id());

    let product = find_product(&db, &req.product_id).await?;
    if !product.offers_size(&req.size) {
        return Err(ServiceError::Validation(format!("Size {} is not available", req.size)));
    }

    let mut user = find_user(&db, claims.user_id()).await?;
    cart::increment(&mut user.cart_data, &product.id, &req.size);
    save_cart_and_wishlist(&db, &user).await?;

    Ok(success_message("Added to cart"))
}

pub async fn update_cart(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    req: web::Json<CartUpdateRequest>,
) -> Result<HttpResponse, ServiceError> {
    check_id(&req.product_id, "product")?;

    let mut user = find_user(&db, claims.user_id()).await?;
    cart::set_quantity(&mut user.cart_data, &req.product_id, &req.size, req.quantity);
    save_cart_and_wishlist(&db, &user).await?;

    Ok(success_with("Cart updated", json!({ "cartData": user.cart_data })))
}

// ---- wishlist ----

pub async fn get_wishlist(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ServiceError> {
    let user = find_user(&db, claims.user_id()).await?;
    Ok(success(json!({ "wishlist": user.wishlist })))
}

pub async fn add_to_wishlist(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    req: web::Json<ProductIdRequest>,
) -> Result<HttpResponse, ServiceError> {
    let product = find_product(&db, &req.product_id).await?;
    let mut user = find_user(&db, claims.user_id()).await?;

    wishlist::add(&mut user, &product, now_millis())?;
    save_cart_and_wishlist(&db, &user).await?;

    info!("User {} wishlisted {}", user.id, product.id);
    Ok(success_message("Added to wishlist"))
}

pub async fn remove_from_wishlist(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    req: web::Json<ProductIdRequest>,
) -> Result<HttpResponse, ServiceError> {
    let mut user = find_user(&db, claims.user_id()).await?;

    wishlist::remove(&mut user, &req.product_id)?;
    save_cart_and_wishlist(&db, &user).await?;

    Ok(success_message("Removed from wishlist"))
}

pub async fn request_product(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    req: web::Json<ProductIdRequest>,
) -> Result<HttpResponse, ServiceError> {
    let mut user = find_user(&db, claims.user_id()).await?;

    wishlist::request(&mut user, &req.product_id, now_millis())?;
    save_cart_and_wishlist(&db, &user).await?;

    info!("User {} requested {}", user.id, req.product_id);
    Ok(success_message("Request sent"))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveProduct {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    price: f64,
    #[serde(default)]
    image: Vec<String>,
    #[serde(default)]
    sizes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestRow {
    user_id: String,
    user_name: String,
    user_email: String,
    item: WishlistItem,
    #[serde(default)]
    product: Option<LiveProduct>,
}

/// Every open or answered request across all users, joined to the current
/// catalog entry. `product` is absent when the product has since been removed.
fn requests_pipeline() -> Vec<Document> {
    vec![
        doc! { "$unwind": "$wishlist" },
        doc! { "$match": { "wishlist.requestStatus": { "$in": ["pending", "message_received", "accepted"] } } },
        doc! { "$lookup": {
            "from": "products",
            "localField": "wishlist.productId",
            "foreignField": "_id",
            "as": "product",
        } },
        doc! { "$unwind": { "path": "$product", "preserveNullAndEmptyArrays": true } },
        doc! { "$sort": { "wishlist.requestedAt": -1 } },
        doc! { "$project": {
            "_id": 0,
            "userId": "$_id",
            "userName": "$name",
            "userEmail": "$email",
            "item": "$wishlist",
            "product": 1,
        } },
    ]
}

pub async fn admin_requests(
    db: web::Data<MongoConfig>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Fetching wishlist requests");

    let documents = collect(db.users().aggregate(requests_pipeline(), None).await?).await?;
    let requests = documents
        .into_iter()
        .map(from_document::<RequestRow>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServiceError::Internal(format!("malformed request row: {}", e)))?;

    info!("Retrieved {} wishlist requests", requests.len());
    Ok(success(json!({ "requests": requests })))
}

pub async fn handle_request(
    db: web::Data<MongoConfig>,
    notifier: web::Data<Notifier>,
    req: web::Json<RequestHandleRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Handling {:?} for {} / {}", req.action, req.user_id, req.product_id);
    check_id(&req.user_id, "user")?;

    let mut user = find_user(&db, &req.user_id).await?;

    let email = match req.action {
        RequestAction::Message => {
            let message = req.message.clone().unwrap_or_default();
            wishlist::post_message(&mut user, &req.product_id, &message)?;
            save_cart_and_wishlist(&db, &user).await?;
            item(&user.wishlist, &req.product_id).map(|i| request_message_email(&user.email, i, message.trim()))
        }
        RequestAction::Accept => {
            let product = find_product(&db, &req.product_id).await?;
            let size = wishlist::accept(&mut user, &product)?;
            save_cart_and_wishlist(&db, &user).await?;
            item(&user.wishlist, &req.product_id).map(|i| request_accepted_email(&user.email, i, &size))
        }
    };

    info!("Request {} / {} now {:?}", user.id, req.product_id, req.action);
    if let Some(email) = email {
        notifier.notify(email);
    }

    let message = match req.action {
        RequestAction::Message => "Message sent",
        RequestAction::Accept => "Request accepted and added to cart",
    };
    Ok(success_message(message))
}

fn item<'a>(items: &'a [WishlistItem], product_id: &str) -> Option<&'a WishlistItem> {
    items.iter().find(|i| i.product_id == product_id)
}
