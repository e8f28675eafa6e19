use actix_web::{web, HttpResponse};
use mongodb::{bson::{doc, to_bson}, options::FindOptions};
use serde::Serialize;
use serde_json::json;
use tracing::{info, debug};
use validator::Validate;

use crate::auth::Claims;
use crate::config::MongoConfig;
use crate::error::{success, success_message, success_with, ServiceError};
use crate::handlers::{check_id, collect, find_product, find_user};
use crate::models::{
    new_id, now_millis, AddProductRequest, Product, ProductIdRequest, Review, ReviewRequest,
    UpdateProductRequest,
};
use crate::reviews::{self, ReviewOutcome};

pub async fn add_product(
    db: web::Data<MongoConfig>,
    product: web::Json<AddProductRequest>,
) -> Result<HttpResponse, ServiceError> {
    product.validate()?;
    let product = product.into_inner();

    debug!("Creating new product: {}", product.name);

    if let Some(size) = &product.default_size {
        if !product.sizes.is_empty() && !product.sizes.contains(size) {
            return Err(ServiceError::Validation("defaultSize must be one of sizes".to_string()));
        }
    }

    let new_product = Product {
        id: new_id(),
        name: product.name.trim().to_string(),
        description: product.description,
        price: product.price,
        size_prices: product.size_prices,
        image: product.image,
        category: product.category,
        sub_category: product.sub_category,
        sizes: product.sizes,
        default_size: product.default_size,
        bestseller: product.bestseller,
        date: now_millis(),
        rating: 0.0,
        reviews: Vec::new(),
        shipping_fee: product.shipping_fee,
    };

    db.products().insert_one(&new_product, None).await?;

    info!("Product created successfully with ID: {}", new_product.id);
    Ok(success_with("Product added", json!({ "product": new_product })))
}

pub async fn list_products(
    db: web::Data<MongoConfig>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Fetching products");

    let options = FindOptions::builder().sort(doc! { "date": -1 }).build();
    let products = collect(db.products().find(None, options).await?).await?;

    info!("Retrieved {} products", products.len());
    Ok(success(json!({ "products": products })))
}

pub async fn single_product(
    db: web::Data<MongoConfig>,
    req: web::Json<ProductIdRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Fetching product with ID: {}", req.product_id);

    let product = find_product(&db, &req.product_id).await?;
    Ok(success(json!({ "product": product })))
}

pub async fn update_product(
    db: web::Data<MongoConfig>,
    update: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Updating product {}: {:?}", update.product_id, update);
    check_id(&update.product_id, "product")?;

    let mut update_doc = doc! {};

    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("name is required".to_string()));
        }
        update_doc.insert("name", name.trim());
    }
    if let Some(description) = &update.description {
        update_doc.insert("description", description);
    }
    if let Some(price) = update.price {
        if !price.is_finite() || price < 0.0 {
            return Err(ServiceError::Validation("price must not be negative".to_string()));
        }
        update_doc.insert("price", price);
    }
    if let Some(size_prices) = &update.size_prices {
        update_doc.insert("sizePrices", to_bson(size_prices)?);
    }
    if let Some(image) = &update.image {
        update_doc.insert("image", image.clone());
    }
    if let Some(category) = &update.category {
        update_doc.insert("category", category);
    }
    if let Some(sub_category) = &update.sub_category {
        update_doc.insert("subCategory", sub_category);
    }
    if let Some(sizes) = &update.sizes {
        update_doc.insert("sizes", sizes.clone());
    }
    if let Some(default_size) = &update.default_size {
        update_doc.insert("defaultSize", default_size);
    }
    if let Some(bestseller) = update.bestseller {
        update_doc.insert("bestseller", bestseller);
    }
    if let Some(shipping_fee) = update.shipping_fee {
        update_doc.insert("shippingFee", shipping_fee);
    }

    if update_doc.is_empty() {
        return Err(ServiceError::Validation("Nothing to update".to_string()));
    }

    let filter = doc! { "_id": &update.product_id };
    let result = db.products().update_one(filter, doc! { "$set": update_doc }, None).await?;

    if result.matched_count == 0 {
        debug!("Product not found for update: {}", update.product_id);
        return Err(ServiceError::not_found("Product"));
    }

    info!("Product updated successfully: {}", update.product_id);
    Ok(success_message("Product updated"))
}

pub async fn remove_product(
    db: web::Data<MongoConfig>,
    req: web::Json<ProductIdRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Deleting product: {}", req.product_id);
    check_id(&req.product_id, "product")?;

    let result = db.products().delete_one(doc! { "_id": &req.product_id }, None).await?;

    if result.deleted_count == 0 {
        debug!("Product not found for deletion: {}", req.product_id);
        return Err(ServiceError::not_found("Product"));
    }

    info!("Product deleted successfully: {}", req.product_id);
    Ok(success_message("Product removed"))
}

pub async fn submit_review(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    review: web::Json<ReviewRequest>,
) -> Result<HttpResponse, ServiceError> {
    review.validate()?;
    let user_id = claims.user_id();

    debug!("Review from {} for product {}", user_id, review.product_id);

    find_user(&db, user_id).await?;
    let mut product = find_product(&db, &review.product_id).await?;

    let outcome = reviews::submit(&mut product, user_id, &review, now_millis())?;

    db.products()
        .update_one(
            doc! { "_id": &product.id },
            doc! { "$set": { "reviews": to_bson(&product.reviews)?, "rating": product.rating } },
            None,
        )
        .await?;

    info!("Review {:?} on {} (rating now {:.2})", outcome, product.id, product.rating);
    let message = match outcome {
        ReviewOutcome::Created => "Review submitted",
        ReviewOutcome::Updated => "Review updated",
    };
    Ok(success_with(message, json!({ "rating": product.rating, "reviewCount": product.reviews.len() })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserReview {
    product_id: String,
    product_name: String,
    product_image: Option<String>,
    #[serde(flatten)]
    review: Review,
}

pub async fn user_reviews(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = claims.user_id();
    debug!("Fetching reviews written by {}", user_id);

    let products = collect(db.products().find(doc! { "reviews.userId": user_id }, None).await?).await?;

    let reviews: Vec<UserReview> = products
        .into_iter()
        .flat_map(|product| {
            let Product { id, name, image, reviews, .. } = product;
            let image = image.into_iter().next();
            reviews
                .into_iter()
                .filter(|r| r.user_id == user_id)
                .map(move |review| UserReview {
                    product_id: id.clone(),
                    product_name: name.clone(),
                    product_image: image.clone(),
                    review,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(success(json!({ "reviews": reviews })))
}
