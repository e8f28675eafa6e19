use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::auth::Claims;
use crate::config::MongoConfig;
use crate::custom_orders::CustomOrderForm;
use crate::error::{success, success_message, success_with, ServiceError};
use crate::handlers::{check_id, collect};
use crate::models::{now_millis, CustomOrderStatusRequest};
use crate::uploads::{content_type, ImageStore, MAX_IMAGE_BYTES};

const MAX_TEXT_FIELD_BYTES: usize = 8 * 1024;

fn multipart_error(e: actix_multipart::MultipartError) -> ServiceError {
    debug!("Malformed multipart body: {}", e);
    ServiceError::Validation("Malformed form data".to_string())
}

pub async fn create_custom_order(
    db: web::Data<MongoConfig>,
    store: web::Data<ImageStore>,
    claims: web::ReqData<Claims>,
    mut payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let (name, filename) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().unwrap_or_default().to_string(),
                disposition.get_filename().map(str::to_string),
            )
        };
        let limit = if filename.is_some() { MAX_IMAGE_BYTES } else { MAX_TEXT_FIELD_BYTES };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > limit {
                return Err(ServiceError::Validation(format!("{} is too large", name)));
            }
            bytes.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) if name == "image" => image = Some((filename, bytes)),
            Some(_) => debug!("Ignoring unexpected file field {}", name),
            None => {
                fields.insert(name, String::from_utf8_lossy(&bytes).into_owned());
            }
        }
    }

    let form = CustomOrderForm::from_fields(&fields)?;
    let (filename, bytes) = image.ok_or_else(|| ServiceError::Validation("image is required".to_string()))?;
    let image_url = store.save(&filename, &bytes).await?;

    let order = form.into_order(claims.user_id(), image_url, now_millis());
    db.custom_orders().insert_one(&order, None).await?;

    info!("Custom order {} created by {}", order.id, order.user_id);
    Ok(success_with("Custom order submitted", json!({ "customOrder": order })))
}

pub async fn my_custom_orders(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ServiceError> {
    let options = FindOptions::builder().sort(doc! { "date": -1 }).build();
    let orders = collect(db.custom_orders().find(doc! { "userId": claims.user_id() }, options).await?).await?;
    Ok(success(json!({ "customOrders": orders })))
}

pub async fn all_custom_orders(
    db: web::Data<MongoConfig>,
) -> Result<HttpResponse, ServiceError> {
    let options = FindOptions::builder().sort(doc! { "date": -1 }).build();
    let orders = collect(db.custom_orders().find(None, options).await?).await?;

    info!("Retrieved {} custom orders", orders.len());
    Ok(success(json!({ "customOrders": orders })))
}

pub async fn update_custom_order_status(
    db: web::Data<MongoConfig>,
    req: web::Json<CustomOrderStatusRequest>,
) -> Result<HttpResponse, ServiceError> {
    check_id(&req.custom_order_id, "custom order")?;
    let status = req.status.trim();
    if status.is_empty() {
        return Err(ServiceError::Validation("status is required".to_string()));
    }

    let result = db
        .custom_orders()
        .update_one(doc! { "_id": &req.custom_order_id }, doc! { "$set": { "status": status } }, None)
        .await?;

    if result.matched_count == 0 {
        return Err(ServiceError::not_found("Custom order"));
    }

    info!("Custom order {} is now {}", req.custom_order_id, status);
    Ok(success_message("Status Updated"))
}

pub async fn serve_upload(
    store: web::Data<ImageStore>,
    name: web::Path<String>,
) -> HttpResponse {
    match store.load(&name).await {
        Some(bytes) => HttpResponse::Ok().content_type(content_type(&name)).body(bytes),
        None => HttpResponse::NotFound().finish(),
    }
}
