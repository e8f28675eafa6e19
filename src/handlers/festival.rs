use actix_web::{web, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::error::{success, success_with, ServiceError};
use crate::festival::FestivalStore;
use crate::models::{now_millis, FestivalUpdateRequest};

pub async fn get_festival(
    store: web::Data<FestivalStore>,
) -> Result<HttpResponse, ServiceError> {
    let festival = store.get_or_create().await?;
    Ok(success(json!({ "festival": festival })))
}

pub async fn update_festival(
    store: web::Data<FestivalStore>,
    update: web::Json<FestivalUpdateRequest>,
) -> Result<HttpResponse, ServiceError> {
    update.validate()?;
    let festival = store.update(&update, now_millis()).await?;
    Ok(success_with("Festival settings saved", json!({ "festival": festival })))
}
