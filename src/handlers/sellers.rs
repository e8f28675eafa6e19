use actix_web::{web, HttpResponse};
use mongodb::{bson::doc, options::FindOptions};
use serde_json::json;
use tracing::{debug, info};
use validator::Validate;

use crate::auth::Claims;
use crate::config::MongoConfig;
use crate::error::{success, success_with, ServiceError};
use crate::handlers::{check_id, collect};
use crate::models::{now_millis, SellerApplyRequest, SellerReviewRequest, SellerStatus};
use crate::notify::{seller_decision_email, Notifier};
use crate::sellers;

pub async fn apply(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    req: web::Json<SellerApplyRequest>,
) -> Result<HttpResponse, ServiceError> {
    req.validate()?;
    let user_id = claims.user_id();
    debug!("Seller application from {}", user_id);

    let existing = collect(db.seller_applications().find(doc! { "userId": user_id }, None).await?).await?;
    sellers::ensure_can_apply(&existing)?;

    let application = sellers::new_application(user_id, &req, now_millis());
    db.seller_applications().insert_one(&application, None).await?;

    info!("Seller application {} submitted by {}", application.id, user_id);
    Ok(success_with("Application submitted", json!({ "application": application })))
}

pub async fn my_applications(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ServiceError> {
    let options = FindOptions::builder().sort(doc! { "date": -1 }).build();
    let applications = collect(
        db.seller_applications()
            .find(doc! { "userId": claims.user_id() }, options)
            .await?,
    )
    .await?;
    Ok(success(json!({ "applications": applications })))
}

pub async fn all_applications(
    db: web::Data<MongoConfig>,
) -> Result<HttpResponse, ServiceError> {
    let options = FindOptions::builder().sort(doc! { "date": -1 }).build();
    let applications = collect(db.seller_applications().find(None, options).await?).await?;

    info!("Retrieved {} seller applications", applications.len());
    Ok(success(json!({ "applications": applications })))
}

pub async fn review(
    db: web::Data<MongoConfig>,
    notifier: web::Data<Notifier>,
    req: web::Json<SellerReviewRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Reviewing seller application {}: {:?}", req.application_id, req.decision);
    check_id(&req.application_id, "application")?;

    let mut application = db
        .seller_applications()
        .find_one(doc! { "_id": &req.application_id }, None)
        .await?
        .ok_or_else(|| ServiceError::not_found("Application"))?;

    sellers::decide(&mut application, req.decision, req.note.as_deref(), now_millis())?;

    let result = db
        .seller_applications()
        .update_one(
            doc! { "_id": &application.id, "status": SellerStatus::Pending.to_string() },
            doc! { "$set": {
                "status": application.status.to_string(),
                "adminNote": application.admin_note.as_deref(),
                "reviewedAt": application.reviewed_at,
            } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ServiceError::Policy("Application already reviewed".to_string()));
    }

    info!("Seller application {} {}", application.id, application.status);
    notifier.notify(seller_decision_email(&application));
    Ok(success_with(
        format!("Application {}", application.status),
        json!({ "application": application }),
    ))
}
