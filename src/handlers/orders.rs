use actix_web::{web, HttpResponse};
use mongodb::{bson::{doc, Document}, options::FindOptions};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::auth::Claims;
use crate::config::MongoConfig;
use crate::error::{success, success_message, success_with, ServiceError};
use crate::handlers::{check_id, clear_cart, collect, find_user};
use crate::models::{
    now_millis, DeliveryRequest, Order, OrderIdRequest, OrderStatus, PaymentMethod, PlaceOrderRequest,
    ReverseGeocodeQuery, UpdateStatusRequest, VerifyPaymentRequest,
};
use crate::notify::{order_status_email, Notifier};
use crate::orders;
use crate::payments::Payments;
use crate::shipping::{Coordinates, DeliveryEstimator};

/// Validates the checkout payload and snapshots the referenced products.
async fn build_order(
    db: &MongoConfig,
    user_id: &str,
    req: PlaceOrderRequest,
    payment_method: PaymentMethod,
) -> Result<Order, ServiceError> {
    req.validate()?;
    for item in &req.items {
        item.validate()?;
        check_id(&item.product_id, "product")?;
    }

    let ids: Vec<&str> = req.items.iter().map(|i| i.product_id.as_str()).collect();
    let products = collect(db.products().find(doc! { "_id": { "$in": ids } }, None).await?).await?;
    let catalog: HashMap<_, _> = products.into_iter().map(|p| (p.id.clone(), p)).collect();

    let items = orders::snapshot_line_items(&req.items, &catalog)?;
    orders::new_order(user_id, items, req.address, req.amount, payment_method, now_millis())
}

async fn find_order(db: &MongoConfig, order_id: &str) -> Result<Order, ServiceError> {
    check_id(order_id, "order")?;
    db.orders()
        .find_one(doc! { "_id": order_id }, None)
        .await?
        .ok_or_else(|| ServiceError::not_found("Order"))
}

async fn notify_owner(db: &MongoConfig, notifier: &Notifier, order: &Order) {
    match find_user(db, &order.user_id).await {
        Ok(user) => notifier.notify(order_status_email(&user.email, order)),
        Err(e) => warn!("No notification for order {}: {}", order.id, e),
    }
}

pub async fn place_order(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
    req: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = claims.user_id();
    debug!("COD checkout for {}", user_id);

    let order = build_order(&db, user_id, req.into_inner(), PaymentMethod::Cod).await?;
    db.orders().insert_one(&order, None).await?;
    clear_cart(&db, user_id).await?;

    info!("Order {} placed by {} (COD, {:.2})", order.id, user_id, order.amount);
    Ok(success_with("Order Placed", json!({ "orderId": order.id })))
}

pub async fn place_order_razorpay(
    db: web::Data<MongoConfig>,
    payments: web::Data<Payments>,
    claims: web::ReqData<Claims>,
    req: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user_id = claims.user_id();
    debug!("Online checkout for {}", user_id);

    let gateway = payments.gateway()?;
    let order = build_order(&db, user_id, req.into_inner(), PaymentMethod::Online).await?;
    db.orders().insert_one(&order, None).await?;

    let gateway_order = gateway
        .create_order(orders::minor_units(order.amount), payments.currency(), &order.id)
        .await?;

    info!("Order {} awaiting payment as {}", order.id, gateway_order.id);
    Ok(success(json!({ "order": gateway_order, "key": gateway.key_id() })))
}

pub async fn verify_razorpay(
    db: web::Data<MongoConfig>,
    payments: web::Data<Payments>,
    claims: web::ReqData<Claims>,
    req: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Verifying payment {} for {}", req.razorpay_payment_id, req.razorpay_order_id);

    let gateway = payments.gateway()?;
    if !gateway.verify(&req.razorpay_order_id, &req.razorpay_payment_id, &req.razorpay_signature) {
        warn!("Signature mismatch for gateway order {}", req.razorpay_order_id);
        return Err(ServiceError::PaymentFailed("Payment failed".to_string()));
    }

    let gateway_order = gateway.fetch_order(&req.razorpay_order_id).await?;
    if gateway_order.status != "paid" {
        warn!("Gateway order {} is {}", gateway_order.id, gateway_order.status);
        return Err(ServiceError::PaymentFailed("Payment failed".to_string()));
    }
    let receipt = gateway_order
        .receipt
        .ok_or_else(|| ServiceError::PaymentFailed("Payment failed".to_string()))?;

    let result = db
        .orders()
        .update_one(
            doc! { "_id": &receipt, "userId": claims.user_id() },
            doc! { "$set": { "payment": true, "paymentId": &req.razorpay_payment_id } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        error!("Paid gateway order {} has no matching order {}", gateway_order.id, receipt);
        return Err(ServiceError::PaymentFailed("Payment failed".to_string()));
    }

    clear_cart(&db, claims.user_id()).await?;

    info!("Order {} paid with {}", receipt, req.razorpay_payment_id);
    Ok(success_message("Payment Successful"))
}

pub async fn cancel_order(
    db: web::Data<MongoConfig>,
    notifier: web::Data<Notifier>,
    claims: web::ReqData<Claims>,
    req: web::Json<OrderIdRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Cancel request for {} by {}", req.order_id, claims.user_id());

    let mut order = find_order(&db, &req.order_id).await?;
    if order.user_id != claims.user_id() {
        return Err(ServiceError::not_found("Order"));
    }

    orders::cancel(&mut order, now_millis())?;

    // Guarded on the status just checked, in case an admin moved the order meanwhile.
    let result = db
        .orders()
        .update_one(
            doc! { "_id": &order.id, "status": OrderStatus::OrderPlaced.label() },
            doc! { "$set": {
                "status": order.status.label(),
                "statusDate": order.status_date,
                "cancelledBy": order.cancelled_by.as_deref().unwrap_or("User"),
            } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ServiceError::Policy(orders::NOT_CANCELLABLE.to_string()));
    }

    info!("Order {} cancelled by user", order.id);
    notify_owner(&db, &notifier, &order).await;
    Ok(success_message("Order cancelled"))
}

/// Matches the order only while it is still open; a cancellation that lands
/// after the read must not be overwritten.
fn status_update_filter(order_id: &str) -> Document {
    doc! { "_id": order_id, "status": { "$ne": OrderStatus::Cancelled.label() } }
}

pub async fn update_status(
    db: web::Data<MongoConfig>,
    notifier: web::Data<Notifier>,
    req: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, ServiceError> {
    debug!("Setting order {} to {}", req.order_id, req.status);

    let mut order = find_order(&db, &req.order_id).await?;
    orders::set_status(&mut order, req.status, now_millis())?;

    let result = db
        .orders()
        .update_one(
            status_update_filter(&order.id),
            doc! { "$set": { "status": order.status.label(), "statusDate": order.status_date } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        warn!("Order {} was cancelled before the status change landed", order.id);
        return Err(ServiceError::Policy(orders::CANCELLED_IS_FINAL.to_string()));
    }

    info!("Order {} is now {}", order.id, order.status);
    notify_owner(&db, &notifier, &order).await;
    Ok(success_message("Status Updated"))
}

pub async fn user_orders(
    db: web::Data<MongoConfig>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, ServiceError> {
    let options = FindOptions::builder().sort(doc! { "date": -1 }).build();
    let orders = collect(db.orders().find(doc! { "userId": claims.user_id() }, options).await?).await?;

    debug!("Retrieved {} orders for {}", orders.len(), claims.user_id());
    Ok(success(json!({ "orders": orders })))
}

pub async fn all_orders(
    db: web::Data<MongoConfig>,
) -> Result<HttpResponse, ServiceError> {
    let options = FindOptions::builder().sort(doc! { "date": -1 }).build();
    let orders = collect(db.orders().find(None, options).await?).await?;

    info!("Retrieved {} orders", orders.len());
    Ok(success(json!({ "orders": orders })))
}

pub async fn calculate_delivery(
    estimator: web::Data<DeliveryEstimator>,
    req: web::Json<DeliveryRequest>,
) -> Result<HttpResponse, ServiceError> {
    let quote = estimator.quote(&req).await?;

    debug!("Delivery quote: {:.1} km, fee {}", quote.distance, quote.fee);
    Ok(success(quote))
}

pub async fn reverse_geocode(
    estimator: web::Data<DeliveryEstimator>,
    query: web::Query<ReverseGeocodeQuery>,
) -> Result<HttpResponse, ServiceError> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lon) {
        return Err(ServiceError::Validation("Invalid coordinates".to_string()));
    }

    let address = estimator
        .describe(Coordinates { latitude: query.lat, longitude: query.lon })
        .await?;
    Ok(success(json!({ "address": address })))
}
