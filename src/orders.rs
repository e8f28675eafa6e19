//! Order lifecycle: checkout snapshots, admin status changes, user cancellation.
//!
//! Forward path is `Order Placed → Packing → Shipped → Out for delivery → Delivered`.
//! `Cancelled` is reachable only from `Order Placed`, only by the owning user,
//! and only inside [`CANCELLATION_WINDOW_MS`] of the order being created.

use std::collections::HashMap;

use crate::error::ServiceError;
use crate::models::{
    new_id, Address, LineItem, Order, OrderItemRequest, OrderStatus, PaymentMethod, Product,
};

/// Five hours, in milliseconds.
pub const CANCELLATION_WINDOW_MS: i64 = 5 * 60 * 60 * 1000;

pub const NOT_CANCELLABLE: &str = "Order cannot be cancelled at this stage";
pub const WINDOW_EXPIRED: &str = "Cancellation period has expired";
pub const CANCELLED_IS_FINAL: &str = "Cancelled orders cannot be updated";

/// Copies catalog data into immutable line items. Every requested product must
/// exist and offer the requested size.
pub fn snapshot_line_items(
    requested: &[OrderItemRequest],
    catalog: &HashMap<String, Product>,
) -> Result<Vec<LineItem>, ServiceError> {
    if requested.is_empty() {
        return Err(ServiceError::Validation("items must contain at least one item".to_string()));
    }

    requested
        .iter()
        .map(|item| {
            if item.quantity < 1 {
                return Err(ServiceError::Validation("quantity must be at least 1".to_string()));
            }
            let product = catalog
                .get(&item.product_id)
                .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", item.product_id)))?;
            if !product.offers_size(&item.size) {
                return Err(ServiceError::Validation(format!(
                    "Size {} is not available for {}",
                    item.size, product.name
                )));
            }
            Ok(LineItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                price: product.price_for_size(&item.size),
                image: product.image.first().cloned(),
                size: item.size.clone(),
                quantity: item.quantity,
                shipping_fee: product.shipping_fee,
            })
        })
        .collect()
}

/// The amount is taken as computed by the client; it is only sanity-checked.
pub fn new_order(
    user_id: &str,
    items: Vec<LineItem>,
    address: Address,
    amount: f64,
    payment_method: PaymentMethod,
    now: i64,
) -> Result<Order, ServiceError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ServiceError::Validation("amount must not be negative".to_string()));
    }

    Ok(Order {
        id: new_id(),
        user_id: user_id.to_string(),
        items,
        address,
        amount,
        payment_method,
        payment: false,
        payment_id: None,
        status: OrderStatus::OrderPlaced,
        date: now,
        status_date: now,
        cancelled_by: None,
    })
}

pub fn cancel(order: &mut Order, now: i64) -> Result<(), ServiceError> {
    if order.status != OrderStatus::OrderPlaced {
        return Err(ServiceError::Policy(NOT_CANCELLABLE.to_string()));
    }
    if now - order.date > CANCELLATION_WINDOW_MS {
        return Err(ServiceError::Policy(WINDOW_EXPIRED.to_string()));
    }

    order.status = OrderStatus::Cancelled;
    order.cancelled_by = Some("User".to_string());
    order.status_date = now;
    Ok(())
}

/// Admin status change. Any forward state may be set in any order, but
/// cancellation has its own path and is terminal.
pub fn set_status(order: &mut Order, status: OrderStatus, now: i64) -> Result<(), ServiceError> {
    if order.status == OrderStatus::Cancelled {
        return Err(ServiceError::Policy(CANCELLED_IS_FINAL.to_string()));
    }
    if status == OrderStatus::Cancelled {
        return Err(ServiceError::Policy(
            "Orders can only be cancelled through cancellation".to_string(),
        ));
    }

    order.status = status;
    order.status_date = now;
    Ok(())
}

/// Amount in the gateway's minor currency unit.
pub fn minor_units(amount: f64) -> u64 {
    (amount * 100.0).round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const T0: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;

    fn address() -> Address {
        Address {
            street: "123 Main St".to_string(),
            city: "Kolkata".to_string(),
            state: "West Bengal".to_string(),
            zipcode: "700001".to_string(),
            country: "India".to_string(),
            phone: "9876543210".to_string(),
        }
    }

    fn product(id: &str, sizes: &[&str]) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            description: String::new(),
            price: 500.0,
            size_prices: HashMap::from([("L".to_string(), 650.0)]),
            image: vec!["https://cdn.example/p.jpg".to_string()],
            category: "Crochet".to_string(),
            sub_category: String::new(),
            sizes: sizes.iter().map(|s| s.to_string()).collect(),
            default_size: None,
            bestseller: false,
            date: T0,
            rating: 0.0,
            reviews: Vec::new(),
            shipping_fee: None,
        }
    }

    fn placed_order() -> Order {
        new_order("u1", Vec::new(), address(), 1000.0, PaymentMethod::Cod, T0).unwrap()
    }

    fn item(product_id: &str, size: &str, quantity: u32) -> OrderItemRequest {
        OrderItemRequest {
            product_id: product_id.to_string(),
            size: size.to_string(),
            quantity,
        }
    }

    #[test]
    fn new_order_starts_placed_and_unpaid() {
        let order = placed_order();
        assert_eq!(order.status, OrderStatus::OrderPlaced);
        assert!(!order.payment);
        assert_eq!(order.status_date, T0);
        assert!(order.cancelled_by.is_none());
    }

    #[test]
    fn negative_amount_is_rejected() {
        let result = new_order("u1", Vec::new(), address(), -1.0, PaymentMethod::Cod, T0);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn snapshot_uses_size_price_override() {
        let catalog = HashMap::from([("p1".to_string(), product("p1", &["M", "L"]))]);
        let items = snapshot_line_items(&[item("p1", "L", 2), item("p1", "M", 1)], &catalog).unwrap();

        assert_eq!(items[0].price, 650.0);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].price, 500.0);
        assert_eq!(items[0].image.as_deref(), Some("https://cdn.example/p.jpg"));
    }

    #[test]
    fn snapshot_is_not_affected_by_later_catalog_edits() {
        let mut catalog = HashMap::from([("p1".to_string(), product("p1", &["M"]))]);
        let items = snapshot_line_items(&[item("p1", "M", 1)], &catalog).unwrap();

        catalog.get_mut("p1").unwrap().price = 9999.0;
        assert_eq!(items[0].price, 500.0);
    }

    #[test]
    fn snapshot_keeps_flat_shipping_override() {
        let mut flat = product("p1", &["M"]);
        flat.shipping_fee = Some(60.0);
        let mut catalog = HashMap::from([("p1".to_string(), flat), ("p2".to_string(), product("p2", &["M"]))]);

        let items = snapshot_line_items(&[item("p1", "M", 1), item("p2", "M", 1)], &catalog).unwrap();
        catalog.get_mut("p1").unwrap().shipping_fee = None;

        assert_eq!(items[0].shipping_fee, Some(60.0));
        assert_eq!(items[1].shipping_fee, None);
    }

    #[rstest]
    #[case::unknown_product(item("missing", "M", 1))]
    #[case::unknown_size(item("p1", "XXL", 1))]
    #[case::zero_quantity(item("p1", "M", 0))]
    fn snapshot_rejects_invalid_items(#[case] bad: OrderItemRequest) {
        let catalog = HashMap::from([("p1".to_string(), product("p1", &["M"]))]);
        assert!(snapshot_line_items(&[bad], &catalog).is_err());
    }

    #[test]
    fn snapshot_rejects_empty_cart() {
        assert!(snapshot_line_items(&[], &HashMap::new()).is_err());
    }

    #[rstest]
    #[case::just_placed(0)]
    #[case::four_hours_fifty_nine(4 * HOUR + 59 * MINUTE)]
    #[case::exactly_five_hours(5 * HOUR)]
    fn cancel_inside_window_succeeds(#[case] elapsed: i64) {
        let mut order = placed_order();
        cancel(&mut order, T0 + elapsed).unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancelled_by.as_deref(), Some("User"));
        assert_eq!(order.status_date, T0 + elapsed);
    }

    #[test]
    fn cancel_after_window_fails() {
        let mut order = placed_order();
        let err = cancel(&mut order, T0 + 5 * HOUR + MINUTE).unwrap_err();

        assert_eq!(err.to_string(), WINDOW_EXPIRED);
        assert_eq!(order.status, OrderStatus::OrderPlaced);
    }

    #[test]
    fn second_cancel_reports_stage() {
        let mut order = placed_order();
        cancel(&mut order, T0 + 4 * HOUR + 59 * MINUTE).unwrap();

        let err = cancel(&mut order, T0 + 4 * HOUR + 59 * MINUTE).unwrap_err();
        assert_eq!(err.to_string(), NOT_CANCELLABLE);
    }

    #[rstest]
    #[case(OrderStatus::Packing)]
    #[case(OrderStatus::Shipped)]
    #[case(OrderStatus::OutForDelivery)]
    #[case(OrderStatus::Delivered)]
    fn cancel_after_order_moves_on_fails(#[case] status: OrderStatus) {
        let mut order = placed_order();
        set_status(&mut order, status, T0 + MINUTE).unwrap();

        let err = cancel(&mut order, T0 + 2 * MINUTE).unwrap_err();
        assert_eq!(err.to_string(), NOT_CANCELLABLE);
    }

    #[test]
    fn admin_may_move_status_backwards() {
        let mut order = placed_order();
        set_status(&mut order, OrderStatus::Delivered, T0 + HOUR).unwrap();
        set_status(&mut order, OrderStatus::Packing, T0 + 2 * HOUR).unwrap();

        assert_eq!(order.status, OrderStatus::Packing);
        assert_eq!(order.status_date, T0 + 2 * HOUR);
    }

    #[test]
    fn admin_cannot_cancel_or_revive() {
        let mut order = placed_order();
        assert!(set_status(&mut order, OrderStatus::Cancelled, T0).is_err());

        cancel(&mut order, T0).unwrap();
        assert!(set_status(&mut order, OrderStatus::Packing, T0).is_err());
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(499.99, 49_999)]
    #[case(1250.5, 125_050)]
    fn converts_to_minor_units(#[case] amount: f64, #[case] expected: u64) {
        assert_eq!(minor_units(amount), expected);
    }
}
