use crate::models::Cart;

/// Adds one unit of `product_id` in `size`, creating the entry if absent.
pub fn increment(cart: &mut Cart, product_id: &str, size: &str) -> u32 {
    let quantity = cart
        .entry(product_id.to_string())
        .or_default()
        .entry(size.to_string())
        .or_insert(0);
    *quantity += 1;
    *quantity
}

/// Sets an exact quantity. Zero removes the size, and a product with no sizes
/// left is dropped from the cart.
pub fn set_quantity(cart: &mut Cart, product_id: &str, size: &str, quantity: u32) {
    if quantity == 0 {
        if let Some(sizes) = cart.get_mut(product_id) {
            sizes.remove(size);
            if sizes.is_empty() {
                cart.remove(product_id);
            }
        }
        return;
    }
    cart.entry(product_id.to_string())
        .or_default()
        .insert(size.to_string(), quantity);
}
