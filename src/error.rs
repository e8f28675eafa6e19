use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

pub const RELOGIN_MESSAGE: &str = "Not authorized, login again";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Policy(String),

    #[error("{0}")]
    PaymentFailed(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self {
        ServiceError::NotFound(format!("{} not found", entity))
    }

    /// Message shown to the caller. Storage and internal details stay in the log.
    pub fn response_message(&self) -> String {
        match self {
            Self::Unauthorized(_) => RELOGIN_MESSAGE.to_string(),
            Self::Database(_) | Self::Internal(_) => "Something went wrong, please try again".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Flattens nested validation errors into `path message` entries, e.g.
/// `address.phone is not a valid phone number` or `items[0].quantity ...`.
fn collect_validation_messages(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                let detail = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                out.push(format!("{} {}", path, detail));
            }
            ValidationErrorsKind::Struct(nested) => collect_validation_messages(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_validation_messages(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_validation_messages("", &errors, &mut fields);
        fields.sort();
        if fields.is_empty() {
            return ServiceError::Validation("Invalid request".to_string());
        }
        ServiceError::Validation(fields.join(", "))
    }
}

impl From<mongodb::bson::oid::Error> for ServiceError {
    fn from(_: mongodb::bson::oid::Error) -> Self {
        ServiceError::Validation("Invalid id format".to_string())
    }
}

impl From<mongodb::bson::ser::Error> for ServiceError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

/// Uniform `{ success, message?, ...data }` body used by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct Empty {}

pub fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope { success: true, message: None, data })
}

pub fn success_message(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        message: Some(message.into()),
        data: Empty {},
    })
}

pub fn success_with<T: Serialize>(message: impl Into<String>, data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        message: Some(message.into()),
        data,
    })
}

impl ResponseError for ServiceError {
    // Application failures travel in the envelope, not the status line.
    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            error!("Request failed: {}", self);
        }
        HttpResponse::build(self.status_code()).json(Envelope {
            success: false,
            message: Some(self.response_message()),
            data: Empty {},
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaceOrderRequest;
    use serde_json::json;
    use validator::Validate;

    fn checkout(address: serde_json::Value) -> PlaceOrderRequest {
        serde_json::from_value(json!({
            "items": [{ "productId": "64b7f0c2a1b2c3d4e5f60719", "size": "M", "quantity": 1 }],
            "amount": 499.0,
            "address": address,
        }))
        .unwrap()
    }

    #[test]
    fn nested_address_errors_name_the_field() {
        let req = checkout(json!({
            "street": "", "city": "Kolkata", "state": "West Bengal",
            "zipcode": "700016", "country": "India", "phone": "abc"
        }));

        let err = ServiceError::from(req.validate().unwrap_err());
        assert_eq!(
            err.to_string(),
            "address.phone is not a valid phone number, address.street is required"
        );
    }

    #[test]
    fn valid_checkout_passes() {
        let req = checkout(json!({
            "street": "1 Park Street", "city": "Kolkata", "state": "West Bengal",
            "zipcode": "700016", "country": "India", "phone": "9876543210"
        }));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn errors_render_in_the_envelope() {
        let response = ServiceError::Unauthorized("expired".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
