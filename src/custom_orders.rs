use std::collections::HashMap;

use crate::error::ServiceError;
use crate::models::{new_id, ColorPreference, CustomOrder};

pub const INITIAL_STATUS: &str = "Pending";

/// Text fields of a custom order submission, checked before the image is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomOrderForm {
    pub size: String,
    pub color_preference: ColorPreference,
    pub custom_color: Option<String>,
    pub yarn_type: Option<String>,
    pub description: String,
}

fn field(fields: &HashMap<String, String>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CustomOrderForm {
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ServiceError> {
        let size = field(fields, "size").ok_or_else(|| ServiceError::Validation("size is required".to_string()))?;
        let description = field(fields, "description")
            .ok_or_else(|| ServiceError::Validation("description is required".to_string()))?;

        let color_preference = match field(fields, "colorPreference").as_deref() {
            None | Some("original") => ColorPreference::Original,
            Some("custom") => ColorPreference::Custom,
            Some(other) => {
                return Err(ServiceError::Validation(format!("colorPreference {} is not supported", other)))
            }
        };

        let custom_color = field(fields, "customColor");
        if color_preference == ColorPreference::Custom && custom_color.is_none() {
            return Err(ServiceError::Validation("customColor is required for a custom color".to_string()));
        }

        Ok(CustomOrderForm {
            size,
            color_preference,
            custom_color: custom_color.filter(|_| color_preference == ColorPreference::Custom),
            yarn_type: field(fields, "yarnType"),
            description,
        })
    }

    pub fn into_order(self, user_id: &str, image: String, now: i64) -> CustomOrder {
        CustomOrder {
            id: new_id(),
            user_id: user_id.to_string(),
            image,
            size: self.size,
            color_preference: self.color_preference,
            custom_color: self.custom_color,
            yarn_type: self.yarn_type,
            description: self.description,
            status: INITIAL_STATUS.to_string(),
            date: now,
        }
    }
}
