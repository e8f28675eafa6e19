//! Site-wide promotional banner, kept as one settings document.

use mongodb::bson::{doc, to_document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Collection;
use tracing::{debug, info};

use crate::error::ServiceError;
use crate::models::{FestivalConfig, FestivalUpdateRequest};

pub const FESTIVAL_KEY: &str = "festival";

impl Default for FestivalConfig {
    fn default() -> Self {
        FestivalConfig {
            id: FESTIVAL_KEY.to_string(),
            active: false,
            title: String::new(),
            message: String::new(),
            banner_image: None,
            discount_percent: 0,
            updated_at: 0,
        }
    }
}

impl FestivalConfig {
    pub fn apply(&mut self, update: &FestivalUpdateRequest, now: i64) {
        if let Some(active) = update.active {
            self.active = active;
        }
        if let Some(title) = &update.title {
            self.title = title.trim().to_string();
        }
        if let Some(message) = &update.message {
            self.message = message.trim().to_string();
        }
        if let Some(banner) = &update.banner_image {
            self.banner_image = Some(banner.clone()).filter(|b| !b.is_empty());
        }
        if let Some(discount) = update.discount_percent {
            self.discount_percent = discount;
        }
        self.updated_at = now;
    }
}

pub struct FestivalStore {
    collection: Collection<FestivalConfig>,
}

impl FestivalStore {
    pub fn new(collection: Collection<FestivalConfig>) -> Self {
        FestivalStore { collection }
    }

    /// Returns the stored config, inserting the default on first access.
    pub async fn get_or_create(&self) -> Result<FestivalConfig, ServiceError> {
        let mut defaults = to_document(&FestivalConfig::default())?;
        defaults.remove("_id");
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let config = self
            .collection
            .find_one_and_update(doc! { "_id": FESTIVAL_KEY }, doc! { "$setOnInsert": defaults }, options)
            .await?;

        debug!("Loaded festival config");
        Ok(config.unwrap_or_default())
    }

    pub async fn update(&self, update: &FestivalUpdateRequest, now: i64) -> Result<FestivalConfig, ServiceError> {
        let mut config = self.get_or_create().await?;
        config.apply(update, now);

        self.collection
            .replace_one(doc! { "_id": FESTIVAL_KEY }, &config, None)
            .await?;

        info!("Festival config updated (active: {})", config.active);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_keeps_other_fields() {
        let mut config = FestivalConfig::default();
        config.apply(
            &FestivalUpdateRequest {
                active: Some(true),
                title: Some(" Durga Puja Sale ".to_string()),
                discount_percent: Some(15),
                ..Default::default()
            },
            42,
        );
        config.apply(
            &FestivalUpdateRequest {
                message: Some("Free gift wrap".to_string()),
                ..Default::default()
            },
            43,
        );

        assert!(config.active);
        assert_eq!(config.title, "Durga Puja Sale");
        assert_eq!(config.message, "Free gift wrap");
        assert_eq!(config.discount_percent, 15);
        assert_eq!(config.updated_at, 43);
    }

    #[test]
    fn empty_banner_clears_image() {
        let mut config = FestivalConfig::default();
        config.apply(&FestivalUpdateRequest { banner_image: Some("https://x/b.png".to_string()), ..Default::default() }, 1);
        config.apply(&FestivalUpdateRequest { banner_image: Some(String::new()), ..Default::default() }, 2);
        assert!(config.banner_image.is_none());
    }
}
