use mongodb::{Client, Collection, Database};
use std::env;
use dotenv::dotenv;

use crate::models::{CustomOrder, FestivalConfig, Order, Product, SellerApplication, User};

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongo_uri: String,
    pub database_name: String,
    pub bind_address: String,
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub razorpay: Option<RazorpayConfig>,
    pub currency: String,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub warehouse_lat: f64,
    pub warehouse_lon: f64,
    pub mail: Option<MailConfig>,
    pub upload_dir: String,
    pub public_base_url: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn float_or(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        // Both keys must be present for online checkout to be offered.
        let razorpay = match (env::var("RAZORPAY_KEY_ID"), env::var("RAZORPAY_KEY_SECRET")) {
            (Ok(key_id), Ok(key_secret)) if !key_id.is_empty() && !key_secret.is_empty() => {
                Some(RazorpayConfig {
                    key_id,
                    key_secret,
                    api_url: var_or("RAZORPAY_API_URL", "https://api.razorpay.com"),
                })
            }
            _ => None,
        };

        let mail = env::var("MAIL_API_URL").ok().filter(|url| !url.is_empty()).map(|api_url| MailConfig {
            api_url,
            api_key: var_or("MAIL_API_KEY", ""),
            from: var_or("MAIL_FROM", "Aalaboo <no-reply@aalaboo.in>"),
        });

        AppConfig {
            mongo_uri: var_or("MONGODB_URI", "mongodb://localhost:27017"),
            database_name: var_or("DATABASE_NAME", "aalaboo"),
            bind_address: var_or("BIND_ADDRESS", "127.0.0.1:8080"),
            jwt_secret: var_or("JWT_SECRET", "aalaboo-dev-secret"),
            refresh_secret: var_or("REFRESH_SECRET", "aalaboo-dev-refresh-secret"),
            razorpay,
            currency: var_or("CURRENCY", "INR"),
            geocoder_url: var_or("GEOCODER_URL", "https://nominatim.openstreetmap.org"),
            geocoder_user_agent: var_or("GEOCODER_USER_AGENT", "aalaboo-api/0.1"),
            warehouse_lat: float_or("WAREHOUSE_LAT", 22.5726),
            warehouse_lon: float_or("WAREHOUSE_LON", 88.3639),
            mail,
            upload_dir: var_or("UPLOAD_DIR", "uploads"),
            public_base_url: var_or("PUBLIC_BASE_URL", "http://127.0.0.1:8080"),
        }
    }
}

pub struct MongoConfig {
    pub database: Database,
}

impl MongoConfig {
    pub async fn init(config: &AppConfig) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(&config.mongo_uri).await?;
        let database = client.database(&config.database_name);

        Ok(MongoConfig { database })
    }

    pub fn products(&self) -> Collection<Product> {
        self.database.collection("products")
    }

    pub fn users(&self) -> Collection<User> {
        self.database.collection("users")
    }

    pub fn orders(&self) -> Collection<Order> {
        self.database.collection("orders")
    }

    pub fn custom_orders(&self) -> Collection<CustomOrder> {
        self.database.collection("custom_orders")
    }

    pub fn settings(&self) -> Collection<FestivalConfig> {
        self.database.collection("settings")
    }

    pub fn seller_applications(&self) -> Collection<SellerApplication> {
        self.database.collection("seller_applications")
    }
}
