pub mod auth;
pub mod cart;
pub mod config;
pub mod custom_orders;
pub mod error;
pub mod festival;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod sellers;
pub mod shipping;
pub mod uploads;
pub mod wishlist;

use actix_web::web;
use std::sync::Arc;

use crate::auth::{AuthMiddleware, JwtKeys};
use crate::config::{AppConfig, MongoConfig};
use crate::error::ServiceError;
use crate::festival::FestivalStore;
use crate::handlers::{custom_orders as custom, festival as festival_handlers, orders as order_handlers, products, sellers as seller_handlers, users};
use crate::notify::Notifier;
use crate::payments::{Payments, RazorpayClient};
use crate::shipping::{Coordinates, DeliveryEstimator, Geocoder};
use crate::uploads::ImageStore;

/// Shared state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    db: web::Data<MongoConfig>,
    keys: Arc<JwtKeys>,
    estimator: web::Data<DeliveryEstimator>,
    payments: web::Data<Payments>,
    notifier: web::Data<Notifier>,
    images: web::Data<ImageStore>,
    festival: web::Data<FestivalStore>,
}

impl AppState {
    pub fn new(config: &AppConfig, db: MongoConfig, notifier: Notifier) -> Result<Self, ServiceError> {
        let geocoder = Geocoder::new(&config.geocoder_url, &config.geocoder_user_agent)?;
        let warehouse = Coordinates {
            latitude: config.warehouse_lat,
            longitude: config.warehouse_lon,
        };
        let gateway = config.razorpay.clone().map(RazorpayClient::new).transpose()?;
        let festival = FestivalStore::new(db.settings());

        Ok(AppState {
            db: web::Data::new(db),
            keys: Arc::new(JwtKeys::new(&config.jwt_secret, &config.refresh_secret)),
            estimator: web::Data::new(DeliveryEstimator::new(geocoder, warehouse)),
            payments: web::Data::new(Payments::new(gateway, &config.currency)),
            notifier: web::Data::new(notifier),
            images: web::Data::new(ImageStore::new(&config.upload_dir, &config.public_base_url)),
            festival: web::Data::new(festival),
        })
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        let user = || AuthMiddleware::user(self.keys.clone());
        let admin = || AuthMiddleware::admin(self.keys.clone());

        cfg.app_data(self.db.clone())
            .app_data(web::Data::from(self.keys.clone()))
            .app_data(self.estimator.clone())
            .app_data(self.payments.clone())
            .app_data(self.notifier.clone())
            .app_data(self.images.clone())
            .app_data(self.festival.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                ServiceError::Validation(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _| {
                ServiceError::Validation(err.to_string()).into()
            }));

        cfg.service(
            web::scope("/api/user")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/admin", web::post().to(auth::admin_login))
                .route("/refresh", web::post().to(auth::refresh_token))
                .service(web::resource("/profile").wrap(user()).route(web::get().to(users::profile)))
                .service(web::resource("/address/add").wrap(user()).route(web::post().to(users::add_address)))
                .service(web::resource("/wishlist").wrap(user()).route(web::get().to(users::get_wishlist)))
                .service(web::resource("/wishlist/add").wrap(user()).route(web::post().to(users::add_to_wishlist)))
                .service(
                    web::resource("/wishlist/remove")
                        .wrap(user())
                        .route(web::post().to(users::remove_from_wishlist)),
                )
                .service(web::resource("/request").wrap(user()).route(web::post().to(users::request_product)))
                .service(web::resource("/admin/requests").wrap(admin()).route(web::get().to(users::admin_requests)))
                .service(
                    web::resource("/admin/request-handle")
                        .wrap(admin())
                        .route(web::post().to(users::handle_request)),
                ),
        )
        .service(
            web::scope("/api/product")
                .route("/list", web::get().to(products::list_products))
                .route("/single", web::post().to(products::single_product))
                .service(web::resource("/add").wrap(admin()).route(web::post().to(products::add_product)))
                .service(web::resource("/update").wrap(admin()).route(web::post().to(products::update_product)))
                .service(web::resource("/remove").wrap(admin()).route(web::post().to(products::remove_product)))
                .service(web::resource("/review").wrap(user()).route(web::post().to(products::submit_review)))
                .service(web::resource("/user-reviews").wrap(user()).route(web::get().to(products::user_reviews))),
        )
        .service(
            web::scope("/api/cart")
                .service(web::resource("/get").wrap(user()).route(web::post().to(users::get_cart)))
                .service(web::resource("/add").wrap(user()).route(web::post().to(users::add_to_cart)))
                .service(web::resource("/update").wrap(user()).route(web::post().to(users::update_cart))),
        )
        .service(
            web::scope("/api/order")
                .route("/calculate-delivery", web::post().to(order_handlers::calculate_delivery))
                .route("/reverse-geocode", web::get().to(order_handlers::reverse_geocode))
                .service(web::resource("/place").wrap(user()).route(web::post().to(order_handlers::place_order)))
                .service(
                    web::resource("/razorpay")
                        .wrap(user())
                        .route(web::post().to(order_handlers::place_order_razorpay)),
                )
                .service(
                    web::resource("/verifyRazorpay")
                        .wrap(user())
                        .route(web::post().to(order_handlers::verify_razorpay)),
                )
                .service(web::resource("/cancel").wrap(user()).route(web::post().to(order_handlers::cancel_order)))
                .service(web::resource("/userorders").wrap(user()).route(web::post().to(order_handlers::user_orders)))
                .service(web::resource("/status").wrap(admin()).route(web::post().to(order_handlers::update_status)))
                .service(web::resource("/list").wrap(admin()).route(web::post().to(order_handlers::all_orders))),
        )
        .service(
            web::scope("/api/custom-order")
                .service(web::resource("/create").wrap(user()).route(web::post().to(custom::create_custom_order)))
                .service(web::resource("/mine").wrap(user()).route(web::get().to(custom::my_custom_orders)))
                .service(web::resource("/all").wrap(admin()).route(web::get().to(custom::all_custom_orders)))
                .service(
                    web::resource("/status")
                        .wrap(admin())
                        .route(web::post().to(custom::update_custom_order_status)),
                ),
        )
        .service(
            web::scope("/api/seller")
                .service(web::resource("/apply").wrap(user()).route(web::post().to(seller_handlers::apply)))
                .service(web::resource("/mine").wrap(user()).route(web::get().to(seller_handlers::my_applications)))
                .service(
                    web::resource("/applications")
                        .wrap(admin())
                        .route(web::get().to(seller_handlers::all_applications)),
                )
                .service(web::resource("/review").wrap(admin()).route(web::post().to(seller_handlers::review))),
        )
        .service(
            web::resource("/api/festival")
                .route(web::get().to(festival_handlers::get_festival))
                .route(web::post().to(festival_handlers::update_festival).wrap(admin())),
        )
        .route("/uploads/{name}", web::get().to(custom::serve_upload));
    }
}
