use actix_web::{web, HttpMessage, HttpResponse, Error, body::EitherBody, dev::{Service, Transform, ServiceRequest, ServiceResponse}};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, decode, Header, EncodingKey, DecodingKey, Validation, errors::Error as JwtError};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use validator::Validate;
use tracing::{debug, error, info, warn};
use std::{
    future::Future,
    pin::Pin,
    rc::Rc,
    sync::Arc,
    task::{Context, Poll},
};
use futures_util::future::{ok, Ready as FutureReady};

use crate::config::MongoConfig;
use crate::error::{success, ServiceError, RELOGIN_MESSAGE};
use crate::models::{new_id, Cart, Role, User};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "is not a valid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // User ID
    pub role: Role,
    pub exp: i64,        // Expiration time
    pub iat: i64,        // Issued at
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Signing secrets for access and refresh tokens.
pub struct JwtKeys {
    access: Vec<u8>,
    refresh: Vec<u8>,
}

impl JwtKeys {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        JwtKeys {
            access: access_secret.as_bytes().to_vec(),
            refresh: refresh_secret.as_bytes().to_vec(),
        }
    }

    pub fn issue(&self, user_id: &str, role: Role) -> Result<TokenPair, ServiceError> {
        let now = Utc::now();

        // Access token (2 hours)
        let access_claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: (now + Duration::hours(2)).timestamp(),
            iat: now.timestamp(),
        };

        // Refresh token (7 days)
        let refresh_claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: (now + Duration::days(7)).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::default(), &access_claims, &EncodingKey::from_secret(&self.access))
            .map_err(|e| {
                error!("Token generation error: {}", e);
                ServiceError::Internal("Token generation failed".to_string())
            })?;

        let refresh_token = encode(&Header::default(), &refresh_claims, &EncodingKey::from_secret(&self.refresh))
            .map_err(|e| {
                error!("Refresh token generation error: {}", e);
                ServiceError::Internal("Refresh token generation failed".to_string())
            })?;

        Ok(TokenPair { token, refresh_token })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &DecodingKey::from_secret(&self.access), &Validation::default())?;
        Ok(token_data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &DecodingKey::from_secret(&self.refresh), &Validation::default())?;
        Ok(token_data.claims)
    }
}

pub async fn register(
    db: web::Data<MongoConfig>,
    keys: web::Data<JwtKeys>,
    user_data: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ServiceError> {
    user_data.validate()?;

    let collection = db.users();
    let email = user_data.email.trim().to_lowercase();

    // Check if email already exists
    if collection.find_one(doc! { "email": &email }, None).await?.is_some() {
        debug!("Registration with existing email: {}", email);
        return Err(ServiceError::Policy("User already exists".to_string()));
    }

    let password = hash(user_data.password.as_bytes(), DEFAULT_COST).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ServiceError::Internal("Password hashing failed".to_string())
    })?;

    let user = User {
        id: new_id(),
        name: user_data.name.trim().to_string(),
        email,
        password,
        phone: None,
        image: None,
        address: None,
        addresses: Vec::new(),
        cart_data: Cart::new(),
        wishlist: Vec::new(),
        role: Role::User,
    };

    collection.insert_one(&user, None).await?;

    info!("Created new user with ID: {}", user.id);
    Ok(success(keys.issue(&user.id, user.role)?))
}

async fn authenticate(db: &MongoConfig, credentials: &LoginRequest) -> Result<User, ServiceError> {
    let email = credentials.email.trim().to_lowercase();
    let user = db
        .users()
        .find_one(doc! { "email": &email }, None)
        .await?
        .ok_or_else(|| ServiceError::Policy("Invalid credentials".to_string()))?;

    let matches = verify(&credentials.password, &user.password).map_err(|e| {
        error!("Password verification error: {}", e);
        ServiceError::Internal("Password verification failed".to_string())
    })?;
    if !matches {
        debug!("Wrong password for {}", email);
        return Err(ServiceError::Policy("Invalid credentials".to_string()));
    }
    Ok(user)
}

pub async fn login(
    db: web::Data<MongoConfig>,
    keys: web::Data<JwtKeys>,
    credentials: web::Json<LoginRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user = authenticate(&db, &credentials).await?;
    info!("User {} logged in", user.id);
    Ok(success(keys.issue(&user.id, user.role)?))
}

pub async fn admin_login(
    db: web::Data<MongoConfig>,
    keys: web::Data<JwtKeys>,
    credentials: web::Json<LoginRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user = authenticate(&db, &credentials).await?;
    if user.role != Role::Admin {
        warn!("Non-admin {} attempted admin login", user.id);
        return Err(ServiceError::Policy("Invalid credentials".to_string()));
    }
    info!("Admin {} logged in", user.id);
    Ok(success(keys.issue(&user.id, user.role)?))
}

pub async fn refresh_token(
    keys: web::Data<JwtKeys>,
    req: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, ServiceError> {
    let claims = keys.verify_refresh(&req.refresh_token).map_err(|e| {
        debug!("Refresh token rejected: {}", e);
        ServiceError::Unauthorized("Invalid refresh token".to_string())
    })?;

    Ok(success(keys.issue(&claims.sub, claims.role)?))
}

// Auth middleware implementation
#[derive(Clone)]
pub struct AuthMiddleware {
    keys: Arc<JwtKeys>,
    admin_only: bool,
}

impl AuthMiddleware {
    pub fn user(keys: Arc<JwtKeys>) -> Self {
        AuthMiddleware { keys, admin_only: false }
    }

    pub fn admin(keys: Arc<JwtKeys>) -> Self {
        AuthMiddleware { keys, admin_only: true }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareMiddleware<S>;
    type Future = FutureReady<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareMiddleware {
            service: Rc::new(service),
            keys: self.keys.clone(),
            admin_only: self.admin_only,
        })
    }
}

pub struct AuthMiddlewareMiddleware<S> {
    service: Rc<S>,
    keys: Arc<JwtKeys>,
    admin_only: bool,
}

fn bearer_claims(req: &ServiceRequest, keys: &JwtKeys) -> Result<Claims, ServiceError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| ServiceError::Unauthorized("No authorization header".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("Invalid authorization header".to_string()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| ServiceError::Unauthorized("Invalid authorization header format".to_string()))?;

    keys.verify_access(token).map_err(|e| {
        debug!("Access token rejected: {}", e);
        ServiceError::Unauthorized(RELOGIN_MESSAGE.to_string())
    })
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Rejections are rendered here so they carry the usual envelope.
        let claims = match bearer_claims(&req, &self.keys) {
            Ok(claims) => claims,
            Err(e) => {
                let response = req.error_response(e).map_into_right_body();
                return Box::pin(async move { Ok(response) });
            }
        };

        if self.admin_only && claims.role != Role::Admin {
            warn!("User {} denied admin route {}", claims.sub, req.path());
            let response = req
                .error_response(ServiceError::Forbidden("Not authorized".to_string()))
                .map_into_right_body();
            return Box::pin(async move { Ok(response) });
        }

        req.extensions_mut().insert(claims);
        let service = self.service.clone();
        Box::pin(async move { service.call(req).await.map(ServiceResponse::map_into_left_body) })
    }
}
