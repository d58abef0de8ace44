use crate::core::AppError;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

/// Header carrying the operator API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Guards the admin scope with a single operator API key
///
/// Only the argon2 hash of the key is configured. Without a hash every admin
/// request is rejected.
pub struct AdminKeyAuth {
    key_hash: Option<Arc<str>>,
}

impl AdminKeyAuth {
    pub fn new(key_hash: Option<String>) -> Self {
        Self {
            key_hash: key_hash.map(Arc::from),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminKeyAuthMiddleware<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminKeyAuthMiddleware {
            service: Rc::new(service),
            key_hash: self.key_hash.clone(),
        }))
    }
}

pub struct AdminKeyAuthMiddleware<S> {
    service: Rc<S>,
    key_hash: Option<Arc<str>>,
}

impl<S, B> Service<ServiceRequest> for AdminKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let key_hash = self.key_hash.clone();

        Box::pin(async move {
            let key_hash = key_hash
                .ok_or_else(|| Error::from(AppError::unauthorized("Admin API is not configured")))?;

            let api_key = req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| Error::from(AppError::unauthorized("Missing X-API-Key header")))?;

            if !verify_api_key(api_key, &key_hash).map_err(Error::from)? {
                tracing::warn!(path = %req.path(), "Rejected admin request with invalid API key");
                return Err(Error::from(AppError::unauthorized("Invalid API key")));
            }

            svc.call(req).await
        })
    }
}

/// Hash an API key with Argon2 for storage in configuration
pub fn hash_api_key(api_key: &str) -> crate::core::Result<String> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(api_key.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("Failed to hash API key: {}", e)))
}

/// Check an API key against its Argon2 hash
pub fn verify_api_key(api_key: &str, hash: &str) -> crate::core::Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Configuration(format!("Invalid admin key hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(api_key.as_bytes(), &parsed_hash)
        .is_ok())
}
