use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http, web, Error, HttpMessage, HttpResponse,
};
use futures::future::{ok, Ready};
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{validate_jwt, AuthUser};

/// Resolves the bearer token into an [`AuthUser`] extension.
///
/// Requests without a token pass through untouched; handlers that need a
/// user reject them. A token that is present but invalid is answered with
/// 401 right here.
#[derive(Debug, Clone)]
pub struct Authentication {
    jwt_secret: Rc<str>,
}

impl Authentication {
    pub fn new(jwt_secret: &str) -> Self {
        Authentication {
            jwt_secret: Rc::from(jwt_secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            jwt_secret: self.jwt_secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    jwt_secret: Rc<str>,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// `Authorization: Bearer <jwt>`, or `?token=<jwt>` for WebSocket upgrades
/// where browsers cannot set headers.
fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    web::Query::<TokenQuery>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.into_inner().token)
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(token) = extract_token(&req) {
            match validate_jwt(&token, &self.jwt_secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(AuthUser(claims.sub));
                }
                Err(e) => {
                    debug!("Rejected token: {}", e);
                    let (req_parts, _payload) = req.into_parts();
                    let resp = HttpResponse::Unauthorized()
                        .json(json!({ "error": format!("Invalid token: {}", e) }))
                        .map_into_boxed_body();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}
