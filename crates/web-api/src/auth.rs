//! JWT 认证模块
//!
//! 校验 HS256 token，取出 `{id, email}` 身份。HTTP 请求从 `x-auth-token`
//! 或 `Authorization: Bearer` 头读取，WebSocket 握手从 `?token=` 读取。

use axum::http::HeaderMap;
use config::JwtConfig;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// 经过验证的身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user: AuthUser,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 签发 token，身份由外部账号系统提供
    pub fn generate_token(&self, user: AuthUser) -> Result<String, ApiError> {
        let exp = time::OffsetDateTime::now_utc()
            + time::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            user,
            exp: exp.unix_timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::internal_server_error(format!("Token generation failed: {err}")))
    }

    pub fn verify_token(&self, token: &str) -> Result<AuthUser, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims.user)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                ApiError::unauthorized("Token is not valid")
            })
    }

    /// `x-auth-token` 优先，其次 `Authorization: Bearer`
    pub fn extract_user_from_headers(&self, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
        if let Some(token) = headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|header| header.to_str().ok())
        {
            return self.verify_token(token.trim());
        }

        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("No token, authorization denied"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;

        self.verify_token(token.trim())
    }
}
