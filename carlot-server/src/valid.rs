use std::{
    net::{IpAddr, SocketAddr},
    ops::Deref,
};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    Json,
};
use http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use carlot_slo::errors::{self, Code, WithBacktrace};

pub struct Valid<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Valid<Json<T>>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = WithBacktrace;
    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let value = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| errors::bad_request(&err))?;
        value.deref().validate().map_err(Code::Validates)?;
        Ok(Self(value))
    }
}

pub struct ClientIp {
    pub ip: IpAddr,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = WithBacktrace;
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let ip = if let Some(real_ip) = parts.headers.get("X-Real-IP") {
            let ip = real_ip.to_str().unwrap_or_default();
            match ip.find(',') {
                Some(idx) => &ip[..idx],
                None => ip,
            }
            .parse()
            .ok()
        } else {
            None
        };
        let ip = match ip {
            Some(v) => v,
            None => {
                let v = ConnectInfo::<SocketAddr>::from_request_parts(
                    parts, &state,
                )
                .await
                .map_err(errors::any)?;
                v.ip()
            }
        };

        Ok(Self { ip })
    }
}
