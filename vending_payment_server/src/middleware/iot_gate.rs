//! Security gate middleware for Actix Web.
//!
//! Every route under `/iot` is wrapped with this middleware. It extracts the raw request body,
//! hands it to the engine's [`SecureRequestGate`] for the full verification pipeline (envelope
//! shape, device identity and revocation, timestamp window, nonce, HMAC, optional session), and
//! only then lets the request through. The verified payload is stashed in the request extensions
//! so handlers never touch the raw envelope; the body is re-injected for any extractor that
//! still wants it.
//!
//! Machines may also send their id in the `X-Machine-Id` header as a fallback for envelopes
//! whose meta block omits it.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use vending_payment_engine::{security::SecureRequestGate, traits::DeviceRegistry};

use crate::{errors::ServerError, helpers::get_remote_ip};

pub const MACHINE_ID_HEADER: &str = "X-Machine-Id";

pub struct IotGateMiddlewareFactory<B: DeviceRegistry> {
    gate: SecureRequestGate<B>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
}

impl<B: DeviceRegistry> IotGateMiddlewareFactory<B> {
    pub fn new(gate: SecureRequestGate<B>, use_x_forwarded_for: bool, use_forwarded: bool) -> Self {
        Self { gate, use_x_forwarded_for, use_forwarded }
    }
}

impl<S, Res, B> Transform<S, ServiceRequest> for IotGateMiddlewareFactory<B>
where
    S: Service<ServiceRequest, Response = ServiceResponse<Res>, Error = Error> + 'static,
    S::Future: 'static,
    Res: 'static,
    B: DeviceRegistry + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<Res>;
    type Transform = IotGateMiddlewareService<S, B>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IotGateMiddlewareService {
            gate: self.gate.clone(),
            use_x_forwarded_for: self.use_x_forwarded_for,
            use_forwarded: self.use_forwarded,
            service: Rc::new(service),
        }))
    }
}

pub struct IotGateMiddlewareService<S, B: DeviceRegistry> {
    gate: SecureRequestGate<B>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
    service: Rc<S>,
}

impl<S, Res, B> Service<ServiceRequest> for IotGateMiddlewareService<S, B>
where
    S: Service<ServiceRequest, Response = ServiceResponse<Res>, Error = Error> + 'static,
    S::Future: 'static,
    Res: 'static,
    B: DeviceRegistry + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<Res>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let gate = self.gate.clone();
        let use_x_forwarded_for = self.use_x_forwarded_for;
        let use_forwarded = self.use_forwarded;
        Box::pin(async move {
            trace!("🔐️ Verifying machine request");
            let header_machine_id = req
                .headers()
                .get(MACHINE_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<i64>().ok());
            let endpoint = req.path().to_string();
            let remote_ip =
                get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded).map(|ip| ip.to_string());
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ServerError::InvalidRequestBody(e.to_string())
            })?;
            match gate.authorize(&endpoint, &body, header_machine_id, remote_ip).await {
                Ok(authorized) => {
                    trace!("🔐️ Machine request verified ✅️");
                    req.extensions_mut().insert(authorized);
                    req.set_payload(bytes_to_payload(body));
                    service.call(req).await
                },
                Err(rejection) => Err(ServerError::SecurityRejected(rejection).into()),
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
