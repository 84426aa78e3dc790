use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::PayOsConfig,
    data_objects::PayOsResponse,
    helpers::sign_request_fields,
    NewPaymentRequest,
    PayOsApiError,
    PaymentLink,
    PaymentStatus,
};

#[derive(Clone)]
pub struct PayOsApi {
    config: PayOsConfig,
    client: Arc<Client>,
}

impl PayOsApi {
    pub fn new(config: PayOsConfig) -> Result<Self, PayOsApiError> {
        let mut headers = HeaderMap::with_capacity(3);
        let client_id = HeaderValue::from_str(&config.client_id)
            .map_err(|e| PayOsApiError::Initialization(e.to_string()))?;
        let api_key = HeaderValue::from_str(config.api_key.reveal().as_str())
            .map_err(|e| PayOsApiError::Initialization(e.to_string()))?;
        headers.insert("x-client-id", client_id);
        headers.insert("x-api-key", api_key);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PayOsApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, PayOsApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PayOsApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            let envelope =
                response.json::<PayOsResponse<T>>().await.map_err(|e| PayOsApiError::JsonError(e.to_string()))?;
            if envelope.is_success() {
                envelope.data.ok_or(PayOsApiError::EmptyResponse)
            } else {
                Err(PayOsApiError::GatewayRejection {
                    code: envelope.code,
                    desc: envelope.desc.unwrap_or_else(|| "Unknown error".to_string()),
                })
            }
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PayOsApiError::RestResponseError(e.to_string()))?;
            Err(PayOsApiError::QueryError { status, message })
        }
    }

    /// Creates a hosted checkout link for the given request. The request signature covers the
    /// five mandatory fields, sorted by key.
    pub async fn create_payment_link(&self, request: &NewPaymentRequest) -> Result<PaymentLink, PayOsApiError> {
        let return_url = self.config.absolute_url(&request.return_url);
        let cancel_url = self.config.absolute_url(&request.cancel_url);
        let fields = [
            ("amount", request.amount.value().to_string()),
            ("cancelUrl", cancel_url.clone()),
            ("description", request.description.clone()),
            ("orderCode", request.order_code.to_string()),
            ("returnUrl", return_url.clone()),
        ];
        let signature = sign_request_fields(self.config.checksum_key.reveal(), &fields);
        let mut body = serde_json::json!({
            "orderCode": request.order_code,
            "amount": request.amount,
            "description": request.description,
            "items": request.items,
            "returnUrl": return_url,
            "cancelUrl": cancel_url,
            "signature": signature,
        });
        if let Some(name) = &request.buyer_name {
            body["buyerName"] = Value::from(name.as_str());
        }
        if let Some(email) = &request.buyer_email {
            body["buyerEmail"] = Value::from(email.as_str());
        }
        if let Some(phone) = &request.buyer_phone {
            body["buyerPhone"] = Value::from(phone.as_str());
        }
        debug!("Creating payment link for order {} ({})", request.order_code, request.amount);
        let link = self.rest_query::<PaymentLink>(Method::POST, "/payment-requests", Some(body)).await?;
        info!("Created payment link for order {}: {}", link.order_code, link.status);
        Ok(link)
    }

    pub async fn get_payment_status(&self, order_code: i64) -> Result<PaymentStatus, PayOsApiError> {
        let path = format!("/payment-requests/{order_code}");
        debug!("Fetching payment status for order {order_code}");
        let status = self.rest_query::<PaymentStatus>(Method::GET, &path, None).await?;
        debug!("Order {order_code} gateway status: {}", status.status);
        Ok(status)
    }

    pub async fn cancel_payment(&self, order_code: i64) -> Result<PaymentStatus, PayOsApiError> {
        let path = format!("/payment-requests/{order_code}/cancel");
        debug!("Cancelling payment for order {order_code}");
        let status = self.rest_query::<PaymentStatus>(Method::POST, &path, None).await?;
        info!("Cancelled payment for order {order_code}");
        Ok(status)
    }

    pub fn checksum_key(&self) -> &str {
        self.config.checksum_key.reveal()
    }
}
