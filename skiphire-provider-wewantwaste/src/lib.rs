//! Gateway implementation for the We Want Waste skip pricing API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use skiphire_core::{
    model::{Location, OptionId, PricingOption},
    ports::{GatewayError, PricingPort},
    settings::Settings,
};

/// Error body some failures carry, e.g. `{"message": "Invalid postcode"}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Pricing backend talking to `<base>/skips/...`.
pub struct WeWantWasteGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl WeWantWasteGateway {
    /// Create a gateway bound to the given HTTP client and API base URL.
    #[must_use]
    pub fn new<S: Into<String>>(client: Client, base_url: S, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    fn get(&self, endpoint: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{endpoint}", self.base_url))
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
    }
}

#[async_trait]
impl PricingPort for WeWantWasteGateway {
    async fn pricing_options(&self, location: &Location) -> Result<Vec<PricingOption>, GatewayError> {
        debug!(postcode = %location.postcode, area = %location.area, "fetching pricing options");
        let req = self.get("/skips/by-location").query(&[
            ("postcode", location.postcode.as_str()),
            ("area", location.area.as_str()),
        ]);

        let body = fetch_body(req).await?;
        let options = normalize_list(&body)?;
        debug!(count = options.len(), "received pricing options");
        Ok(options)
    }

    async fn pricing_option(&self, id: OptionId) -> Result<PricingOption, GatewayError> {
        debug!(%id, "fetching pricing option");
        let body = fetch_body(self.get(&format!("/skips/{id}"))).await?;
        normalize_item(&body)
    }
}

/// Build the gateway described by `settings` as a shareable port.
#[must_use]
pub fn gateway(client: Client, settings: &Settings) -> Arc<dyn PricingPort> {
    Arc::new(WeWantWasteGateway::new(
        client,
        settings.base_url.as_str(),
        settings.http_timeout,
    ))
}

/// Accept a bare array or a `{"data": [...]}` envelope.
///
/// Any other JSON shape is treated as "no options". A body that is not JSON,
/// or whose items are not pricing options, is a [`GatewayError::Parse`].
fn normalize_list(body: &str) -> Result<Vec<PricingOption>, GatewayError> {
    let value: Value = serde_json::from_str(body).map_err(parse_error)?;
    let items = match value {
        items @ Value::Array(_) => items,
        Value::Object(mut fields) => match fields.remove("data") {
            Some(items @ Value::Array(_)) => items,
            _ => {
                warn!("pricing response has no data array, treating as empty");
                return Ok(Vec::new());
            }
        },
        _ => {
            warn!("pricing response is neither a list nor an envelope, treating as empty");
            return Ok(Vec::new());
        }
    };
    decode(items)
}

/// Accept a bare option object or a `{"data": {...}}` envelope.
fn normalize_item(body: &str) -> Result<PricingOption, GatewayError> {
    let value: Value = serde_json::from_str(body).map_err(parse_error)?;
    match value {
        Value::Object(mut fields) => match fields.remove("data") {
            Some(item @ Value::Object(_)) => decode(item),
            Some(other) => {
                fields.insert("data".to_owned(), other);
                decode(Value::Object(fields))
            }
            None => decode(Value::Object(fields)),
        },
        _ => Err(GatewayError::Parse("expected a pricing option object".to_owned())),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(parse_error)
}

// Small helper to send a request and return the body of a successful response.
async fn fetch_body(req: RequestBuilder) -> Result<String, GatewayError> {
    let resp = req.send().await.map_err(transport_error)?;
    let status = resp.status();

    if !status.is_success() {
        // The status is already known, so an unreadable error body is just empty.
        let body = resp.text().await.unwrap_or_else(|err| {
            debug!(status = status.as_u16(), error = %err, "could not read error body");
            String::new()
        });
        return Err(remote_error(status.as_u16(), body));
    }
    resp.text().await.map_err(transport_error)
}

fn remote_error(status: u16, raw_body: String) -> GatewayError {
    let message = serde_json::from_str::<ErrorBody>(&raw_body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("HTTP error! status: {status}"));
    warn!(status, %message, "pricing service returned an error");
    GatewayError::Remote {
        status,
        message,
        raw_body,
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        message: err.to_string(),
    }
}

fn parse_error(err: serde_json::Error) -> GatewayError {
    GatewayError::Parse(err.to_string())
}
