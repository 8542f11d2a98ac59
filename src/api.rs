//! HTTP surface consumed by the storefront widget.
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, RawQuery, State},
    http::{
        header::{REFERER, USER_AGENT},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::{
    config::Listener,
    context::{DeviceType, RequestContext},
    decision::DecisionPayload,
    events::{BarEvent, EventType},
    resolver::Resolver,
    variant::Variant,
    Result,
};

/// Headers set by edge proxies carrying the visitor's country, in order of preference.
const COUNTRY_HEADERS: [&str; 2] = ["cf-ipcountry", "x-country-code"];

pub fn router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/bar", get(bar))
        .route("/track", post(track))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(resolver)
}

pub async fn serve(listener: &Listener, resolver: Arc<Resolver>) -> Result<()> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!(target: "announcement_bar", addr:display = addr; "listening");
    axum::serve(listener, router(resolver)).await?;
    Ok(())
}

#[derive(Debug, Default, PartialEq)]
struct BarParams {
    shop: Option<String>,
    url: Option<String>,
    device: Option<String>,
    country: Option<String>,
    session: Option<String>,
}

impl BarParams {
    /// Never fails. Unknown keys are ignored and the first of repeated keys wins.
    fn from_query(query: &str) -> BarParams {
        let mut params = BarParams::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "shop" => &mut params.shop,
                "url" => &mut params.url,
                "device" => &mut params.device,
                "country" => &mut params.country,
                "session" => &mut params.session,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

async fn bar(
    State(resolver): State<Arc<Resolver>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let params = BarParams::from_query(query.as_deref().unwrap_or_default());
    let ctx = request_context(&params, &headers);
    let shop = params.shop.as_deref().unwrap_or_default();

    match resolver.resolve(shop, &ctx) {
        Ok(decision) => (StatusCode::OK, Json(DecisionPayload::from(decision))).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(DecisionPayload::server_error()),
        )
            .into_response(),
    }
}

/// Build the visitor context from query parameters, falling back to request headers.
fn request_context(params: &BarParams, headers: &HeaderMap) -> RequestContext {
    let device = params
        .device
        .as_deref()
        .and_then(|device| device.parse::<DeviceType>().ok())
        .unwrap_or_else(|| {
            DeviceType::from_user_agent(header(headers, USER_AGENT.as_str()).unwrap_or_default())
        });

    let country = non_blank(params.country.as_deref())
        .or_else(|| COUNTRY_HEADERS.iter().find_map(|name| header(headers, name)));

    let page_url = non_blank(params.url.as_deref())
        .or_else(|| header(headers, REFERER.as_str()))
        .unwrap_or_default();

    RequestContext::new(page_url, device)
        .country_code(country)
        .session_id(params.session.as_deref().unwrap_or_default().trim())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    non_blank(headers.get(name).and_then(|value| value.to_str().ok()))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Deserialize, Debug)]
struct TrackRequest {
    bar_id: Option<i64>,
    message_id: Option<i64>,
    event_type: Option<EventType>,
    variant: Option<Variant>,
    device_type: Option<DeviceType>,
    page_url: Option<String>,
    referrer: Option<String>,
    session_id: Option<String>,
}

#[derive(Serialize)]
struct TrackResponse {
    success: bool,
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error: String,
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

async fn track(
    State(resolver): State<Arc<Resolver>>,
    payload: std::result::Result<Json<TrackRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (Some(bar_id), Some(event_type)) = (request.bar_id, request.event_type) else {
        return bad_request("bar_id and event_type are required");
    };

    let event = BarEvent {
        bar_id,
        message_id: request.message_id,
        event_type,
        variant: request.variant,
        device_type: request.device_type,
        page_url: request.page_url,
        referrer: request.referrer,
        session_id: request.session_id,
        timestamp: Utc::now(),
    };

    let success = match resolver.emitter().record(event) {
        Ok(()) => true,
        Err(err) => {
            log::warn!(target: "announcement_bar", bar_id; "dropping tracked event: {}", err);
            false
        }
    };

    (StatusCode::OK, Json(TrackResponse { success })).into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        body::Body,
        http::{header, HeaderMap, HeaderValue, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{request_context, router, BarParams};
    use crate::{
        configuration_store::{InMemoryConfigStore, Snapshot},
        context::DeviceType,
        events::{BarEvent, EmissionError, EventEmitter, EventType},
        resolver::Resolver,
    };

    fn fixture_resolver() -> Resolver {
        let store = Arc::new(InMemoryConfigStore::new());
        store.set_snapshot(Snapshot::from_file("tests/data/bars.json").unwrap());
        Resolver::new(store)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health() {
        let app = router(Arc::new(fixture_resolver()));
        assert_eq!(
            send(app, get("/health")).await,
            (StatusCode::OK, json!({ "status": "ok" }))
        );
    }

    #[tokio::test]
    async fn missing_shop() {
        let app = router(Arc::new(fixture_resolver()));
        assert_eq!(
            send(app, get("/bar")).await,
            (
                StatusCode::OK,
                json!({ "active": false, "reason": "Shop parameter required" })
            )
        );
    }

    #[tokio::test]
    async fn unknown_and_inactive_shops() {
        let app = router(Arc::new(fixture_resolver()));
        assert_eq!(
            send(app.clone(), get("/bar?shop=nobody.myshopify.com")).await,
            (
                StatusCode::OK,
                json!({ "active": false, "reason": "Shop not found" })
            )
        );
        assert_eq!(
            send(app, get("/bar?shop=quiet-shop.myshopify.com")).await,
            (
                StatusCode::OK,
                json!({ "active": false, "reason": "No active bars" })
            )
        );
    }

    #[tokio::test]
    async fn shows_first_message_without_rotation() {
        let app = router(Arc::new(fixture_resolver()));
        let (status, body) = send(
            app,
            get("/bar?shop=static-shop.myshopify.com&url=https%3A%2F%2Fshop.example%2F&session=v1"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], json!(true));
        assert_eq!(body["bar"]["id"], json!(2));
        assert_eq!(body["bar"]["rotation_enabled"], json!(false));
        assert_eq!(body["message"]["id"], json!(21));
        assert_eq!(body["message"]["text"], json!("Welcome!"));
        assert_eq!(body["message"]["button_text"], json!(""));
    }

    #[tokio::test]
    async fn repeated_query_parameters_keep_the_first_value() {
        let app = router(Arc::new(fixture_resolver()));
        assert_eq!(
            send(app.clone(), get("/bar?shop=a&shop=b")).await,
            (
                StatusCode::OK,
                json!({ "active": false, "reason": "Shop not found" })
            )
        );

        let (status, body) = send(
            app,
            get("/bar?shop=static-shop.myshopify.com&shop=other&session=v1&session=v2"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["id"], json!(21));
    }

    #[tokio::test]
    async fn no_eligible_message_keeps_bar_active() {
        let app = router(Arc::new(fixture_resolver()));
        let (status, body) = send(
            app,
            get("/bar?shop=app-shop.myshopify.com&device=desktop&session=v1"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], json!(true));
        assert_eq!(body["reason"], json!("No eligible message"));
        assert_eq!(body["bar"]["id"], json!(4));
        assert!(body.get("message").is_none());
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn store_not_loaded_is_server_error() {
        let app = router(Arc::new(Resolver::new(Arc::new(InMemoryConfigStore::new()))));
        assert_eq!(
            send(app, get("/bar?shop=static-shop.myshopify.com")).await,
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "active": false, "error": "Server error" })
            )
        );
    }

    #[tokio::test]
    async fn cors_headers_are_present() {
        let app = router(Arc::new(fixture_resolver()));
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://shop.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
    }

    #[tokio::test]
    async fn track_records_event() {
        let events: Arc<Mutex<Vec<BarEvent>>> = Arc::default();
        let sink = events.clone();
        let resolver = fixture_resolver()
            .with_emitter(Arc::new(move |event: BarEvent| sink.lock().unwrap().push(event)));
        let app = router(Arc::new(resolver));

        let (status, body) = send(
            app,
            post_json(
                "/track",
                json!({
                    "bar_id": 1,
                    "message_id": 14,
                    "event_type": "click",
                    "variant": "test",
                    "device_type": "mobile",
                    "session_id": "visitor-1"
                }),
            ),
        )
        .await;

        assert_eq!((status, body), (StatusCode::OK, json!({ "success": true })));
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Click);
        assert_eq!(events[0].message_id, Some(14));
        assert_eq!(events[0].device_type, Some(DeviceType::Mobile));
    }

    #[tokio::test]
    async fn track_requires_bar_and_event_type() {
        let app = router(Arc::new(fixture_resolver()));
        let (status, body) = send(app, post_json("/track", json!({ "bar_id": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn track_reports_rejected_event() {
        struct Closed;

        impl EventEmitter for Closed {
            fn record(&self, _event: BarEvent) -> Result<(), EmissionError> {
                Err(EmissionError::Closed)
            }
        }

        let app = router(Arc::new(fixture_resolver().with_emitter(Arc::new(Closed))));
        assert_eq!(
            send(
                app,
                post_json("/track", json!({ "bar_id": 1, "event_type": "close" }))
            )
            .await,
            (StatusCode::OK, json!({ "success": false }))
        );
    }

    #[test]
    fn parses_query_leniently() {
        let params = BarParams::from_query(
            "shop=sale-shop.myshopify.com&url=%2Fcollections%2Fsale&device=mobile&shop=x&utm_source=mail",
        );
        assert_eq!(
            params,
            BarParams {
                shop: Some("sale-shop.myshopify.com".into()),
                url: Some("/collections/sale".into()),
                device: Some("mobile".into()),
                ..BarParams::default()
            }
        );
        assert_eq!(BarParams::from_query(""), BarParams::default());
        assert_eq!(
            BarParams::from_query("session=a%ZZb").session.as_deref(),
            Some("a%ZZb")
        );
    }

    #[test]
    fn context_falls_back_to_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
        );
        headers.insert("x-country-code", HeaderValue::from_static("ca"));
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://shop.example/collections/sale"),
        );

        let ctx = request_context(&BarParams::default(), &headers);
        assert_eq!(ctx.device_type, DeviceType::Mobile);
        assert_eq!(ctx.country_code.as_deref(), Some("CA"));
        assert_eq!(ctx.page_url, "https://shop.example/collections/sale");
        assert_eq!(ctx.session_id, "");
    }

    #[test]
    fn query_parameters_win_over_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Android"));
        headers.insert("cf-ipcountry", HeaderValue::from_static("FR"));
        headers.insert("x-country-code", HeaderValue::from_static("CA"));

        let params = BarParams {
            device: Some("desktop".into()),
            country: Some("us".into()),
            url: Some("/cart".into()),
            session: Some(" v1 ".into()),
            ..BarParams::default()
        };
        let ctx = request_context(&params, &headers);
        assert_eq!(ctx.device_type, DeviceType::Desktop);
        assert_eq!(ctx.country_code.as_deref(), Some("US"));
        assert_eq!(ctx.page_url, "/cart");
        assert_eq!(ctx.session_id, "v1");

        let ctx = request_context(&BarParams::default(), &headers);
        assert_eq!(ctx.country_code.as_deref(), Some("FR"));
        assert_eq!(ctx.device_type, DeviceType::Mobile);
    }
}
