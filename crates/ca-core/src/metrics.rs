use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

struct Metrics {
    registry: Registry,
    ca_up: IntGaugeVec,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    association_sweeps_total: IntCounterVec,
    association_records_updated_total: IntCounterVec,
}

pub const SWEEP_RESULT_SUCCESS: &str = "success";
pub const SWEEP_RESULT_ERROR: &str = "error";

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let ca_up = IntGaugeVec::new(Opts::new("ca_up", "Service health"), &["service"])
            .expect("ca_up metric");

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP request count"),
            &["service", "route", "method", "status"],
        )
        .expect("http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["service", "route", "method", "status"],
        )
        .expect("http_request_duration_seconds metric");

        let association_sweeps_total = IntCounterVec::new(
            Opts::new(
                "association_sweeps_total",
                "Community association sweeps by outcome",
            ),
            &["service", "result"],
        )
        .expect("association_sweeps_total metric");

        let association_records_updated_total = IntCounterVec::new(
            Opts::new(
                "association_records_updated_total",
                "Records rewritten by community association sweeps",
            ),
            &["service", "collection"],
        )
        .expect("association_records_updated_total metric");

        registry
            .register(Box::new(ca_up.clone()))
            .expect("register ca_up");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("register http_requests_total");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("register http_request_duration_seconds");
        registry
            .register(Box::new(association_sweeps_total.clone()))
            .expect("register association_sweeps_total");
        registry
            .register(Box::new(association_records_updated_total.clone()))
            .expect("register association_records_updated_total");

        Metrics {
            registry,
            ca_up,
            http_requests_total,
            http_request_duration_seconds,
            association_sweeps_total,
            association_records_updated_total,
        }
    })
}

pub fn init(service_name: &'static str) {
    metrics().ca_up.with_label_values(&[service_name]).set(1);
}

pub fn record_http_request(
    service_name: &'static str,
    method: &str,
    route: &str,
    status: u16,
    duration: Duration,
) {
    let status_str = status.to_string();
    let labels = &[service_name, route, method, status_str.as_str()];
    let metrics = metrics();
    metrics.http_requests_total.with_label_values(labels).inc();
    metrics
        .http_request_duration_seconds
        .with_label_values(labels)
        .observe(duration.as_secs_f64());
}

pub fn inc_association_sweep(service_name: &'static str, result: &str) {
    metrics()
        .association_sweeps_total
        .with_label_values(&[service_name, result])
        .inc();
}

pub fn add_association_updates(service_name: &'static str, collection: &str, updated: u64) {
    if updated == 0 {
        return;
    }
    metrics()
        .association_records_updated_total
        .with_label_values(&[service_name, collection])
        .inc_by(updated);
}

pub fn metrics_response(service_name: &'static str) -> impl IntoResponse {
    init(service_name);
    let metrics = metrics();
    let metric_families = metrics.registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            HeaderMap::new(),
            "failed to encode metrics".to_string(),
        );
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    (
        StatusCode::OK,
        headers,
        String::from_utf8_lossy(&buffer).to_string(),
    )
}

#[derive(Clone)]
pub struct MetricsLayer {
    service_name: &'static str,
}

impl MetricsLayer {
    pub fn new(service_name: &'static str) -> Self {
        Self { service_name }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    service_name: &'static str,
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            service_name: self.service_name,
        }
    }
}

impl<S, ReqBody, ResBody> Service<axum::http::Request<ReqBody>> for MetricsService<S>
where
    S: Service<axum::http::Request<ReqBody>, Response = axum::response::Response<ResBody>>
        + Send
        + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = axum::response::Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: axum::http::Request<ReqBody>) -> Self::Future {
        let service_name = self.service_name;
        let method = request.method().to_string();
        let route = route_label(request.uri().path());
        let start = Instant::now();
        let fut = self.inner.call(request);
        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    record_http_request(
                        service_name,
                        &method,
                        &route,
                        response.status().as_u16(),
                        start.elapsed(),
                    );
                    Ok(response)
                }
                Err(err) => {
                    record_http_request(service_name, &method, &route, 500, start.elapsed());
                    Err(err)
                }
            }
        })
    }
}

// Collapses `/v1/admin/<kind>/<id>/...` to `:id` so labels stay bounded.
fn route_label(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut label = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let is_id_slot =
            index == 4 && segments.get(1) == Some(&"v1") && segments.get(2) == Some(&"admin");
        if is_id_slot && !matches!(*segment, "resolve" | "lookup" | "associate") {
            label.push(":id");
        } else {
            label.push(segment);
        }
    }
    label.join("/")
}
