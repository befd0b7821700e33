//! Request duration metrics in the Prometheus text format.
//!
//! Two series are kept per request:
//!
//! - `http_request_duration_seconds`: a histogram labelled by route, status
//!   code and method
//! - `http_request_duration_summary_seconds`: quantiles over a sliding window
//!   (60 s split into 5 age buckets) labelled by route and method
//!
//! The registry is owned by the application state; nothing here is global.

use crate::error::ApiError;
use crate::http::{BoxedHttpHandler, HttpRequest};
use async_trait::async_trait;
use crate::identity::ACCOUNT_PREFIX;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use podium_core::{AsyncHandler, Result};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const HISTOGRAM_NAME: &str = "http_request_duration_seconds";
pub const SUMMARY_NAME: &str = "http_request_duration_summary_seconds";

/// Histogram bucket upper bounds, in seconds.
pub const BUCKETS: [f64; 9] = [0.1, 0.3, 0.5, 0.7, 1.0, 3.0, 5.0, 7.0, 10.0];
/// Quantiles reported by the summary.
pub const QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];
/// Observations older than this leave the summary window.
pub const SUMMARY_MAX_AGE: Duration = Duration::from_secs(60);
pub const SUMMARY_AGE_BUCKETS: u32 = 5;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct HistogramKey {
    route: String,
    code: u16,
    method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SummaryKey {
    route: String,
    method: String,
}

#[derive(Debug, Default)]
struct HistogramData {
    /// Non-cumulative counts per bucket; cumulated when rendering.
    buckets: [u64; BUCKETS.len()],
    sum: f64,
    count: u64,
}

impl HistogramData {
    fn observe(&mut self, value: f64) {
        if let Some(i) = BUCKETS.iter().position(|bound| value <= *bound) {
            self.buckets[i] += 1;
        }
        self.sum += value;
        self.count += 1;
    }
}

/// Observations of one label set, rotated through age buckets.
#[derive(Debug)]
struct SummaryData {
    window: Mutex<SlidingWindow>,
    sum: f64,
    count: u64,
}

#[derive(Debug)]
struct SlidingWindow {
    /// Oldest bucket first.
    buckets: VecDeque<Vec<f64>>,
    rotated_at: Instant,
    bucket_age: Duration,
}

impl SlidingWindow {
    fn new(now: Instant) -> Self {
        let mut buckets = VecDeque::with_capacity(SUMMARY_AGE_BUCKETS as usize);
        buckets.push_back(Vec::new());
        Self {
            buckets,
            rotated_at: now,
            bucket_age: SUMMARY_MAX_AGE / SUMMARY_AGE_BUCKETS,
        }
    }

    fn rotate(&mut self, now: Instant) {
        while now.duration_since(self.rotated_at) >= self.bucket_age {
            self.rotated_at += self.bucket_age;
            self.buckets.push_back(Vec::new());
            if self.buckets.len() > SUMMARY_AGE_BUCKETS as usize {
                self.buckets.pop_front();
            }
            // a long idle period empties the window at once
            if self.buckets.iter().all(Vec::is_empty) {
                self.rotated_at = now;
                break;
            }
        }
    }

    fn observe(&mut self, value: f64, now: Instant) {
        self.rotate(now);
        if let Some(current) = self.buckets.back_mut() {
            current.push(value);
        }
    }

    fn quantiles(&mut self, now: Instant) -> Vec<(f64, f64)> {
        self.rotate(now);
        let mut values: Vec<f64> = self.buckets.iter().flatten().copied().collect();
        values.sort_by(f64::total_cmp);
        QUANTILES
            .iter()
            .map(|q| {
                let value = if values.is_empty() {
                    f64::NAN
                } else {
                    let rank = (q * (values.len() - 1) as f64).round() as usize;
                    values[rank.min(values.len() - 1)]
                };
                (*q, value)
            })
            .collect()
    }
}

/// Durations of served requests.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    histograms: DashMap<HistogramKey, HistogramData>,
    summaries: DashMap<SummaryKey, SummaryData>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one request that took `duration`.
    pub fn observe(&self, route: &str, method: &str, code: StatusCode, duration: Duration) {
        self.observe_at(route, method, code, duration, Instant::now());
    }

    fn observe_at(
        &self,
        route: &str,
        method: &str,
        code: StatusCode,
        duration: Duration,
        now: Instant,
    ) {
        let seconds = duration.as_secs_f64();
        self.histograms
            .entry(HistogramKey {
                route: route.to_string(),
                code: code.as_u16(),
                method: method.to_string(),
            })
            .or_default()
            .observe(seconds);

        let mut summary = self
            .summaries
            .entry(SummaryKey {
                route: route.to_string(),
                method: method.to_string(),
            })
            .or_insert_with(|| SummaryData {
                window: Mutex::new(SlidingWindow::new(now)),
                sum: 0.0,
                count: 0,
            });
        summary.sum += seconds;
        summary.count += 1;
        if let Ok(mut window) = summary.window.lock() {
            window.observe(seconds, now);
        };
    }

    /// Returns the number of requests recorded for `route`.
    pub fn request_count(&self, route: &str) -> u64 {
        self.histograms
            .iter()
            .filter(|entry| entry.key().route == route)
            .map(|entry| entry.value().count)
            .sum()
    }

    /// Renders every series in the Prometheus text format.
    pub fn render(&self) -> String {
        self.render_at(Instant::now())
    }

    fn render_at(&self, now: Instant) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "# HELP {} Duration of HTTP requests in seconds\n# TYPE {} histogram",
            HISTOGRAM_NAME, HISTOGRAM_NAME
        );
        let mut histograms: Vec<_> = self
            .histograms
            .iter()
            .map(|e| (e.key().clone(), e.value().buckets, e.value().sum, e.value().count))
            .collect();
        histograms.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, buckets, sum, count) in histograms {
            let labels = format!(
                "route=\"{}\",code=\"{}\",method=\"{}\"",
                escape(&key.route),
                key.code,
                escape(&key.method)
            );
            let mut cumulative = 0;
            for (bound, n) in BUCKETS.iter().zip(buckets) {
                cumulative += n;
                let _ = writeln!(
                    out,
                    "{}_bucket{{le=\"{}\",{}}} {}",
                    HISTOGRAM_NAME, bound, labels, cumulative
                );
            }
            let _ = writeln!(out, "{}_bucket{{le=\"+Inf\",{}}} {}", HISTOGRAM_NAME, labels, count);
            let _ = writeln!(out, "{}_sum{{{}}} {}", HISTOGRAM_NAME, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", HISTOGRAM_NAME, labels, count);
        }

        let _ = writeln!(
            out,
            "# HELP {} Duration of HTTP requests in seconds over a sliding window\n# TYPE {} summary",
            SUMMARY_NAME, SUMMARY_NAME
        );
        let mut keys: Vec<SummaryKey> = self.summaries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        for key in keys {
            let Some(summary) = self.summaries.get(&key) else {
                continue;
            };
            let labels = format!(
                "route=\"{}\",method=\"{}\"",
                escape(&key.route),
                escape(&key.method)
            );
            let quantiles = match summary.window.lock() {
                Ok(mut window) => window.quantiles(now),
                Err(_) => Vec::new(),
            };
            for (q, value) in quantiles {
                let _ = writeln!(
                    out,
                    "{}{{quantile=\"{}\",{}}} {}",
                    SUMMARY_NAME, q, labels, value
                );
            }
            let _ = writeln!(out, "{}_sum{{{}}} {}", SUMMARY_NAME, labels, summary.sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", SUMMARY_NAME, labels, summary.count);
        }
        out
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Route label of account pages.
pub const ACCOUNT_ROUTE: &str = "/.account";
/// Route label of every resource request.
pub const RESOURCE_ROUTE: &str = "/*";
/// Method label of anything outside the standard methods.
pub const OTHER_METHOD: &str = "OTHER";

/// The route label of a path: the surface that serves it.
///
/// Labels come from a fixed set so clients cannot mint new series.
pub fn route_label(path: &str) -> &'static str {
    if path.starts_with(ACCOUNT_PREFIX) {
        ACCOUNT_ROUTE
    } else {
        RESOURCE_ROUTE
    }
}

/// The method label of a request: standard methods as is, others folded.
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::PATCH => "PATCH",
        Method::DELETE => "DELETE",
        Method::OPTIONS => "OPTIONS",
        _ => OTHER_METHOD,
    }
}

/// Serves the registry and times every other request.
///
/// Requests for the metrics endpoint are answered here and never recorded.
/// All others go to the wrapped handler; failures are turned into error
/// responses first so their status codes are recorded too.
pub struct MetricHandler {
    inner: BoxedHttpHandler,
    registry: std::sync::Arc<MetricsRegistry>,
    endpoint: String,
}

impl MetricHandler {
    pub fn new(
        inner: BoxedHttpHandler,
        registry: std::sync::Arc<MetricsRegistry>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            registry,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AsyncHandler<HttpRequest, Response> for MetricHandler {
    async fn handle(&self, input: &HttpRequest) -> Result<Response> {
        if input.path() == self.endpoint {
            return Ok((
                [(header::CONTENT_TYPE, CONTENT_TYPE)],
                self.registry.render(),
            )
                .into_response());
        }

        let start = Instant::now();
        let response = match self.inner.handle_safe(input).await {
            Ok(response) => response,
            Err(err) => ApiError::from(err).into_response(),
        };
        self.registry.observe(
            route_label(input.path()),
            method_label(input.method()),
            response.status(),
            start.elapsed(),
        );
        Ok(response)
    }
}
