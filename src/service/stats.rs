//! Prometheus metrics for the service dispatcher.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `msip_request_count` | counter | `method`, `status` |
//! | `msip_request_latency_seconds` | histogram | `method` |
//! | `msip_active_requests` | gauge | `method` |
//! | `msip_external_call_count` | counter | `function`, `status` |
//! | `msip_external_call_latency_seconds` | histogram | `function` |

use std::time::{Duration, Instant};

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use super::ServiceMethod;
use crate::{Error, Result};

/// Latency buckets for whole requests, in seconds.
pub const REQUEST_LATENCY_BUCKETS: [f64; 13] = [
    0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0, 15.0, 30.0, 60.0,
];

/// Latency buckets for calls into the protection workflow, in seconds.
pub const EXTERNAL_CALL_LATENCY_BUCKETS: [f64; 10] =
    [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0];

/// How a request or external call ended, for counting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    /// The entry point produced a payload.
    Success,
    /// The request body was rejected.
    ValidationError,
    /// The workflow failed fatally.
    Error,
}

impl RequestStatus {
    /// Returns the status label.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::ValidationError => "validation_error",
            RequestStatus::Error => "error",
        }
    }
}

/// Point-in-time copy of one method's request metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodSnapshot {
    /// Requests that produced a payload.
    pub success: u64,
    /// Requests with a rejected body.
    pub validation_error: u64,
    /// Requests that failed fatally.
    pub error: u64,
    /// Requests currently in flight.
    pub active: i64,
    /// Cumulative time spent handling finished requests.
    pub total_latency: Duration,
}

impl MethodSnapshot {
    /// Returns the number of finished requests.
    pub fn finished(&self) -> u64 {
        self.success + self.validation_error + self.error
    }

    /// Returns the mean latency of finished requests.
    pub fn average_latency(&self) -> Option<Duration> {
        match self.finished() {
            0 => None,
            n => {
                let nanos = self.total_latency.as_nanos() / u128::from(n);
                Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
            }
        }
    }
}

/// Point-in-time copy of one external function's call metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalCallSnapshot {
    /// Calls that returned normally.
    pub success: u64,
    /// Calls that returned an error.
    pub error: u64,
    /// Cumulative time spent in the function.
    pub total_latency: Duration,
}

/// Request and external-call metrics, registered in a Prometheus registry.
///
/// # Example
///
/// ```rust
/// use docseal::service::{RequestStatus, ServiceMethod, ServiceStats};
///
/// let stats = ServiceStats::new()?;
/// let timer = stats.start(ServiceMethod::InspectFile);
/// assert_eq!(stats.active_requests(), 1);
/// timer.finish(RequestStatus::Success);
/// assert_eq!(stats.count(ServiceMethod::InspectFile, RequestStatus::Success), 1);
/// assert_eq!(stats.active_requests(), 0);
/// assert!(stats.encode()?.contains("msip_request_count"));
/// # Ok::<(), docseal::Error>(())
/// ```
pub struct ServiceStats {
    registry: Registry,
    request_count: IntCounterVec,
    request_latency: HistogramVec,
    active_requests: IntGaugeVec,
    external_call_count: IntCounterVec,
    external_call_latency: HistogramVec,
}

impl ServiceStats {
    /// Creates metrics in a private registry.
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Creates metrics and registers them in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metrics`] if the registry already holds metrics with
    /// the same names.
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let request_count = IntCounterVec::new(
            Opts::new("msip_request_count", "Count of requests received"),
            &["method", "status"],
        )?;
        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "msip_request_latency_seconds",
                "Time spent processing request",
            )
            .buckets(REQUEST_LATENCY_BUCKETS.to_vec()),
            &["method"],
        )?;
        let active_requests = IntGaugeVec::new(
            Opts::new(
                "msip_active_requests",
                "Number of requests currently being processed",
            ),
            &["method"],
        )?;
        let external_call_count = IntCounterVec::new(
            Opts::new(
                "msip_external_call_count",
                "Count of calls into the protection workflow",
            ),
            &["function", "status"],
        )?;
        let external_call_latency = HistogramVec::new(
            HistogramOpts::new(
                "msip_external_call_latency_seconds",
                "Time spent in the protection workflow",
            )
            .buckets(EXTERNAL_CALL_LATENCY_BUCKETS.to_vec()),
            &["function"],
        )?;

        registry.register(Box::new(request_count.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(active_requests.clone()))?;
        registry.register(Box::new(external_call_count.clone()))?;
        registry.register(Box::new(external_call_latency.clone()))?;

        Ok(Self {
            registry,
            request_count,
            request_latency,
            active_requests,
            external_call_count,
            external_call_latency,
        })
    }

    /// Returns the registry holding the metrics.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| Error::Metrics(prometheus::Error::Msg(e.to_string())))
    }

    /// Marks a request as started and returns a guard that records it when
    /// finished.
    pub fn start(&self, method: ServiceMethod) -> RequestTimer<'_> {
        self.active_requests
            .with_label_values(&[method.as_str()])
            .inc();
        RequestTimer {
            stats: self,
            method,
            started: Instant::now(),
            status: None,
        }
    }

    /// Returns the number of finished requests with the given status.
    pub fn count(&self, method: ServiceMethod, status: RequestStatus) -> u64 {
        self.request_count
            .with_label_values(&[method.as_str(), status.as_str()])
            .get()
    }

    /// Returns the number of requests in flight across all methods.
    pub fn active_requests(&self) -> i64 {
        ServiceMethod::ALL
            .iter()
            .map(|m| self.active_requests.with_label_values(&[m.as_str()]).get())
            .sum()
    }

    /// Returns a copy of one method's request metrics.
    pub fn snapshot(&self, method: ServiceMethod) -> MethodSnapshot {
        let latency = self.request_latency.with_label_values(&[method.as_str()]);
        MethodSnapshot {
            success: self.count(method, RequestStatus::Success),
            validation_error: self.count(method, RequestStatus::ValidationError),
            error: self.count(method, RequestStatus::Error),
            active: self
                .active_requests
                .with_label_values(&[method.as_str()])
                .get(),
            total_latency: seconds(latency.get_sample_sum()),
        }
    }

    /// Times a call into the workflow and counts it by outcome.
    pub fn observe_external_call<T>(
        &self,
        function: &str,
        call: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = call();
        let status = match result {
            Ok(_) => RequestStatus::Success,
            Err(_) => RequestStatus::Error,
        };
        self.external_call_count
            .with_label_values(&[function, status.as_str()])
            .inc();
        self.external_call_latency
            .with_label_values(&[function])
            .observe(started.elapsed().as_secs_f64());
        result
    }

    /// Returns a copy of one external function's call metrics.
    pub fn external_call_snapshot(&self, function: &str) -> ExternalCallSnapshot {
        let count = |status: RequestStatus| {
            self.external_call_count
                .with_label_values(&[function, status.as_str()])
                .get()
        };
        let latency = self.external_call_latency.with_label_values(&[function]);
        ExternalCallSnapshot {
            success: count(RequestStatus::Success),
            error: count(RequestStatus::Error),
            total_latency: seconds(latency.get_sample_sum()),
        }
    }

    fn record(&self, method: ServiceMethod, status: RequestStatus, elapsed: Duration) {
        self.request_count
            .with_label_values(&[method.as_str(), status.as_str()])
            .inc();
        self.request_latency
            .with_label_values(&[method.as_str()])
            .observe(elapsed.as_secs_f64());
        self.active_requests
            .with_label_values(&[method.as_str()])
            .dec();
    }
}

impl std::fmt::Debug for ServiceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStats")
            .field("active_requests", &self.active_requests())
            .finish_non_exhaustive()
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

/// Guard for one in-flight request.
///
/// A timer dropped without [`finish`](RequestTimer::finish) is recorded as
/// [`RequestStatus::Error`].
#[derive(Debug)]
pub struct RequestTimer<'a> {
    stats: &'a ServiceStats,
    method: ServiceMethod,
    started: Instant,
    status: Option<RequestStatus>,
}

impl RequestTimer<'_> {
    /// Records the request with its final status.
    pub fn finish(mut self, status: RequestStatus) {
        self.status = Some(status);
    }

    /// Returns the time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for RequestTimer<'_> {
    fn drop(&mut self) {
        let status = self.status.unwrap_or(RequestStatus::Error);
        self.stats
            .record(self.method, status, self.started.elapsed());
    }
}
