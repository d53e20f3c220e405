//! Prometheus metrics for the query endpoint
//!
//! - `sqltalk_queries_total{outcome}`: data, message or error
//! - `sqltalk_pipeline_failures_total{stage}`: failing pipeline stage
//! - `sqltalk_query_duration_seconds`: end-to-end request latency

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use sqltalk_core::{PipelineError, QueryOutput, QueryPayload};
use std::time::Duration;

/// How a request ended, for metrics labeling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Data,
    Message,
    Error,
}

impl Outcome {
    pub fn of(result: &Result<QueryOutput, PipelineError>) -> Self {
        match result {
            Ok(output) => match output.payload {
                QueryPayload::Data { .. } => Outcome::Data,
                QueryPayload::Message { .. } => Outcome::Message,
            },
            Err(_) => Outcome::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Data => "data",
            Outcome::Message => "message",
            Outcome::Error => "error",
        }
    }
}

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    queries: IntCounterVec,
    failures: IntCounterVec,
    duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let queries = IntCounterVec::new(
            Opts::new("sqltalk_queries_total", "Query requests by outcome"),
            &["outcome"],
        )?;
        let failures = IntCounterVec::new(
            Opts::new("sqltalk_pipeline_failures_total", "Failed requests by pipeline stage"),
            &["stage"],
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "sqltalk_query_duration_seconds",
            "End-to-end query request latency",
        ))?;

        registry.register(Box::new(queries.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            queries,
            failures,
            duration,
        })
    }

    /// Record one finished request
    pub fn observe(&self, result: &Result<QueryOutput, PipelineError>, elapsed: Duration) {
        self.queries
            .with_label_values(&[Outcome::of(result).as_str()])
            .inc();
        if let Err(e) = result {
            self.failures.with_label_values(&[e.stage()]).inc();
        }
        self.duration.observe(elapsed.as_secs_f64());
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
