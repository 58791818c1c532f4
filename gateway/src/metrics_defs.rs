//! Gateway-side metric definitions.

pub use aggregator::metrics_defs::{MetricDef, MetricType, describe};

pub const REQUESTS: MetricDef = MetricDef {
    name: "gateway.requests",
    metric_type: MetricType::Counter,
    description: "Requests received on the gateway listener",
};

pub const LOGIN_FAILURES: MetricDef = MetricDef {
    name: "gateway.login_failures",
    metric_type: MetricType::Counter,
    description: "Login attempts the upstream rejected",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS, LOGIN_FAILURES];
