//! Common types for metrics definitions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

pub const AGGREGATE_DURATION: MetricDef = MetricDef {
    name: "aggregate.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a full aggregation run in seconds",
};

pub const DETAIL_FETCH_FAILURES: MetricDef = MetricDef {
    name: "aggregate.detail_fetch_failures",
    metric_type: MetricType::Counter,
    description: "Per-facility detail fetches that failed and were absorbed",
};

pub const AVAILABILITY_FETCH_FAILURES: MetricDef = MetricDef {
    name: "aggregate.availability_fetch_failures",
    metric_type: MetricType::Counter,
    description: "Per-facility availability fetches that failed and were absorbed",
};

pub const TASK_TIMEOUTS: MetricDef = MetricDef {
    name: "aggregate.task_timeouts",
    metric_type: MetricType::Counter,
    description: "Per-facility tasks that exceeded their deadline",
};

pub const SESSION_INVALIDATIONS: MetricDef = MetricDef {
    name: "aggregate.session_invalidations",
    metric_type: MetricType::Counter,
    description: "Aggregation runs that signalled session invalidation",
};

pub const ALL_METRICS: &[MetricDef] = &[
    AGGREGATE_DURATION,
    DETAIL_FETCH_FAILURES,
    AVAILABILITY_FETCH_FAILURES,
    TASK_TIMEOUTS,
    SESSION_INVALIDATIONS,
];

/// Registers descriptions with the installed metrics recorder.
pub fn describe(defs: &[MetricDef]) {
    for def in defs {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}
