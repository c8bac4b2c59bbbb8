use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "gateway.requests",
    metric_type: MetricType::Counter,
    description: "Inbound requests accepted for fan-out",
};

pub const BACKEND_OUTCOMES: MetricDef = MetricDef {
    name: "gateway.backend.outcomes",
    metric_type: MetricType::Counter,
    description: "Per-backend call outcomes, labeled by backend and outcome",
};

pub const FAN_OUT_PARTIAL: MetricDef = MetricDef {
    name: "gateway.fanout.partial",
    metric_type: MetricType::Counter,
    description: "Fan-outs where exactly one backend succeeded",
};

pub const FAN_OUT_FAILED: MetricDef = MetricDef {
    name: "gateway.fanout.failed",
    metric_type: MetricType::Counter,
    description: "Fan-outs that produced a caller-visible failure",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "gateway.request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    BACKEND_OUTCOMES,
    FAN_OUT_PARTIAL,
    FAN_OUT_FAILED,
    REQUEST_DURATION,
];
