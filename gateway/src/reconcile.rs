use crate::config::BackendConfig;
use crate::metrics_defs;
use crate::operation::{Credential, OperationRequest};
use crate::upstream::{BackendInvoker, BackendOutcome};
use bytes::Bytes;
use http::StatusCode;
use shared::counter;
use std::sync::Arc;

/// How a one-sided success is reported to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// One good side is a usable result; the failed side can be retried
    /// later with an idempotent call.
    FavorAvailability,
    /// A split outcome is worse than a clean failure; both sides must
    /// succeed or the whole operation fails.
    AllOrNothing,
}

/// The single caller-visible decision derived from both backend outcomes.
/// Only ever computed after both outcomes exist.
#[derive(Clone, Debug, PartialEq)]
pub enum ReconciledResult {
    /// Both backends succeeded; the primary body is authoritative
    Replicated { body: Bytes },
    /// Exactly one backend succeeded and the policy accepts that
    Partial { body: Bytes },
    /// Exactly one backend succeeded and the policy rejects the split
    Inconsistent { failed_backend: String },
    /// Neither succeeded; the first reported upstream error passes through
    Rejected { status: StatusCode, body: Bytes },
    /// Neither backend could be reached at all
    Unreachable { backends: [String; 2] },
}

impl ReconciledResult {
    /// Status the emitter writes for this decision.
    pub fn status(&self) -> StatusCode {
        match self {
            ReconciledResult::Replicated { .. } | ReconciledResult::Partial { .. } => {
                StatusCode::OK
            }
            ReconciledResult::Inconsistent { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ReconciledResult::Rejected { status, .. } => *status,
            // Synthesized, deliberately distinct from anything an upstream
            // reported itself
            ReconciledResult::Unreachable { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

/// One backend's outcome tagged with its configured name.
#[derive(Clone, Debug)]
pub struct NamedOutcome {
    pub backend: String,
    pub outcome: BackendOutcome,
}

/// Pure reconciliation over the two outcomes; no I/O, fully testable.
///
/// Primary-first ordering makes every tie-break deterministic: the primary
/// body wins a double success and the primary's upstream error wins a
/// double failure, regardless of which call finished first.
pub fn reconcile(
    policy: ReconcilePolicy,
    primary: NamedOutcome,
    secondary: NamedOutcome,
) -> ReconciledResult {
    use BackendOutcome::*;

    match (primary.outcome, secondary.outcome) {
        (Success { body }, Success { .. }) => ReconciledResult::Replicated { body },
        (Success { body }, _) => one_sided(policy, body, secondary.backend),
        (_, Success { body }) => one_sided(policy, body, primary.backend),
        (UpstreamError { status, body }, _) => ReconciledResult::Rejected { status, body },
        (TransportError { .. }, UpstreamError { status, body }) => {
            ReconciledResult::Rejected { status, body }
        }
        (TransportError { .. }, TransportError { .. }) => ReconciledResult::Unreachable {
            backends: [primary.backend, secondary.backend],
        },
    }
}

fn one_sided(policy: ReconcilePolicy, body: Bytes, failed_backend: String) -> ReconciledResult {
    match policy {
        ReconcilePolicy::FavorAvailability => ReconciledResult::Partial { body },
        ReconcilePolicy::AllOrNothing => ReconciledResult::Inconsistent { failed_backend },
    }
}

/// Issues the same logical operation to both backends and folds the two
/// outcomes into one decision.
pub struct FanOutCoordinator {
    invoker: Arc<dyn BackendInvoker>,
    primary: BackendConfig,
    secondary: BackendConfig,
}

impl FanOutCoordinator {
    pub fn new(
        invoker: Arc<dyn BackendInvoker>,
        primary: BackendConfig,
        secondary: BackendConfig,
    ) -> Self {
        Self {
            invoker,
            primary,
            secondary,
        }
    }

    /// Runs both backend calls concurrently and reconciles once both have
    /// returned. Join-both semantics: neither a fast failure nor a fast
    /// success short-circuits the other call, and there is no cancellation.
    /// Exactly one `ReconciledResult` leaves this function per request.
    pub async fn dispatch(
        &self,
        request: &OperationRequest,
        credential: &Credential,
    ) -> ReconciledResult {
        let (primary_outcome, secondary_outcome) = tokio::join!(
            self.invoker.invoke(&self.primary, request, credential),
            self.invoker.invoke(&self.secondary, request, credential),
        );

        let result = reconcile(
            request.kind.policy(),
            NamedOutcome {
                backend: self.primary.name.clone(),
                outcome: primary_outcome,
            },
            NamedOutcome {
                backend: self.secondary.name.clone(),
                outcome: secondary_outcome,
            },
        );

        match &result {
            ReconciledResult::Replicated { .. } => {
                tracing::info!(operation = request.kind.name(), "replicated to both backends");
            }
            ReconciledResult::Partial { .. } => {
                counter!(metrics_defs::FAN_OUT_PARTIAL).increment(1);
                tracing::warn!(
                    operation = request.kind.name(),
                    "one backend failed; returning the successful side"
                );
            }
            ReconciledResult::Inconsistent { failed_backend } => {
                counter!(metrics_defs::FAN_OUT_FAILED).increment(1);
                tracing::error!(
                    operation = request.kind.name(),
                    backend = %failed_backend,
                    "split outcome rejected by policy"
                );
            }
            ReconciledResult::Rejected { status, .. } => {
                counter!(metrics_defs::FAN_OUT_FAILED).increment(1);
                tracing::warn!(
                    operation = request.kind.name(),
                    %status,
                    "both backends declined; passing first upstream error through"
                );
            }
            ReconciledResult::Unreachable { backends } => {
                counter!(metrics_defs::FAN_OUT_FAILED).increment(1);
                tracing::error!(
                    operation = request.kind.name(),
                    backends = ?backends,
                    "no backend reachable"
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{OperationKind, Payload};
    use crate::testutils::backend_config;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn success(body: &'static str) -> BackendOutcome {
        BackendOutcome::Success {
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn upstream_error(status: u16, body: &'static str) -> BackendOutcome {
        BackendOutcome::UpstreamError {
            status: StatusCode::from_u16(status).unwrap(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn transport_error() -> BackendOutcome {
        BackendOutcome::TransportError {
            cause: "connection refused".to_string(),
        }
    }

    fn named(backend: &str, outcome: BackendOutcome) -> NamedOutcome {
        NamedOutcome {
            backend: backend.to_string(),
            outcome,
        }
    }

    #[test]
    fn test_both_succeed_primary_body_wins() {
        let result = reconcile(
            ReconcilePolicy::FavorAvailability,
            named("DXB", success(r#"{"id":1}"#)),
            named("SG", success(r#"{"id":2}"#)),
        );
        assert_eq!(
            result,
            ReconciledResult::Replicated {
                body: Bytes::from_static(br#"{"id":1}"#)
            }
        );
        assert_eq!(result.status(), StatusCode::OK);
    }

    #[test]
    fn test_crud_partial_success_returns_surviving_body() {
        // Primary up, secondary down
        let result = reconcile(
            ReconcilePolicy::FavorAvailability,
            named("DXB", success(r#"{"id":1}"#)),
            named("SG", upstream_error(404, r#"{"error":"not found"}"#)),
        );
        assert_eq!(
            result,
            ReconciledResult::Partial {
                body: Bytes::from_static(br#"{"id":1}"#)
            }
        );

        // Roles swapped
        let result = reconcile(
            ReconcilePolicy::FavorAvailability,
            named("DXB", transport_error()),
            named("SG", success(r#"{"id":9}"#)),
        );
        assert_eq!(
            result,
            ReconciledResult::Partial {
                body: Bytes::from_static(br#"{"id":9}"#)
            }
        );
    }

    #[test]
    fn test_photo_partial_success_names_failed_backend() {
        let result = reconcile(
            ReconcilePolicy::AllOrNothing,
            named("DXB", success("{}")),
            named("SG", upstream_error(500, "oops")),
        );
        assert_eq!(
            result,
            ReconciledResult::Inconsistent {
                failed_backend: "SG".to_string()
            }
        );

        let result = reconcile(
            ReconcilePolicy::AllOrNothing,
            named("DXB", transport_error()),
            named("SG", success("{}")),
        );
        assert_eq!(
            result,
            ReconciledResult::Inconsistent {
                failed_backend: "DXB".to_string()
            }
        );
        assert_eq!(result.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_both_declined_primary_error_passes_through() {
        let result = reconcile(
            ReconcilePolicy::FavorAvailability,
            named("DXB", upstream_error(409, "conflict")),
            named("SG", upstream_error(422, "unprocessable")),
        );
        assert_eq!(
            result,
            ReconciledResult::Rejected {
                status: StatusCode::CONFLICT,
                body: Bytes::from_static(b"conflict"),
            }
        );
    }

    #[test]
    fn test_transport_failure_on_primary_still_surfaces_upstream_error() {
        // "First encountered" means the first UpstreamError in primary,
        // secondary order, skipping transport failures.
        let result = reconcile(
            ReconcilePolicy::FavorAvailability,
            named("DXB", transport_error()),
            named("SG", upstream_error(403, "forbidden")),
        );
        assert_eq!(
            result,
            ReconciledResult::Rejected {
                status: StatusCode::FORBIDDEN,
                body: Bytes::from_static(b"forbidden"),
            }
        );
    }

    #[test]
    fn test_both_unreachable_synthesizes_bad_gateway() {
        let result = reconcile(
            ReconcilePolicy::FavorAvailability,
            named("DXB", transport_error()),
            named("SG", transport_error()),
        );
        assert_eq!(
            result,
            ReconciledResult::Unreachable {
                backends: ["DXB".to_string(), "SG".to_string()]
            }
        );
        assert_eq!(result.status(), StatusCode::BAD_GATEWAY);
    }

    /// Invoker that replays scripted outcomes after a per-backend delay
    /// and records every call.
    struct ScriptedInvoker {
        outcomes: HashMap<String, BackendOutcome>,
        delays_ms: Mutex<HashMap<String, u64>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BackendInvoker for ScriptedInvoker {
        async fn invoke(
            &self,
            backend: &BackendConfig,
            _request: &OperationRequest,
            _credential: &Credential,
        ) -> BackendOutcome {
            let delay = self
                .delays_ms
                .lock()
                .unwrap()
                .get(&backend.name)
                .copied()
                .unwrap_or(0);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes[&backend.name].clone()
        }
    }

    fn crud_request() -> OperationRequest {
        OperationRequest {
            kind: OperationKind::CreateUser,
            payload: Payload::Json(Bytes::from_static(b"{}")),
        }
    }

    #[tokio::test]
    async fn test_dispatch_decides_once_after_both_complete_in_any_order() {
        // Sweep completion orderings: primary first, secondary first, and
        // near-simultaneous, across every outcome combination. Each trial
        // must produce exactly one decision and exactly two invocations.
        let outcome_variants = [
            success(r#"{"id":1}"#),
            upstream_error(404, "not found"),
            transport_error(),
        ];

        let mut trial = 0u64;
        for primary_outcome in &outcome_variants {
            for secondary_outcome in &outcome_variants {
                for _ in 0..12 {
                    let invoker = Arc::new(ScriptedInvoker {
                        outcomes: HashMap::from([
                            ("DXB".to_string(), primary_outcome.clone()),
                            ("SG".to_string(), secondary_outcome.clone()),
                        ]),
                        delays_ms: Mutex::new(HashMap::from([
                            ("DXB".to_string(), trial % 3),
                            ("SG".to_string(), (trial * 7 + 1) % 3),
                        ])),
                        calls: AtomicUsize::new(0),
                    });
                    trial += 1;

                    let coordinator = FanOutCoordinator::new(
                        invoker.clone(),
                        backend_config("DXB", 1),
                        backend_config("SG", 1),
                    );

                    let result = coordinator
                        .dispatch(&crud_request(), &Credential::new("tok"))
                        .await;

                    // Both calls always ran to completion before the decision
                    assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);

                    let expected = reconcile(
                        ReconcilePolicy::FavorAvailability,
                        named("DXB", primary_outcome.clone()),
                        named("SG", secondary_outcome.clone()),
                    );
                    assert_eq!(result, expected, "decision must not depend on timing");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_uses_operation_policy() {
        let invoker = Arc::new(ScriptedInvoker {
            outcomes: HashMap::from([
                ("DXB".to_string(), success("{}")),
                ("SG".to_string(), transport_error()),
            ]),
            delays_ms: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        });
        let coordinator = FanOutCoordinator::new(
            invoker,
            backend_config("DXB", 1),
            backend_config("SG", 1),
        );

        let photo = OperationRequest {
            kind: OperationKind::UpdatePhoto,
            payload: Payload::Json(Bytes::new()),
        };
        let result = coordinator.dispatch(&photo, &Credential::new("tok")).await;
        assert_eq!(
            result,
            ReconciledResult::Inconsistent {
                failed_backend: "SG".to_string()
            }
        );
    }
}
