//! Scan session reducer.
//!
//! Permission gate, arming, the decode lock and verification outcomes all
//! live here. The reducer never does I/O; permission prompts and
//! verification calls are returned as effects.

use crate::actions::ScanAction;
use crate::environment::ScanEnvironment;
use crate::error::ScanError;
use crate::payload::decode_payload;
use crate::providers::{CameraAccess, TicketVerifier};
use crate::state::{Outcome, Permission, ScanState, TicketDetails};
use ticket_scan_core::environment::Clock;
use ticket_scan_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};

/// Reducer driving one scan screen.
#[derive(Debug, Clone)]
pub struct ScanReducer<C, V, K> {
    _phantom: std::marker::PhantomData<(C, V, K)>,
}

impl<C, V, K> ScanReducer<C, V, K> {
    /// Create a new scan reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<C, V, K> Default for ScanReducer<C, V, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, V, K> ScanReducer<C, V, K>
where
    C: CameraAccess,
    V: TicketVerifier,
    K: Clock,
{
    fn resolve(
        state: &mut ScanState,
        result: Result<Option<TicketDetails>, ScanError>,
        env: &ScanEnvironment<C, V, K>,
    ) {
        match &result {
            Ok(Some(details)) => {
                tracing::info!(from = %details.from, to = %details.to, "Scan accepted");
                metrics::counter!("scan.outcomes", "outcome" => "accepted").increment(1);
            },
            Ok(None) => {
                tracing::info!("Scan accepted without travel details");
                metrics::counter!("scan.outcomes", "outcome" => "accepted").increment(1);
            },
            Err(error) => {
                tracing::info!(%error, kind = error.kind(), "Scan rejected");
                metrics::counter!("scan.outcomes", "outcome" => "rejected", "kind" => error.kind())
                    .increment(1);
            },
        }

        state.last_outcome = match result {
            Ok(details) => Outcome::Accepted(details),
            Err(error) => Outcome::Rejected(error),
        };
        state.resolved_at = Some(env.clock.now());
    }
}

impl<C, V, K> Reducer for ScanReducer<C, V, K>
where
    C: CameraAccess + Clone + 'static,
    V: TicketVerifier + Clone + 'static,
    K: Clock,
{
    type State = ScanState;
    type Action = ScanAction;
    type Environment = ScanEnvironment<C, V, K>;

    #[allow(clippy::too_many_lines)] // one arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let effects = match action {
            // ═══════════════════════════════════════════════════════════════
            // StartSession: prompt for the camera once
            // ═══════════════════════════════════════════════════════════════
            ScanAction::StartSession => {
                if state.permission_requested {
                    tracing::debug!("Permission already requested");
                    return smallvec![Effect::None];
                }

                state.permission_requested = true;
                let camera = env.camera.clone();

                smallvec![Effect::future(async move {
                    let status = camera.request_permission().await;
                    Some(ScanAction::PermissionResolved { status })
                })]
            },

            // ═══════════════════════════════════════════════════════════════
            // PermissionResolved: set once, never revisited
            // ═══════════════════════════════════════════════════════════════
            ScanAction::PermissionResolved { status } => {
                if state.permission != Permission::Unknown {
                    tracing::warn!(?status, current = ?state.permission, "Permission already resolved");
                    return smallvec![Effect::None];
                }

                state.permission = status.into();
                if state.permission == Permission::Denied {
                    tracing::warn!("{}", ScanError::PermissionDenied);
                }
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Arm / Disarm
            // ═══════════════════════════════════════════════════════════════
            ScanAction::Arm => {
                if state.permission == Permission::Granted {
                    state.camera_armed = true;
                } else {
                    tracing::debug!(permission = ?state.permission, "Arm ignored without permission");
                }
                smallvec![Effect::None]
            },

            // In-flight verification keeps running; its result still lands
            ScanAction::Disarm => {
                state.camera_armed = false;
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // CodeDecoded: take the lock, then decode and verify
            // ═══════════════════════════════════════════════════════════════
            ScanAction::CodeDecoded { raw } => {
                if state.permission != Permission::Granted || !state.camera_armed || state.locked {
                    tracing::trace!(locked = state.locked, armed = state.camera_armed, "Decode suppressed");
                    metrics::counter!("scan.decodes.suppressed").increment(1);
                    return smallvec![Effect::None];
                }

                state.locked = true;

                match decode_payload(&raw) {
                    Err(error) => {
                        tracing::debug!(%error, "Scanned code rejected locally");
                        Self::resolve(state, Err(error), env);
                        smallvec![Effect::None]
                    },
                    Ok(request) => {
                        tracing::info!(uniq_id = %request.uniq_id, "Verifying scanned ticket");
                        state.in_flight = Some(request.clone());
                        state.verifications += 1;
                        metrics::counter!("scan.verifications.started").increment(1);

                        let verifier = env.verifier.clone();

                        smallvec![Effect::future(async move {
                            let result = verifier.verify(&request).await;
                            Some(ScanAction::VerificationCompleted { request, result })
                        })]
                    },
                }
            },

            // ═══════════════════════════════════════════════════════════════
            // VerificationCompleted: resolve the in-flight request
            // ═══════════════════════════════════════════════════════════════
            ScanAction::VerificationCompleted { request, result } => {
                if state.in_flight.as_ref() != Some(&request) {
                    tracing::warn!(uniq_id = %request.uniq_id, "Result without matching request ignored");
                    return smallvec![Effect::None];
                }

                state.in_flight = None;
                Self::resolve(state, result, env);
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // ScanAgain: clear the result and release the lock
            // ═══════════════════════════════════════════════════════════════
            ScanAction::ScanAgain => {
                if state.last_outcome.is_none() {
                    tracing::debug!("Nothing to dismiss");
                    return smallvec![Effect::None];
                }

                state.last_outcome = Outcome::None;
                state.resolved_at = None;
                state.locked = false;
                smallvec![Effect::None]
            },
        };

        debug_assert!(state.is_consistent(), "inconsistent scan state: {state:?}");
        effects
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mocks::{MockCameraAccess, MockTicketVerifier};
    use crate::state::{PermissionStatus, SessionPhase, TicketId, VerificationRequest};
    use proptest::prelude::*;
    use ticket_scan_testing::effects::run_effects;
    use ticket_scan_testing::mocks::{test_clock, FixedClock};
    use ticket_scan_testing::{assertions, ReducerTest};

    type TestReducer = ScanReducer<MockCameraAccess, MockTicketVerifier, FixedClock>;
    type TestEnv = ScanEnvironment<MockCameraAccess, MockTicketVerifier, FixedClock>;

    fn details() -> TicketDetails {
        TicketDetails {
            from: "Chișinău".into(),
            to: "Iași".into(),
            date: crate::state::TravelDate::parse("2024-05-01"),
            name: "Ana".into(),
            surname: "Pop".into(),
        }
    }

    fn env_with(verifier: MockTicketVerifier) -> TestEnv {
        ScanEnvironment::new(MockCameraAccess::granting(), verifier, test_clock())
    }

    fn env() -> TestEnv {
        env_with(MockTicketVerifier::accepting(details()))
    }

    fn granted() -> ScanState {
        ScanState {
            permission: Permission::Granted,
            permission_requested: true,
            ..ScanState::default()
        }
    }

    fn armed() -> ScanState {
        ScanState {
            camera_armed: true,
            ..granted()
        }
    }

    fn abc123() -> VerificationRequest {
        VerificationRequest {
            uniq_id: TicketId::Text("abc123".into()),
        }
    }

    #[test]
    fn test_start_session_requests_permission_once() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(ScanState::default())
            .when_action(ScanAction::StartSession)
            .then_state(|state| {
                assert!(state.permission_requested);
                assert_eq!(state.phase(), SessionPhase::AwaitingPermission);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();

        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(ScanState::default())
            .when_action(ScanAction::StartSession)
            .when_action(ScanAction::StartSession)
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn test_permission_effect_asks_camera() {
        let camera = MockCameraAccess::denying();
        let env = ScanEnvironment::new(camera.clone(), MockTicketVerifier::accepting(details()), test_clock());
        let mut state = ScanState::default();

        let effects = TestReducer::new().reduce(&mut state, ScanAction::StartSession, &env);
        let produced = run_effects(effects).await;

        assert_eq!(camera.request_count(), 1);
        assert_eq!(
            produced,
            vec![ScanAction::PermissionResolved {
                status: PermissionStatus::Denied
            }]
        );
    }

    #[test]
    fn test_permission_is_set_once() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(ScanState::default())
            .when_action(ScanAction::PermissionResolved { status: PermissionStatus::Denied })
            .when_action(ScanAction::PermissionResolved { status: PermissionStatus::Granted })
            .then_state(|state| assert_eq!(state.phase(), SessionPhase::Denied))
            .run();
    }

    #[test]
    fn test_arm_requires_permission() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(ScanState {
                permission: Permission::Denied,
                ..ScanState::default()
            })
            .when_action(ScanAction::Arm)
            .then_state(|state| {
                assert!(!state.camera_armed);
                assert_eq!(state.phase(), SessionPhase::Denied);
            })
            .run();

        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(granted())
            .when_action(ScanAction::Arm)
            .then_state(|state| assert_eq!(state.phase(), SessionPhase::Armed))
            .run();
    }

    #[test]
    fn test_decode_while_disarmed_is_ignored() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(granted())
            .when_action(ScanAction::decoded(r#"{"uniq_id":"abc123"}"#))
            .then_state(|state| assert_eq!(*state, granted()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_decode_locks_and_verifies() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded(r#"{"uniq_id":"abc123"}"#))
            .then_state(|state| {
                assert!(state.locked);
                assert_eq!(state.in_flight, Some(abc123()));
                assert_eq!(state.verifications, 1);
                assert_eq!(state.phase(), SessionPhase::Verifying);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_second_decode_while_locked_is_ignored() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded(r#"{"uniq_id":"abc123"}"#))
            .when_action(ScanAction::decoded(r#"{"uniq_id":"other"}"#))
            .then_state(|state| {
                assert_eq!(state.in_flight, Some(abc123()));
                assert_eq!(state.verifications, 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_malformed_code_rejects_without_call() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded("not-json"))
            .then_state(|state| {
                assert!(state.locked);
                assert_eq!(state.in_flight, None);
                assert_eq!(state.verifications, 0);
                assert_eq!(state.last_outcome, Outcome::Rejected(ScanError::MalformedPayload));
                assert_eq!(state.resolved_at, Some(test_clock().now()));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_missing_identifier_rejects_without_call() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded(r#"{"seat":4}"#))
            .then_state(|state| {
                assert_eq!(state.last_outcome, Outcome::Rejected(ScanError::MissingIdentifier));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn test_verification_effect_reports_result() {
        let verifier = MockTicketVerifier::failing(ScanError::VerificationRejected { status: 404 });
        let env = env_with(verifier.clone());
        let mut state = armed();

        let effects = TestReducer::new().reduce(
            &mut state,
            ScanAction::decoded(r#"{"uniq_id":"abc123"}"#),
            &env,
        );
        let produced = run_effects(effects).await;

        assert_eq!(verifier.calls(), vec![abc123()]);
        assert_eq!(
            produced,
            vec![ScanAction::VerificationCompleted {
                request: abc123(),
                result: Err(ScanError::VerificationRejected { status: 404 }),
            }]
        );
    }

    #[test]
    fn test_completion_resolves_outcome() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded(r#"{"uniq_id":"abc123"}"#))
            .when_action(ScanAction::VerificationCompleted {
                request: abc123(),
                result: Ok(Some(details())),
            })
            .then_state(|state| {
                assert!(state.locked);
                assert_eq!(state.in_flight, None);
                assert_eq!(state.last_outcome, Outcome::Accepted(Some(details())));
                assert_eq!(state.phase(), SessionPhase::Resolved);
            })
            .run();
    }

    #[test]
    fn test_acceptance_without_details_still_resolves() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded(r#"{"uniq_id":"abc123"}"#))
            .when_action(ScanAction::VerificationCompleted {
                request: abc123(),
                result: Ok(None),
            })
            .then_state(|state| {
                assert_eq!(state.last_outcome, Outcome::Accepted(None));
                assert_eq!(state.last_outcome.headline(), Some("Done"));
                assert_eq!(state.phase(), SessionPhase::Resolved);
                assert!(state.is_consistent());
            })
            .run();
    }

    #[test]
    fn test_stray_completion_is_ignored() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::VerificationCompleted {
                request: abc123(),
                result: Ok(Some(details())),
            })
            .then_state(|state| assert_eq!(*state, armed()))
            .run();
    }

    #[test]
    fn test_disarm_keeps_in_flight_call() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded(r#"{"uniq_id":"abc123"}"#))
            .when_action(ScanAction::Disarm)
            .when_action(ScanAction::VerificationCompleted {
                request: abc123(),
                result: Err(ScanError::TransportFailure("connection refused".into())),
            })
            .then_state(|state| {
                assert!(!state.camera_armed);
                assert!(matches!(
                    state.last_outcome,
                    Outcome::Rejected(ScanError::TransportFailure(_))
                ));
            })
            .run();
    }

    #[test]
    fn test_scan_again_unlocks() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded("not-json"))
            .when_action(ScanAction::ScanAgain)
            .then_state(|state| {
                assert!(!state.locked);
                assert!(state.last_outcome.is_none());
                assert_eq!(state.resolved_at, None);
                assert_eq!(state.phase(), SessionPhase::Armed);
            })
            .run();
    }

    #[test]
    fn test_scan_again_does_not_cancel_verification() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(armed())
            .when_action(ScanAction::decoded(r#"{"uniq_id":"abc123"}"#))
            .when_action(ScanAction::ScanAgain)
            .then_state(|state| {
                assert!(state.locked);
                assert_eq!(state.phase(), SessionPhase::Verifying);
            })
            .run();
    }

    fn any_action() -> impl Strategy<Value = ScanAction> {
        let raw = prop_oneof![
            Just(r#"{"uniq_id":"abc123"}"#.to_string()),
            Just(r#"{"uniq_id":42}"#.to_string()),
            Just("not-json".to_string()),
            Just("{}".to_string()),
            ".{0,16}",
        ];
        let status = prop_oneof![Just(PermissionStatus::Granted), Just(PermissionStatus::Denied)];
        let results: Vec<Result<Option<TicketDetails>, ScanError>> = vec![
            Ok(Some(details())),
            Ok(None),
            Err(ScanError::VerificationRejected { status: 404 }),
            Err(ScanError::TransportFailure("timeout".into())),
        ];
        let result = prop::sample::select(results);

        prop_oneof![
            Just(ScanAction::StartSession),
            Just(ScanAction::Arm),
            Just(ScanAction::Disarm),
            Just(ScanAction::ScanAgain),
            raw.prop_map(|raw| ScanAction::CodeDecoded { raw }),
            status.prop_map(|status| ScanAction::PermissionResolved { status }),
            result.prop_map(|result| ScanAction::VerificationCompleted { request: abc123(), result }),
        ]
    }

    proptest! {
        #[test]
        fn prop_state_stays_consistent(actions in prop::collection::vec(any_action(), 1..40)) {
            let reducer = TestReducer::new();
            let env = env();
            let mut state = ScanState::default();

            for action in actions {
                let before = state.clone();
                let was_locked = state.locked;
                let decode = matches!(action, ScanAction::CodeDecoded { .. });

                let _ = reducer.reduce(&mut state, action, &env);

                prop_assert!(state.is_consistent(), "{:?}", state);
                prop_assert!(state.verifications <= before.verifications + 1);
                if decode && was_locked {
                    prop_assert_eq!(&state, &before);
                }
                if before.permission != Permission::Unknown {
                    prop_assert_eq!(state.permission, before.permission);
                }
            }
        }
    }
}
