//! # Ticket Scan Testing
//!
//! Testing utilities for reducers built on `ticket-scan-core`.
//!
//! This crate provides:
//! - A deterministic clock
//! - A Given-When-Then builder for reducer tests
//! - Helpers that run effect futures in-line and collect the actions they produce
//!
//! ## Example
//!
//! ```ignore
//! use ticket_scan_testing::{effects::run_effects, test_clock};
//!
//! #[tokio::test]
//! async fn test_decode_triggers_verification() {
//!     let env = test_environment();
//!     let mut state = armed_state();
//!
//!     let effects = ScanReducer::new().reduce(&mut state, decoded("abc123"), &env);
//!     let produced = run_effects(effects).await;
//!
//!     assert!(matches!(produced[0], ScanAction::VerificationCompleted { .. }));
//! }
//! ```


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of environment traits
pub mod mocks {
    use chrono::{DateTime, Utc};
    use ticket_scan_core::environment::Clock;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_scan_testing::mocks::FixedClock;
    /// use ticket_scan_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Running effects without a Store
pub mod effects {
    use ticket_scan_core::effect::Effect;

    /// Await every `Effect::Future` in order and collect the actions they produce
    ///
    /// Produced actions are returned, not reduced; feed them back into the
    /// reducer yourself to step through a flow.
    pub async fn run_effects<A, I>(effects: I) -> Vec<A>
    where
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut produced = Vec::new();

        for effect in effects {
            match effect {
                Effect::None => {},
                Effect::Future(fut) => {
                    if let Some(action) = fut.await {
                        produced.push(action);
                    }
                },
            }
        }

        produced
    }

    /// Count the effects that do real work
    #[must_use]
    pub fn future_count<A>(effects: &[Effect<A>]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Future(_)))
            .count()
    }
}

pub use mocks::{test_clock, FixedClock};
