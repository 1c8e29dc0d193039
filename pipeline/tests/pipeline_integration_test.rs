//! End-to-end tests for the decision pipeline
//!
//! Drives `DecisionPipeline::run` against deterministic fake classifiers and
//! scripted arbiters:
//! - Scenarios A–D (accept, agreement, arbitrated, safe default)
//! - Secondary/arbiter call counts on each branch
//! - Error propagation from either classifier
//! - Stage records per request
//! - Idempotence and concurrent requests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use gate_pipeline::{
    ArbitrationFailure, DecisionPipeline, DecisionReport, FailureKind, InputText, Label,
    MemorySink, PipelineConfig, PipelineError, PipelineServices, PrimaryService, RawScore,
    Resolution, ScriptedArbiter, SecondaryService, ServiceError, ServiceKind, SharedEventSink,
    Stage, ZeroShotResponse,
};

/// Primary fake: fixed top label and confidence
struct FakePrimary {
    response: Result<Vec<RawScore>, ServiceError>,
    calls: AtomicUsize,
}

impl FakePrimary {
    fn predicting(label: Label, confidence: f64) -> Arc<Self> {
        // runner-up scores half the winner so the top entry is always `label`
        let (neg, pos) = match label {
            Label::Negative => (confidence, confidence / 2.0),
            Label::Positive => (confidence / 2.0, confidence),
        };
        Arc::new(Self {
            response: Ok(vec![
                RawScore::new("LABEL_0", neg),
                RawScore::new("LABEL_1", pos),
            ]),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: ServiceError) -> Arc<Self> {
        Arc::new(Self {
            response: Err(err),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrimaryService for FakePrimary {
    async fn predict(
        &self,
        _text: &str,
        _max_length: usize,
    ) -> Result<Vec<RawScore>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Secondary fake: fixed ranking
struct FakeSecondary {
    response: Result<ZeroShotResponse, ServiceError>,
    calls: AtomicUsize,
}

impl FakeSecondary {
    fn predicting(label: Label, confidence: f64) -> Arc<Self> {
        let other = match label {
            Label::Negative => Label::Positive,
            Label::Positive => Label::Negative,
        };
        Self::raw(vec![label.to_string(), other.to_string()], vec![confidence, 1.0 - confidence])
    }

    fn raw(labels: Vec<String>, scores: Vec<f64>) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(ZeroShotResponse::new(labels, scores)),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: ServiceError) -> Arc<Self> {
        Arc::new(Self {
            response: Err(err),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondaryService for FakeSecondary {
    async fn predict(
        &self,
        _text: &str,
        _candidate_labels: &[&str],
    ) -> Result<ZeroShotResponse, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

struct Harness {
    pipeline: DecisionPipeline,
    primary: Arc<FakePrimary>,
    secondary: Arc<FakeSecondary>,
    arbiter: Arc<ScriptedArbiter>,
    records: Arc<MemorySink>,
}

fn harness(
    primary: Arc<FakePrimary>,
    secondary: Arc<FakeSecondary>,
    arbiter: ScriptedArbiter,
) -> Harness {
    let arbiter = Arc::new(arbiter);
    let records = Arc::new(MemorySink::new());
    let sink: SharedEventSink = records.clone();
    let pipeline = DecisionPipeline::new(
        &PipelineConfig::default(),
        PipelineServices {
            primary: primary.clone(),
            secondary: secondary.clone(),
            arbiter: arbiter.clone(),
        },
        sink,
    )
    .expect("default config is valid");

    Harness {
        pipeline,
        primary,
        secondary,
        arbiter,
        records,
    }
}

fn input(text: &str) -> InputText {
    InputText::new(text).unwrap()
}

// ── Scenarios ──────────────────────────────────────────────────────────

/// Scenario A: confident primary is accepted as-is
#[tokio::test]
async fn test_scenario_a_confident_primary_skips_fallback() {
    let h = harness(
        FakePrimary::predicting(Label::Positive, 0.92),
        FakeSecondary::predicting(Label::Negative, 0.99),
        ScriptedArbiter::default(),
    );

    let state = h.pipeline.run(input("An instant classic.")).await.unwrap();

    assert!(!state.fallback_needed());
    assert_eq!(state.final_label(), Label::Positive);
    assert!(state.secondary().is_none());
    assert_eq!(state.resolution(), Resolution::Accepted);
    assert_eq!(h.secondary.calls(), 0);
    assert_eq!(h.arbiter.calls(), 0);
}

/// Scenario B: low confidence, secondary agrees
#[tokio::test]
async fn test_scenario_b_agreement_accepts_without_arbitration() {
    let h = harness(
        FakePrimary::predicting(Label::Negative, 0.55),
        FakeSecondary::predicting(Label::Negative, 0.81),
        ScriptedArbiter::answering(["POSITIVE"]),
    );

    let state = h.pipeline.run(input("Not my thing.")).await.unwrap();

    assert!(state.fallback_needed());
    assert_eq!(state.final_label(), Label::Negative);
    assert_eq!(state.secondary().unwrap().confidence, 0.81);
    assert_eq!(state.resolution(), Resolution::Agreement);
    assert_eq!(h.secondary.calls(), 1);
    assert_eq!(h.arbiter.calls(), 0);
}

/// Scenario C: disagreement, arbiter names a valid label
#[tokio::test]
async fn test_scenario_c_valid_arbitration_overrides_both_models() {
    let h = harness(
        FakePrimary::predicting(Label::Positive, 0.40),
        FakeSecondary::predicting(Label::Negative, 0.77),
        ScriptedArbiter::answering(["POSITIVE"]),
    );

    let state = h.pipeline.run(input("Weird but I liked it?")).await.unwrap();

    assert_eq!(state.final_label(), Label::Positive);
    assert_eq!(state.secondary().unwrap().label, Label::Negative);
    assert_eq!(state.resolution(), Resolution::Arbitrated);
    assert_eq!(h.arbiter.calls(), 1);

    let asked = &h.arbiter.requests()[0];
    assert_eq!(asked.primary.label, Label::Positive);
    assert_eq!(asked.primary.confidence, 0.40);
    assert_eq!(asked.secondary.label, Label::Negative);
    assert_eq!(asked.secondary.confidence, 0.77);
    assert_eq!(asked.request_id, state.id());
}

/// Scenario D: disagreement, arbiter answers nonsense
#[tokio::test]
async fn test_scenario_d_invalid_arbitration_keeps_secondary() {
    let h = harness(
        FakePrimary::predicting(Label::Positive, 0.40),
        FakeSecondary::predicting(Label::Negative, 0.77),
        ScriptedArbiter::answering(["maybe"]),
    );

    let state = h.pipeline.run(input("Weird but I liked it?")).await.unwrap();

    assert_eq!(state.final_label(), Label::Negative);
    assert_eq!(
        state.resolution(),
        Resolution::SafeDefault {
            reason: ArbitrationFailure::InvalidResponse
        }
    );
    // never re-prompts
    assert_eq!(h.arbiter.calls(), 1);
}

#[tokio::test]
async fn test_lowercase_arbitration_answer_is_accepted() {
    let h = harness(
        FakePrimary::predicting(Label::Negative, 0.30),
        FakeSecondary::predicting(Label::Positive, 0.60),
        ScriptedArbiter::answering(["  negative "]),
    );

    let state = h.pipeline.run(input("hmm")).await.unwrap();
    assert_eq!(state.final_label(), Label::Negative);
    assert_eq!(state.resolution(), Resolution::Arbitrated);
}

#[tokio::test]
async fn test_exhausted_arbiter_uses_safe_default() {
    let h = harness(
        FakePrimary::predicting(Label::Negative, 0.30),
        FakeSecondary::predicting(Label::Positive, 0.60),
        ScriptedArbiter::default(),
    );

    let state = h.pipeline.run(input("hmm")).await.unwrap();
    assert_eq!(state.final_label(), Label::Positive);
    assert_eq!(
        state.resolution(),
        Resolution::SafeDefault {
            reason: ArbitrationFailure::ArbiterUnavailable
        }
    );
}

// ── Gate boundary ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_secondary_called_iff_below_threshold() {
    let cases = [(0.70, 0), (0.95, 0), (1.0, 0), (0.6999, 1), (0.5, 1), (0.0, 1)];
    for (confidence, expect_calls) in cases {
        let h = harness(
            FakePrimary::predicting(Label::Positive, confidence),
            FakeSecondary::predicting(Label::Positive, 0.9),
            ScriptedArbiter::default(),
        );

        let state = h.pipeline.run(input("text")).await.unwrap();

        assert_eq!(
            h.secondary.calls(),
            expect_calls,
            "confidence {confidence} should call secondary {expect_calls} time(s)"
        );
        assert_eq!(state.fallback_needed(), expect_calls == 1);
        assert_eq!(state.secondary().is_some(), state.fallback_needed());
    }
}

#[tokio::test]
async fn test_completed_records_are_internally_consistent() {
    let confidences = [0.05, 0.40, 0.6999, 0.70, 0.92];
    let answers = ["POSITIVE", "negative", "maybe", ""];

    for primary_label in [Label::Negative, Label::Positive] {
        for secondary_label in [Label::Negative, Label::Positive] {
            for confidence in confidences {
                for answer in answers {
                    let h = harness(
                        FakePrimary::predicting(primary_label, confidence),
                        FakeSecondary::predicting(secondary_label, 0.8),
                        ScriptedArbiter::answering([answer]),
                    );
                    let state = h.pipeline.run(input("text")).await.unwrap();

                    assert_eq!(state.fallback_needed(), state.primary().confidence < 0.70);
                    assert_eq!(state.secondary().is_some(), state.fallback_needed());
                    match state.resolution() {
                        Resolution::Accepted => {
                            assert!(!state.fallback_needed());
                            assert_eq!(state.final_label(), state.primary().label);
                        }
                        Resolution::Agreement => {
                            let secondary = state.secondary().unwrap();
                            assert_eq!(secondary.label, state.primary().label);
                            assert_eq!(state.final_label(), secondary.label);
                        }
                        Resolution::Arbitrated => {
                            assert_ne!(state.secondary().unwrap().label, state.primary().label);
                            assert_eq!(Label::parse_answer(answer), Some(state.final_label()));
                        }
                        Resolution::SafeDefault { .. } => {
                            let secondary = state.secondary().unwrap();
                            assert_ne!(secondary.label, state.primary().label);
                            assert_eq!(state.final_label(), secondary.label);
                        }
                    }
                }
            }
        }
    }
}

// ── Error propagation ──────────────────────────────────────────────────

#[tokio::test]
async fn test_primary_unavailable_propagates() {
    let h = harness(
        FakePrimary::failing(ServiceError::Unavailable("connection refused".into())),
        FakeSecondary::predicting(Label::Positive, 0.9),
        ScriptedArbiter::default(),
    );

    let err = h.pipeline.run(input("text")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ServiceUnavailable);
    assert_eq!(err.service(), ServiceKind::Primary);
    assert_eq!(h.primary.calls(), 1, "no retries");
    assert_eq!(h.secondary.calls(), 0);
    assert!(h.records.is_empty());
}

#[tokio::test]
async fn test_secondary_unavailable_propagates() {
    let h = harness(
        FakePrimary::predicting(Label::Positive, 0.4),
        FakeSecondary::failing(ServiceError::Unavailable("503".into())),
        ScriptedArbiter::answering(["POSITIVE"]),
    );

    let err = h.pipeline.run(input("text")).await.unwrap_err();

    assert_eq!(
        err,
        PipelineError::ServiceUnavailable {
            service: ServiceKind::Secondary,
            message: "503".into()
        }
    );
    assert_eq!(h.secondary.calls(), 1, "no retries");
    assert_eq!(h.arbiter.calls(), 0);
}

#[tokio::test]
async fn test_secondary_out_of_set_label_is_malformed() {
    let h = harness(
        FakePrimary::predicting(Label::Positive, 0.4),
        FakeSecondary::raw(vec!["NEUTRAL".into(), "POSITIVE".into()], vec![0.7, 0.3]),
        ScriptedArbiter::answering(["POSITIVE"]),
    );

    let err = h.pipeline.run(input("text")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::MalformedResponse);
    assert_eq!(err.service(), ServiceKind::Secondary);
    assert_eq!(h.arbiter.calls(), 0);
}

#[tokio::test]
async fn test_primary_unknown_label_is_malformed() {
    let primary = Arc::new(FakePrimary {
        response: Ok(vec![RawScore::new("LABEL_3", 0.99)]),
        calls: AtomicUsize::new(0),
    });
    let h = harness(
        primary,
        FakeSecondary::predicting(Label::Positive, 0.9),
        ScriptedArbiter::default(),
    );

    let err = h.pipeline.run(input("text")).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::MalformedResponse);
    assert_eq!(err.service(), ServiceKind::Primary);
}

// ── Records ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_every_stage_records_at_least_once() {
    let h = harness(
        FakePrimary::predicting(Label::Positive, 0.40),
        FakeSecondary::predicting(Label::Negative, 0.77),
        ScriptedArbiter::answering(["POSITIVE"]),
    );

    let state = h.pipeline.run(input("review")).await.unwrap();
    let records = h.records.records();

    for stage in [Stage::Inference, Stage::ConfidenceCheck, Stage::Fallback] {
        assert!(
            records.iter().any(|r| r.stage == stage),
            "missing record for {stage}"
        );
    }
    assert!(records.iter().all(|r| r.request_id == state.id()));

    let types: Vec<&str> = records.iter().map(|r| r.event.event_type()).collect();
    assert_eq!(
        types,
        vec![
            "primary_classified",
            "gate_evaluated",
            "secondary_classified",
            "arbitration_requested",
            "arbitration_accepted",
        ]
    );
}

#[tokio::test]
async fn test_confident_path_records_one_per_stage() {
    let h = harness(
        FakePrimary::predicting(Label::Negative, 0.97),
        FakeSecondary::predicting(Label::Negative, 0.9),
        ScriptedArbiter::default(),
    );

    h.pipeline.run(input("Dreadful.")).await.unwrap();

    let stages: Vec<Stage> = h.records.records().iter().map(|r| r.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::Inference, Stage::ConfidenceCheck, Stage::Fallback]
    );
}

// ── Idempotence and concurrency ────────────────────────────────────────

#[tokio::test]
async fn test_identical_runs_yield_identical_state() {
    let h = harness(
        FakePrimary::predicting(Label::Positive, 0.40),
        FakeSecondary::predicting(Label::Negative, 0.77),
        ScriptedArbiter::answering(["maybe", "maybe"]),
    );

    let first = h.pipeline.run(input("Same text")).await.unwrap();
    let second = h.pipeline.run(input("Same text")).await.unwrap();

    assert_ne!(first.id(), second.id());
    assert!(first.same_decision(&second));
    assert_eq!(
        DecisionReport::from(&first).to_string(),
        DecisionReport::from(&second).to_string()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_independent() {
    let h = harness(
        FakePrimary::predicting(Label::Positive, 0.40),
        FakeSecondary::predicting(Label::Positive, 0.66),
        ScriptedArbiter::default(),
    );
    let pipeline = Arc::new(h.pipeline);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run(input(&format!("review {i}"))).await })
        })
        .collect();

    for handle in handles {
        let state = handle.await.unwrap().unwrap();
        assert_eq!(state.final_label(), Label::Positive);
        assert_eq!(state.resolution(), Resolution::Agreement);
    }
    assert_eq!(h.primary.calls(), 16);
    assert_eq!(h.secondary.calls(), 16);
}
