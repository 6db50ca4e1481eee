#![cfg(feature = "serde")]

use dstruct::simulate::GraphType;
use dstruct::{DualAscentState, EnsembleConfig, LearnerConfig, ModelConfig, SemType, StopReason};

#[test]
fn roundtrip_ensemble_config_json() {
    let mut config = EnsembleConfig::default();
    config.learner.model.sem_type = SemType::Sobolev;
    config.learner.model.lambda1 = 0.05;
    config.k = 3;

    let json = serde_json::to_string(&config).unwrap();
    let back: EnsembleConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn sem_type_uses_lowercase_names() {
    assert_eq!(serde_json::to_string(&SemType::Mlp).unwrap(), "\"mlp\"");
    let parsed: SemType = serde_json::from_str("\"sobolev\"").unwrap();
    assert_eq!(parsed, SemType::Sobolev);
    assert!(serde_json::from_str::<SemType>("\"unknown\"").is_err());
}

#[test]
fn missing_fields_take_defaults() {
    let config: LearnerConfig =
        serde_json::from_str(r#"{ "model": { "dim": 7 }, "w_threshold": 0.2 }"#).unwrap();
    assert_eq!(config.model.dim, 7);
    assert_eq!(config.model.nonlinear_dims, vec![10, 10, 1]);
    assert_eq!(config.w_threshold, 0.2);
    assert_eq!(config.solver.max_iter, 1000);
}

#[test]
fn unknown_sem_type_in_model_config_is_rejected() {
    let parsed = serde_json::from_str::<ModelConfig>(r#"{ "dim": 4, "sem_type": "unknown" }"#);
    assert!(parsed.is_err());
    let parsed =
        serde_json::from_str::<LearnerConfig>(r#"{ "model": { "sem_type": "gp" } }"#);
    assert!(parsed.is_err());
}

#[test]
fn state_and_outcome_types_serialize() {
    let mut state = DualAscentState::new(10.0, 2.5);
    state.h_prev = 0.125;
    let json = serde_json::to_string(&state).unwrap();
    let back: DualAscentState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);

    let json = serde_json::to_string(&StopReason::RhoCeiling).unwrap();
    assert_eq!(serde_json::from_str::<StopReason>(&json).unwrap(), StopReason::RhoCeiling);
    let json = serde_json::to_string(&GraphType::ScaleFree).unwrap();
    assert_eq!(serde_json::from_str::<GraphType>(&json).unwrap(), GraphType::ScaleFree);
}
