// Reconciliation of pending forecasts against realised prices
pub mod evaluator;

pub use evaluator::{
    resolve_outcome, EvaluationFailure, EvaluationReport, EvaluatorSettings, OutcomeEvaluator,
    StreamEvaluation,
};
