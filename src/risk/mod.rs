mod engine;

pub use engine::{RiskEngine, RiskLevel, ScoreResult};
