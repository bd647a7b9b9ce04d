//! AI 算法模块（带连吃前瞻的启发式选线）。

pub mod advisor;

pub use advisor::{AiAgent, AiConfig, AiDecision};
