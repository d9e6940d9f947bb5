//! defect-vision
//!
//! 製品画像のAI外観検査。解析結果を検査セッションに集計し、
//! 保存・プッシュフィードでの同期・HTMLレポート出力を行う。

pub mod ai_provider;
pub mod analyzer;
pub mod auth;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod report;
pub mod scanner;
pub mod session;
pub mod store;

pub use defect_vision_common as common;
