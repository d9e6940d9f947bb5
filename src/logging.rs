use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "DEFECT_VISION_LOG";

/// ログ初期化
///
/// `DEFECT_VISION_LOG` があればそれを使い、なければ verbose で debug、通常は warn。
/// 出力は stderr（stdout は結果表示用）。
pub fn init(verbose: bool) {
    let default_filter = if verbose { "defect_vision=debug,info" } else { "warn" };
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| default_filter.to_string());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(EnvFilter::new(filter))
        .init();
}
