//! 日志初始化
//!
//! 宿主进程调用一次。`RUST_LOG` 已设置时优先于配置中的级别。

use crate::utils::config::LoggingConfig;

/// 初始化 env_logger，重复调用返回 false
pub fn init_logging(config: &LoggingConfig) -> bool {
    let initialized = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.level.as_str()),
    )
    .try_init()
    .is_ok();

    if initialized {
        log::info!("Logging initialized (default level: {})", config.level);
    }
    initialized
}
