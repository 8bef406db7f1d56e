//! 缓存后台清扫线程
//!
//! 按固定间隔对注册的缓存调用 `sweep_expired`。清扫与读路径使用同一个
//! 过期判定 (`CacheEntry::is_expired_at`)。

use super::filter_cache::FilterSpecCache;
use super::query_cache::QueryResultCache;
use super::store::CacheStore;
use crate::Result;
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// 可被清扫的缓存
pub trait Sweepable: Send + Sync {
    fn tier(&self) -> &str;

    /// 清理已过期条目，返回清理数量
    fn sweep_expired(&self) -> usize;
}

impl<V: Clone + Send + Sync> Sweepable for CacheStore<V> {
    fn tier(&self) -> &str {
        CacheStore::tier(self)
    }

    fn sweep_expired(&self) -> usize {
        CacheStore::sweep_expired(self)
    }
}

impl<V: Clone + Send + Sync> Sweepable for QueryResultCache<V> {
    fn tier(&self) -> &str {
        self.store().tier()
    }

    fn sweep_expired(&self) -> usize {
        self.store().sweep_expired()
    }
}

impl<S: Clone + Send + Sync> Sweepable for FilterSpecCache<S> {
    fn tier(&self) -> &str {
        self.store().tier()
    }

    fn sweep_expired(&self) -> usize {
        self.store().sweep_expired()
    }
}

/// 立即清扫一轮，返回总清理数量
pub fn sweep_all(targets: &[Arc<dyn Sweepable>]) -> usize {
    targets.iter().map(|t| t.sweep_expired()).sum()
}

/// 后台清扫器 (drop 时停止)
pub struct CacheSweeper {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl CacheSweeper {
    /// 启动后台清扫线程
    pub fn start(targets: Vec<Arc<dyn Sweepable>>, interval: Duration) -> Result<Self> {
        let (tx, rx) = bounded::<()>(1);

        let handle = std::thread::Builder::new()
            .name("datacore-cache-sweeper".to_string())
            .spawn(move || {
                log::info!(
                    "Cache sweeper started (interval: {:?}, caches: {})",
                    interval,
                    targets.len()
                );

                loop {
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            for target in &targets {
                                let removed = target.sweep_expired();
                                if removed > 0 {
                                    log::debug!(
                                        "Swept {} expired entries from {} cache",
                                        removed,
                                        target.tier()
                                    );
                                }
                            }
                        }
                        // 收到停止信号或发送端已释放
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                log::info!("Cache sweeper stopped");
            })?;

        Ok(Self {
            shutdown: Some(tx),
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// 停止清扫线程并等待退出
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Cache sweeper thread panicked");
            }
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
