//! # キャッシュ掃除タスク (Cache Janitor)
//!
//! ダウンロードURLキャッシュから失効済みエントリを定期的に取り除く
//! バックグラウンドタスク。失効エントリは読み取り時にも無視されるため
//! 正しさには関与せず、長時間稼働プロセスのメモリ増加を抑えるだけの
//! 純粋なハウスキーピング。
//!
//! Gatewayのライフサイクルに所有される: 状態構築後にspawnされ、
//! シャットダウン時に明示的に停止される。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::credentials::CredentialIssuer;

/// 稼働中の掃除タスクへのハンドル。
pub struct CacheJanitor {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl CacheJanitor {
    /// 指定間隔で`sweep_expired`を実行するタスクをspawnする。
    pub fn spawn(issuer: Arc<CredentialIssuer>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = issuer.sweep_expired().await;
                        if evicted > 0 {
                            tracing::info!(evicted, "失効した認証情報キャッシュを削除しました");
                        } else {
                            tracing::debug!("認証情報キャッシュに失効エントリはありません");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("キャッシュ掃除タスクを停止します");
                        break;
                    }
                }
            }
        });

        Self {
            handle,
            shutdown_tx,
        }
    }

    /// 停止を通知し、タスクの終了を待つ。
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockSigner;

    const MARGIN: Duration = Duration::from_secs(60);

    /// 定期実行が失効エントリを削除することを確認
    #[tokio::test(start_paused = true)]
    async fn test_janitor_sweeps_on_interval() {
        let issuer = Arc::new(CredentialIssuer::new(MockSigner::new(), MARGIN));

        // キャッシュ期限 600 − 60 = 540秒のエントリを1件入れる
        issuer.issue_download_url("k", 600, true).await.unwrap();
        assert_eq!(issuer.cache_len().await, 1);

        let janitor = CacheJanitor::spawn(issuer.clone(), Duration::from_secs(300));

        // 1周目（t≈300秒）: まだ有効なので残る
        tokio::time::advance(Duration::from_secs(301)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(issuer.cache_len().await, 1);

        // 2周目（t≈600秒）: 失効済みなので削除される
        tokio::time::advance(Duration::from_secs(300)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(issuer.cache_len().await, 0);

        janitor.shutdown().await;
    }

    /// shutdownがタスクを確実に終了させることを確認
    #[tokio::test(start_paused = true)]
    async fn test_janitor_shutdown() {
        let issuer = Arc::new(CredentialIssuer::new(MockSigner::new(), MARGIN));
        let janitor = CacheJanitor::spawn(issuer.clone(), Duration::from_secs(300));

        janitor.shutdown().await;

        // 停止後は時間が進んでもsweepされない（ハンドルは既に終了済み）
        issuer.issue_download_url("k", 600, true).await.unwrap();
        tokio::time::advance(Duration::from_secs(3600)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(issuer.cache_len().await, 1);
    }
}
