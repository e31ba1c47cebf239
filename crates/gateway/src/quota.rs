//! # 使用量の会計係 (Quota Accountant)
//!
//! コンテナ使用量のTTLキャッシュ付きビューを所有する。
//! 計測エンドポイントは遅く・レート制限され得るため、リクエストごとの
//! 問い合わせは行わず、スナップショットをTTLの間再利用する。
//!
//! ## フォールバック方針
//! 計測の失敗時、過去のスナップショット（期限切れでも）があればそれを返す。
//! 計測呼び出しの失敗を理由に全アップロードを拒否するより、
//! 多少古い使用量で判定を続ける方が被害が小さい（可用性優先）。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::storage::UsageMeter;

/// 使用量のスナップショット。置き換えのみで、生成後に変更されない。
#[derive(Debug, Clone, Copy)]
pub struct QuotaSnapshot {
    /// 計測エンドポイントが報告した集計バイト数
    pub used_bytes: u64,
    /// 取得時刻
    pub captured_at: Instant,
}

impl QuotaSnapshot {
    /// スナップショットがTTL内（fresh）かどうか。
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.captured_at.elapsed() < ttl
    }
}

/// 使用量の会計係。
///
/// スナップショットは常に高々1つ（最新優先）。並行するリフレッシュは
/// 重複した計測呼び出しになり得るが、書き込みは単一の代入であり
/// 「最後に完了したフェッチが勝つ」以上の影響はない。
pub struct QuotaAccountant {
    /// 使用量計測クライアント
    meter: Arc<dyn UsageMeter>,
    /// スナップショットのTTL
    ttl: Duration,
    /// 現在のスナップショット。absent（None）/ fresh / stale の3状態。
    snapshot: RwLock<Option<QuotaSnapshot>>,
}

impl QuotaAccountant {
    /// 計測クライアントとTTLから会計係を構築する。
    pub fn new(meter: Arc<dyn UsageMeter>, ttl: Duration) -> Self {
        Self {
            meter,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// コンテナ使用量（バイト）を返す。
    ///
    /// 1. `force_refresh`でなくfreshなスナップショットがあれば即座に返す
    ///    （ネットワーク呼び出しなし）。
    /// 2. それ以外は計測エンドポイントに問い合わせ、成功すれば
    ///    スナップショットを置き換えて返す。
    /// 3. 計測失敗時: スナップショットがあれば（期限切れでも）警告を記録して
    ///    その値を返す。一度も取得できていなければ`MeteringUnavailable`。
    pub async fn get_used_bytes(&self, force_refresh: bool) -> Result<u64, GatewayError> {
        if !force_refresh {
            if let Some(snap) = *self.snapshot.read().await {
                if snap.is_fresh(self.ttl) {
                    return Ok(snap.used_bytes);
                }
            }
        }

        // 計測呼び出し中はロックを保持しない。並行リフレッシュは
        // 最後に完了した書き込みが勝つ。
        match self.meter.fetch_usage().await {
            Ok(totals) => {
                let used_bytes = totals.used_bytes();
                let mut slot = self.snapshot.write().await;
                *slot = Some(QuotaSnapshot {
                    used_bytes,
                    captured_at: Instant::now(),
                });
                Ok(used_bytes)
            }
            Err(e) => {
                if let Some(snap) = *self.snapshot.read().await {
                    tracing::warn!(
                        used_bytes = snap.used_bytes,
                        age_secs = snap.captured_at.elapsed().as_secs(),
                        error = %e,
                        "使用量の再取得に失敗。期限切れスナップショットで継続します（degraded mode）"
                    );
                    return Ok(snap.used_bytes);
                }
                Err(e)
            }
        }
    }

    /// スナップショットを無条件に破棄する（absent状態に戻す）。
    ///
    /// 次の`get_used_bytes`はTTLの残りに関係なく計測エンドポイントに
    /// 問い合わせる。アップロード完了の通知後に呼ばれ、直前に追加された
    /// バイト数を次の判定が見落とさないようにする。
    pub async fn invalidate(&self) {
        let mut slot = self.snapshot.write().await;
        *slot = None;
    }
}
