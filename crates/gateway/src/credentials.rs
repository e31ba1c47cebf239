//! # 認証情報の発行係 (Credential Issuer)
//!
//! オブジェクトキーに対する時限付き署名URLを発行する。
//!
//! ## キャッシュの非対称性
//! - ダウンロードURL: 同一オブジェクトへの再要求が多く、再発行は冪等。
//!   署名呼び出しの節約のためオブジェクトキー単位でキャッシュする。
//! - アップロードURL: オブジェクトバージョンごとに一度しか使われない。
//!   キャッシュすると内容が既に変わったオブジェクトへのURLを配る恐れが
//!   あるため、常に新規発行する。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::storage::ObjectSigner;

/// 発行済みダウンロードURL。
///
/// `expires_at`は署名の真の有効期限であり、キャッシュから返る場合も
/// 発行時に記録された値がそのまま返る（再計算して過大申告しない）。
#[derive(Debug, Clone)]
pub struct IssuedDownloadUrl {
    /// 署名付きURL
    pub url: String,
    /// 署名の有効期限（UNIXタイムスタンプ）
    pub expires_at: u64,
}

/// ダウンロードURLキャッシュのエントリ。生成後は変更されず、置き換えのみ。
#[derive(Debug, Clone)]
struct CredentialCacheEntry {
    /// 署名付きURL
    url: String,
    /// キャッシュ上の有効期限。署名の真の有効期限より安全マージン分だけ早く、
    /// キャッシュから配られるURLの残り有効期間が必ずマージン以上になる。
    expires_at: Instant,
    /// 署名の真の有効期限（UNIXタイムスタンプ）。クライアントへの申告用。
    signature_expires_at: u64,
}

impl CredentialCacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 認証情報の発行係。
///
/// キャッシュはプロセス全体の共有状態であり、複数リクエストから
/// 並行に読み書きされる。書き込みはエントリ単位の単一代入で、
/// ロックを外部呼び出し（署名）の間保持することはない。
pub struct CredentialIssuer {
    /// URL署名クライアント
    signer: Arc<dyn ObjectSigner>,
    /// キャッシュ有効期限の安全マージン
    safety_margin: Duration,
    /// ダウンロードURLキャッシュ（オブジェクトキー単位）
    download_cache: RwLock<HashMap<String, CredentialCacheEntry>>,
}

impl CredentialIssuer {
    /// 署名クライアントと安全マージンから発行係を構築する。
    pub fn new(signer: Arc<dyn ObjectSigner>, safety_margin: Duration) -> Self {
        Self {
            signer,
            safety_margin,
            download_cache: RwLock::new(HashMap::new()),
        }
    }

    /// 署名付きアップロードURL（PUT）を発行する。常に新規生成し、キャッシュしない。
    pub async fn issue_upload_url(
        &self,
        object_key: &str,
        content_type: &str,
        ttl_secs: u32,
    ) -> Result<String, GatewayError> {
        self.signer
            .presign_put(object_key, content_type, ttl_secs)
            .await
    }

    /// 署名付きダウンロードURL（GET）を発行する。
    ///
    /// `use_cache`が真で未失効のキャッシュエントリがあればそれを返す。
    /// それ以外は新規に署名し、`now + ttl − 安全マージン`を期限として
    /// キャッシュに格納する。失効済みエントリは読み取り時に無視される
    /// （掃除タスクを待たない）。
    ///
    /// 返却される`expires_at`は署名の真の有効期限。キャッシュヒット時も
    /// 発行時に記録した値を返し、残り有効期間を過大に申告しない。
    pub async fn issue_download_url(
        &self,
        object_key: &str,
        ttl_secs: u32,
        use_cache: bool,
    ) -> Result<IssuedDownloadUrl, GatewayError> {
        if use_cache {
            let cache = self.download_cache.read().await;
            if let Some(entry) = cache.get(object_key) {
                if !entry.is_expired(Instant::now()) {
                    return Ok(IssuedDownloadUrl {
                        url: entry.url.clone(),
                        expires_at: entry.signature_expires_at,
                    });
                }
            }
        }

        // 署名呼び出し中はロックを保持しない
        let url = self.signer.presign_get(object_key, ttl_secs).await?;

        let signature_expires_at = unix_now_secs()? + u64::from(ttl_secs);

        let cache_ttl = Duration::from_secs(u64::from(ttl_secs)).saturating_sub(self.safety_margin);
        if !cache_ttl.is_zero() {
            let entry = CredentialCacheEntry {
                url: url.clone(),
                expires_at: Instant::now() + cache_ttl,
                signature_expires_at,
            };
            let mut cache = self.download_cache.write().await;
            cache.insert(object_key.to_string(), entry);
        }

        Ok(IssuedDownloadUrl {
            url,
            expires_at: signature_expires_at,
        })
    }

    /// 失効済みエントリをすべて削除し、削除件数を返す。
    ///
    /// 冪等であり、読み書きと並行して実行しても安全。正しさには不要
    /// （読み取り時に失効エントリは無視される）だが、長時間稼働での
    /// メモリ増加を抑える。
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut cache = self.download_cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| !entry.is_expired(now));
        before - cache.len()
    }

    /// キャッシュ中のエントリ数（失効済み含む）。
    #[cfg(test)]
    pub(crate) async fn cache_len(&self) -> usize {
        self.download_cache.read().await.len()
    }
}

/// 現在時刻のUNIXタイムスタンプ（秒）。
fn unix_now_secs() -> Result<u64, GatewayError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| GatewayError::Internal(format!("時刻取得失敗: {e}")))
}
