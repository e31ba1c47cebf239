//! # 入庫判定 (Admission Controller)
//!
//! 新規オブジェクトの申告サイズと使用量スナップショットから
//! 受け入れ可否を判定するオーケストレーター。
//!
//! ## 既知のソフトリミット
//! 判定と書き込みはグローバルに直列化されない。単独では上限内の
//! 並行アップロード同士が、合計では上限を超えることがある。
//! これは意図した挙動であり、分散ロックで厳密化しない
//! （容量チェックはもともと近似的であり、可用性を優先する）。

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use onboard_types::AdmissionDecision;

use crate::error::GatewayError;
use crate::quota::QuotaAccountant;

/// オブジェクトキー中のファイル名部分の最大長
const MAX_KEY_NAME_LEN: usize = 120;

/// 入庫判定のオーケストレーター。
pub struct AdmissionController {
    /// 使用量の会計係。killスイッチ無効時はNone。
    quota: Option<Arc<QuotaAccountant>>,
    /// コンテナの最大許容量（バイト）
    max_container_bytes: u64,
    /// 容量チェックのkillスイッチ
    quota_check_enabled: bool,
}

impl AdmissionController {
    /// コントローラーを構築する。
    ///
    /// `quota_check_enabled`が真のとき`quota`はSomeであること
    /// （設定読み込みで保証される）。
    pub fn new(
        quota: Option<Arc<QuotaAccountant>>,
        max_container_bytes: u64,
        quota_check_enabled: bool,
    ) -> Self {
        Self {
            quota,
            max_container_bytes,
            quota_check_enabled,
        }
    }

    /// 申告サイズに対する入庫判定を行う。
    ///
    /// - killスイッチ無効時は計測に依存せず常に許可（明示的なオプトアウト経路）。
    /// - 超過判定は「使用量 + 申告サイズ > 上限」の厳密な大なり比較。
    ///   ちょうど満杯になるアップロードは許可される。
    /// - 容量超過は正常な判定値でありエラーにならない。エラーとして
    ///   伝播するのはインフラ障害（計測不能）のみ。
    pub async fn check_admission(
        &self,
        declared_bytes: u64,
    ) -> Result<AdmissionDecision, GatewayError> {
        if !self.quota_check_enabled {
            return Ok(AdmissionDecision {
                allowed: true,
                current_used_bytes: 0,
                max_allowed_bytes: self.max_container_bytes,
                declared_object_bytes: declared_bytes,
                would_exceed: false,
            });
        }

        let quota = self.quota.as_ref().ok_or_else(|| {
            GatewayError::Internal("使用量の会計係が構築されていません".to_string())
        })?;
        let current_used_bytes = quota.get_used_bytes(false).await?;

        // u64の桁あふれは「上限内に収まりようがない」ため超過として扱う
        let would_exceed = match current_used_bytes.checked_add(declared_bytes) {
            Some(total) => total > self.max_container_bytes,
            None => true,
        };

        Ok(AdmissionDecision {
            allowed: !would_exceed,
            current_used_bytes,
            max_allowed_bytes: self.max_container_bytes,
            declared_object_bytes: declared_bytes,
            would_exceed,
        })
    }

    /// アップロード完了の通知を受け、使用量スナップショットを破棄する。
    ///
    /// クライアントはオブジェクト書き込みの成功を確認した後にのみ呼ぶこと。
    /// キャッシュ値への加算は行わない（並行書き込みが重なると実態から
    /// ずれていくため、次の読み取りを実フェッチに強制する）。
    pub async fn notify_upload_completed(&self) {
        if let Some(quota) = &self.quota {
            quota.invalidate().await;
        }
    }
}

/// 新規オブジェクトのキーを生成する。
///
/// `(スコープ, カテゴリ, 元ファイル名, 現在時刻)`から決まる。
/// 元ファイル名は安全な文字集合にサニタイズされ、ミリ秒タイムスタンプと
/// UUID断片が前置されるため、同名ファイルの並行アップロードでも
/// キーは衝突しない（調整サービス不要）。
pub fn generate_object_key(scope: &str, category: &str, original_file_name: &str) -> String {
    let ts_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let uniq = uuid::Uuid::new_v4().simple().to_string();

    format!(
        "{}/{}/{}-{}-{}",
        sanitize_segment(scope),
        sanitize_segment(category),
        ts_millis,
        &uniq[..8],
        sanitize_file_name(original_file_name),
    )
}

/// キーのパスセグメント（スコープ・カテゴリ）をサニタイズする。
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "misc".to_string()
    } else {
        cleaned
    }
}

/// ファイル名を安全な文字集合`[A-Za-z0-9._-]`にサニタイズする。
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_KEY_NAME_LEN)
        .collect();
    // 全滅・ドットのみの名前はパス解釈され得るため固定名に落とす
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::test_support::MockMeter;

    const TTL: Duration = Duration::from_secs(900);
    const MAX: u64 = 1000;

    fn controller(meter: Arc<MockMeter>, enabled: bool) -> AdmissionController {
        let quota = Arc::new(QuotaAccountant::new(meter, TTL));
        AdmissionController::new(Some(quota), MAX, enabled)
    }

    /// killスイッチ無効時は計測を呼ばずに常に許可することを確認
    #[tokio::test]
    async fn test_kill_switch_always_allows() {
        let meter = MockMeter::with_steps(vec![Ok(999_999)]);
        let ctrl = controller(meter.clone(), false);

        for declared in [0, 1, MAX, u64::MAX] {
            let decision = ctrl.check_admission(declared).await.unwrap();
            assert!(decision.allowed);
            assert!(!decision.would_exceed);
            assert_eq!(decision.current_used_bytes, 0);
        }
        assert_eq!(meter.calls(), 0);
    }

    /// ちょうど満杯になるアップロードが許可されることを確認（境界値）
    #[tokio::test]
    async fn test_exact_fit_allowed() {
        let meter = MockMeter::with_steps(vec![Ok(900)]);
        let ctrl = controller(meter, true);

        let decision = ctrl.check_admission(100).await.unwrap();
        assert!(decision.allowed);
        assert!(!decision.would_exceed);
        assert_eq!(decision.current_used_bytes, 900);
        assert_eq!(decision.max_allowed_bytes, MAX);
        assert_eq!(decision.declared_object_bytes, 100);
    }

    /// 1バイトでも超過するアップロードが拒否されることを確認
    #[tokio::test]
    async fn test_exceeding_rejected_as_decision() {
        let meter = MockMeter::with_steps(vec![Ok(900)]);
        let ctrl = controller(meter, true);

        // 容量超過はErrではなく正常な判定値として返る
        let decision = ctrl.check_admission(101).await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.would_exceed);
    }

    /// u64の桁あふれが超過として扱われることを確認
    #[tokio::test]
    async fn test_overflow_treated_as_exceeding() {
        let meter = MockMeter::with_steps(vec![Ok(u64::MAX)]);
        let ctrl = AdmissionController::new(
            Some(Arc::new(QuotaAccountant::new(meter, TTL))),
            u64::MAX,
            true,
        );

        let decision = ctrl.check_admission(1).await.unwrap();
        assert!(decision.would_exceed);
        assert!(!decision.allowed);
    }

    /// エンドツーエンド: 判定 → 完了通知 → 再計測が反映された再判定
    #[tokio::test(start_paused = true)]
    async fn test_check_notify_recheck_scenario() {
        let meter = MockMeter::with_steps(vec![Ok(900), Ok(950)]);
        let ctrl = controller(meter.clone(), true);

        // 900 + 50 = 950 <= 1000 → 許可
        let decision = ctrl.check_admission(50).await.unwrap();
        assert!(decision.allowed);
        assert!(!decision.would_exceed);

        // アップロード完了 → スナップショット破棄 → 次の判定は950を再取得
        ctrl.notify_upload_completed().await;

        // 950 + 51 = 1001 > 1000 → 拒否
        let decision = ctrl.check_admission(51).await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.would_exceed);

        // 950 + 50 = 1000 → ちょうど満杯は許可（TTL内なので再計測なし）
        let decision = ctrl.check_admission(50).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(meter.calls(), 2);
    }

    /// エンドツーエンド: 計測停止からの復旧シナリオ
    #[tokio::test]
    async fn test_metering_outage_and_recovery() {
        let meter = MockMeter::with_steps(vec![Err("起動直後から停止"), Ok(100)]);
        let ctrl = controller(meter.clone(), true);

        // スナップショットが一度もない状態 → MeteringUnavailable
        let err = ctrl.check_admission(10).await.unwrap_err();
        assert!(matches!(err, GatewayError::MeteringUnavailable(_)));

        // 復旧後は成功し、TTL内の後続判定は再問い合わせしない
        assert!(ctrl.check_admission(10).await.unwrap().allowed);
        assert!(ctrl.check_admission(20).await.unwrap().allowed);
        assert_eq!(meter.calls(), 2);
    }

    /// 同一入力でもキーが衝突しないことを確認
    #[test]
    fn test_generate_object_key_unique() {
        let a = generate_object_key("tenant1", "contracts", "report.pdf");
        let b = generate_object_key("tenant1", "contracts", "report.pdf");
        assert_ne!(a, b);
        assert!(a.starts_with("tenant1/contracts/"));
        assert!(a.ends_with("-report.pdf"));
    }

    /// ファイル名のサニタイズを確認
    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("契約書 (最終版).pdf"), "_________.pdf");
        // 先頭の".."はそのまま残る（単一セグメントなのでパス走査にはならない）
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("report-v2_final.PDF"), "report-v2_final.PDF");
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name(".."), "file");
    }

    /// スコープ・カテゴリのサニタイズを確認
    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("tenant/1"), "tenant_1");
        assert_eq!(sanitize_segment(""), "misc");
        let key = generate_object_key("a/b", "c.d", "x.txt");
        // スコープ・カテゴリ内の区切り文字は潰され、階層は常に3段
        assert_eq!(key.matches('/').count(), 2);
    }
}
