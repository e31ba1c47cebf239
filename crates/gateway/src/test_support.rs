//! # テスト用共通モック
//!
//! quota, credentials, admission, endpointsの各テストで共有する
//! `UsageMeter` / `ObjectSigner`のモック実装。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use onboard_types::UsageTotals;

use crate::admission::AdmissionController;
use crate::config::{GatewayConfig, GatewayState};
use crate::credentials::CredentialIssuer;
use crate::error::GatewayError;
use crate::quota::QuotaAccountant;
use crate::storage::{ObjectSigner, UsageMeter};

/// テスト用のGateway設定。コンテナ上限1000バイト、単一アップロード上限1024バイト。
pub fn test_config(quota_check_enabled: bool) -> GatewayConfig {
    GatewayConfig {
        max_container_bytes: 1000,
        quota_cache_ttl_secs: 900,
        credential_cache_margin_secs: 60,
        quota_check_enabled,
        presign_expiry_secs: 3600,
        max_upload_bytes: 1024,
        janitor_interval_secs: 300,
        metering_endpoint: None,
        metering_timeout_secs: 10,
        listen_addr: "127.0.0.1:0".to_string(),
    }
}

/// モックを差し込んだテスト用GatewayStateを構築する。
pub fn test_state(
    meter: Arc<MockMeter>,
    signer: Arc<MockSigner>,
    quota_check_enabled: bool,
) -> Arc<GatewayState> {
    let config = test_config(quota_check_enabled);
    let quota = Arc::new(QuotaAccountant::new(
        meter,
        Duration::from_secs(config.quota_cache_ttl_secs),
    ));
    let admission = AdmissionController::new(
        Some(quota.clone()),
        config.max_container_bytes,
        config.quota_check_enabled,
    );
    let credentials = Arc::new(CredentialIssuer::new(
        signer,
        Duration::from_secs(config.credential_cache_margin_secs),
    ));

    Arc::new(GatewayState {
        config,
        quota: Some(quota),
        admission,
        credentials,
    })
}

/// スクリプト化された計測モック。
///
/// `with_steps`で与えた応答を順に返し、呼び出し回数を記録する。
/// スクリプトを使い切った後はコンテナとの疎通が想定外に起きたことを
/// 意味するためpanicする。
pub struct MockMeter {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<u64, String>>>,
}

impl MockMeter {
    /// 応答スクリプト（Okは使用量バイト、Errは障害メッセージ）からモックを作る。
    pub fn with_steps(steps: Vec<Result<u64, &str>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(
                steps
                    .into_iter()
                    .map(|s| s.map_err(str::to_string))
                    .collect(),
            ),
        })
    }

    /// これまでの計測呼び出し回数。
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl UsageMeter for MockMeter {
    async fn fetch_usage(&self) -> Result<UsageTotals, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("計測スクリプトの応答が不足しています");
        match step {
            Ok(used_bytes) => Ok(UsageTotals {
                payload_bytes: used_bytes,
                metadata_bytes: 0,
                object_count: 0,
            }),
            Err(msg) => Err(GatewayError::MeteringUnavailable(msg)),
        }
    }
}

/// URL署名のモック。
///
/// 呼び出しごとに連番入りのURLを返すため、新規生成とキャッシュ再利用を
/// URL文字列の比較で区別できる。`set_failing(true)`で署名障害を再現する。
pub struct MockSigner {
    put_calls: AtomicUsize,
    get_calls: AtomicUsize,
    failing: AtomicBool,
}

impl MockSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            put_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    /// これまでのPUT署名回数。
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// これまでのGET署名回数。
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// 署名を失敗させるかを切り替える。
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<(), GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(GatewayError::UrlGeneration(
                "モック署名クライアントが失敗に設定されています".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ObjectSigner for MockSigner {
    async fn presign_put(
        &self,
        object_key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError> {
        self.check_failing()?;
        let n = self.put_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "http://mock-storage/put/{object_key}?ct={content_type}&exp={expiry_secs}&sig={n}"
        ))
    }

    async fn presign_get(
        &self,
        object_key: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError> {
        self.check_failing()?;
        let n = self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "http://mock-storage/get/{object_key}?exp={expiry_secs}&sig={n}"
        ))
    }
}
