use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{User2faRepository, UserRepository};
use crate::services::{PayloadCodec, TotpService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL コネクションプール
    pub db_pool: PgPool,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// ユーザーリポジトリ
    pub user_repo: UserRepository,
    /// 2FAレコードリポジトリ
    pub user_2fa_repo: User2faRepository,
    /// TOTPサービス
    pub totp_service: TotpService,
    /// ペイロード暗号化サービス
    pub payload_codec: PayloadCodec,
}

impl AppState {
    /// 新しい AppState を作成
    ///
    /// ペイロードキーの検証はここで行い、不正なら起動を中断させる。
    pub fn new(db_pool: PgPool, config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let user_repo = UserRepository::new(db_pool.clone());
        let user_2fa_repo = User2faRepository::new(db_pool.clone());
        let totp_service = TotpService::new(config.totp_issuer.clone(), config.totp_skew_steps);
        let payload_codec = PayloadCodec::new(config.payload_key.expose_secret())?;

        Ok(Self {
            db_pool,
            config,
            user_repo,
            user_2fa_repo,
            totp_service,
            payload_codec,
        })
    }
}
