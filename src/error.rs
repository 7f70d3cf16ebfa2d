use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),

    #[error("ユーザーが見つかりません")]
    UserNotFound,

    #[error("認証コードが無効です")]
    TotpInvalid,

    #[error("二要素認証は既に有効です")]
    TotpAlreadyEnabled,

    #[error("二要素認証が有効化されていません")]
    TotpNotEnabled,

    #[error("管理者ロールは二要素認証を無効化できません")]
    TotpDisableForbidden,

    #[error("シークレットの形式が不正です")]
    InvalidSecretFormat,

    #[error("ペイロード暗号化キーが不正です: {0}")]
    PayloadKeyInvalid(String),

    #[error("ペイロードの復号に失敗しました")]
    DecryptionFailed,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::UserNotFound => (
                StatusCode::NOT_FOUND,
                "ユーザーが見つかりません".to_string(),
            ),
            // コード不一致と期限切れは区別せずに返す（オラクル防止）
            Self::TotpInvalid => (
                StatusCode::UNAUTHORIZED,
                "認証コードが正しくありません".to_string(),
            ),
            Self::TotpAlreadyEnabled => {
                (StatusCode::CONFLICT, "二要素認証は既に有効です".to_string())
            }
            Self::TotpNotEnabled => (
                StatusCode::BAD_REQUEST,
                "二要素認証が有効化されていません".to_string(),
            ),
            Self::TotpDisableForbidden => (
                StatusCode::FORBIDDEN,
                "管理者ロールは二要素認証を無効化できません".to_string(),
            ),
            Self::InvalidSecretFormat => {
                tracing::error!("保存されたシークレットの形式が不正");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::PayloadKeyInvalid(msg) => {
                tracing::error!(reason = %msg, "ペイロード暗号化キーが不正");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::DecryptionFailed => (
                StatusCode::BAD_REQUEST,
                "ペイロードの復号に失敗しました".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
