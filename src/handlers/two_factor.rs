use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;
use crate::services::TotpService;
use crate::services::payload::SealedPayload;
use crate::services::totp::is_within_trust_window;
use crate::state::AppState;

// === 2FA Setup ===

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub secret: String,
    pub otpauth_uri: String,
}

/// POST /api/2fa/setup
///
/// 2FA設定を開始（シークレット生成、otpauth URI返却）
///
/// 処理フロー:
/// 1. ユーザー存在確認
/// 2. 有効化済みなら拒否、PENDING は上書きで再生成
/// 3. シークレット生成・保存（enabled=false）
/// 4. レスポンスを封緘して返却
///
/// # Security
/// - シークレット平文はログ出力禁止
/// - 再生成すると旧シークレットは無効になる
pub async fn setup_2fa(
    State(state): State<AppState>,
    Json(request): Json<SetupRequest>,
) -> Result<Json<SealedPayload>, AppError> {
    let user = find_user(&state, request.user_id).await?;

    // 既に2FA設定済みかチェック
    if let Some(existing) = state.user_2fa_repo.find_by_user_id(user.id).await? {
        if existing.enabled {
            return Err(AppError::TotpAlreadyEnabled);
        }
    }

    // シークレット生成・保存（PENDING の残骸は単一文で上書き）
    let secret = TotpService::generate_secret();
    state.user_2fa_repo.upsert_pending(user.id, &secret).await?;

    let otpauth_uri = state.totp_service.provisioning_uri(&user.email, &secret);

    tracing::info!(user_id = %user.id, "2FA設定開始");

    let response = SetupResponse {
        secret,
        otpauth_uri,
    };
    Ok(Json(state.payload_codec.seal(&response)?))
}

// === 2FA Verify（初回検証で有効化） ===

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub user_id: Uuid,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub enabled: bool,
}

/// POST /api/2fa/verify
///
/// 2FA設定確認（初回コード検証で PENDING → ACTIVE）
///
/// # Security
/// - コードはログ出力禁止
pub async fn verify_2fa(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<SealedPayload>, AppError> {
    validate_totp_code(&request.code)?;

    let user_2fa = state
        .user_2fa_repo
        .find_by_user_id(request.user_id)
        .await?
        .ok_or(AppError::TotpNotEnabled)?;

    if user_2fa.enabled {
        return Err(AppError::TotpAlreadyEnabled);
    }

    if !state
        .totp_service
        .verify_code(&user_2fa.secret, &request.code)?
    {
        return Err(AppError::TotpInvalid);
    }

    // 有効化（verified と検証時刻も同時に記録）
    state.user_2fa_repo.activate(request.user_id).await?;

    tracing::info!(user_id = %request.user_id, "2FA有効化完了");

    Ok(Json(
        state.payload_codec.seal(&VerifyResponse { enabled: true })?,
    ))
}

// === 2FA Challenge（有効化済みユーザーの再検証） ===

#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    pub user_id: Uuid,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub verified: bool,
}

/// POST /api/2fa/challenge
///
/// 有効化済みユーザーのコード検証。
/// ログイン時・パスワードリセット時・信頼ウィンドウ切れの
/// 特権操作時に呼び出される。成功すると verified=true と
/// 検証時刻を記録し、信頼ウィンドウが再開する。
pub async fn challenge_2fa(
    State(state): State<AppState>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Json<SealedPayload>, AppError> {
    validate_totp_code(&request.code)?;

    let user_2fa = state
        .user_2fa_repo
        .find_by_user_id(request.user_id)
        .await?
        .ok_or(AppError::TotpNotEnabled)?;

    if !user_2fa.enabled {
        return Err(AppError::TotpNotEnabled);
    }

    if !state
        .totp_service
        .verify_code(&user_2fa.secret, &request.code)?
    {
        return Err(AppError::TotpInvalid);
    }

    state.user_2fa_repo.mark_verified(request.user_id).await?;

    tracing::info!(user_id = %request.user_id, "2FAチャレンジ成功");

    Ok(Json(
        state
            .payload_codec
            .seal(&ChallengeResponse { verified: true })?,
    ))
}

// === 2FA Disable ===

#[derive(Debug, Deserialize)]
pub struct DisableRequest {
    pub user_id: Uuid,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct DisableResponse {
    pub disabled: bool,
}

/// POST /api/2fa/disable
///
/// 2FA無効化（シークレット・フラグを破棄して UNCONFIGURED へ）
///
/// # Security
/// - TOTPコード確認必須
/// - 管理者層は自身で無効化できない（エンジンではなくここで拒否）
pub async fn disable_2fa(
    State(state): State<AppState>,
    Json(request): Json<DisableRequest>,
) -> Result<Json<SealedPayload>, AppError> {
    validate_totp_code(&request.code)?;

    let user = find_user(&state, request.user_id).await?;

    if user.is_admin_tier() {
        tracing::warn!(user_id = %user.id, role = %user.role, "管理者層の2FA無効化を拒否");
        return Err(AppError::TotpDisableForbidden);
    }

    let user_2fa = state
        .user_2fa_repo
        .find_by_user_id(user.id)
        .await?
        .ok_or(AppError::TotpNotEnabled)?;

    if !user_2fa.enabled {
        return Err(AppError::TotpNotEnabled);
    }

    if !state
        .totp_service
        .verify_code(&user_2fa.secret, &request.code)?
    {
        return Err(AppError::TotpInvalid);
    }

    state.user_2fa_repo.delete(user.id).await?;

    tracing::info!(user_id = %user.id, "2FA無効化完了");

    Ok(Json(
        state
            .payload_codec
            .seal(&DisableResponse { disabled: true })?,
    ))
}

// === 2FA Status ===

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub enabled: bool,
    pub verified: bool,
    /// 信頼ウィンドウ外であればフレッシュなチャレンジが必要
    pub challenge_required: bool,
}

/// GET /api/2fa/status/{user_id}
///
/// 2FA状態と、特権操作にチャレンジが必要かどうかを返す。
/// 信頼ウィンドウは設定値（既定180分）。
pub async fn status_2fa(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<SealedPayload>, AppError> {
    find_user(&state, user_id).await?;

    let user_2fa = state.user_2fa_repo.find_by_user_id(user_id).await?;

    let (enabled, verified, last_verification_at) = match &user_2fa {
        Some(tfa) => (tfa.enabled, tfa.verified, tfa.last_verification_at),
        None => (false, false, None),
    };

    let trusted = is_within_trust_window(
        enabled,
        verified,
        last_verification_at,
        state.config.totp_trust_window_mins,
        OffsetDateTime::now_utc(),
    );

    let response = StatusResponse {
        enabled,
        verified,
        challenge_required: !trusted,
    };
    Ok(Json(state.payload_codec.seal(&response)?))
}

// === Helper Functions ===

/// TOTPコードバリデーション
fn validate_totp_code(code: &str) -> Result<(), AppError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::Validation("認証コードは必須です".to_string()));
    }
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "認証コードは6桁の数字で入力してください".to_string(),
        ));
    }
    Ok(())
}

/// ユーザーを取得（存在しなければ 404）
async fn find_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .user_repo
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::UserNotFound)
}
