use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use time::{Duration, OffsetDateTime};

use crate::error::AppError;
use crate::services::base32;

type HmacSha1 = Hmac<Sha1>;

/// RFC 6238 の時間ステップ（秒）
const PERIOD_SECS: u64 = 30;
/// コード桁数
const DIGITS: u32 = 6;
/// シークレットのエントロピー（160ビット）
const SECRET_LEN: usize = 20;

/// TOTP (Time-based One-Time Password) サービス
///
/// RFC 4226 / RFC 6238 準拠の手書き実装。
/// HMAC-SHA1、6桁、30秒ステップ固定。
///
/// # Security
/// - シークレット平文はログに出力しない
#[derive(Clone)]
pub struct TotpService {
    issuer: String,
    /// 検証時に許容する前後の時間ステップ数（クロックずれ対策）
    skew_steps: u8,
}

impl TotpService {
    pub fn new(issuer: String, skew_steps: u8) -> Self {
        Self { issuer, skew_steps }
    }

    /// 20バイトのランダムシークレットを生成し、Base32でエンコード
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        base32::encode(&bytes)
    }

    /// 認証アプリ登録用の otpauth URI を構築
    ///
    /// QRコード描画は呼び出し側の責務。
    pub fn provisioning_uri(&self, account: &str, secret: &str) -> String {
        // ラベルは <issuer>:<account> 形式。区切りのコロンは
        // リテラルのまま残し、各要素のみエンコードする。
        format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
            urlencoding::encode(&self.issuer),
            urlencoding::encode(account),
            secret,
            urlencoding::encode(&self.issuer),
            DIGITS,
            PERIOD_SECS,
        )
    }

    /// TOTPコードを検証（現在時刻）
    ///
    /// # Note
    /// 前後 `skew_steps` ステップの時間ウィンドウを許容（既定±30秒）
    pub fn verify_code(&self, secret_base32: &str, code: &str) -> Result<bool, AppError> {
        self.verify_code_at(secret_base32, code, unix_now()?)
    }

    /// TOTPコードを検証（時刻指定）
    ///
    /// 形式不正（6桁の数字でない）は例外ではなく `Ok(false)`。
    /// シークレットに有効な Base32 文字が1つもない場合のみ Err。
    pub fn verify_code_at(
        &self,
        secret_base32: &str,
        code: &str,
        now_unix: u64,
    ) -> Result<bool, AppError> {
        let code = code.trim();
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let secret = base32::decode(secret_base32)?;
        let counter = (now_unix / PERIOD_SECS) as i64;
        let skew = i64::from(self.skew_steps);

        // counter-skew ..= counter+skew を順に照合し、最初の一致で受理
        for step in (counter - skew)..=(counter + skew) {
            if step < 0 {
                continue;
            }
            if derive_code(&secret, step as u64)? == code {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// 指定時刻のTOTPコードを導出
    pub fn generate_code_at(&self, secret_base32: &str, now_unix: u64) -> Result<String, AppError> {
        let secret = base32::decode(secret_base32)?;
        derive_code(&secret, now_unix / PERIOD_SECS)
    }
}

/// HOTP コード導出（RFC 4226）
///
/// 1. カウンタを8バイトビッグエンディアンでシリアライズ
/// 2. HMAC-SHA1(secret, counter) → 20バイトダイジェスト
/// 3. 動的トランケーション: offset = digest[19] & 0x0F、
///    offset から4バイトを取り先頭バイトの最上位ビットをマスク
/// 4. 10^6 で剰余を取り6桁ゼロ埋め
fn derive_code(secret: &[u8], counter: u64) -> Result<String, AppError> {
    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC初期化エラー: {}", e)))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    let code = binary % 10u32.pow(DIGITS);
    Ok(format!("{:0width$}", code, width = DIGITS as usize))
}

/// 信頼ウィンドウの判定
///
/// `enabled && verified` かつ最終検証からの経過が `window_minutes`
/// 以内（境界含む）の場合のみ、再チャレンジなしで許可する。
/// それ以外の組み合わせはすべて再チャレンジ要求。
pub fn is_within_trust_window(
    enabled: bool,
    verified: bool,
    last_verification_at: Option<OffsetDateTime>,
    window_minutes: i64,
    now: OffsetDateTime,
) -> bool {
    if !enabled || !verified {
        return false;
    }
    let Some(last) = last_verification_at else {
        return false;
    };
    now - last <= Duration::minutes(window_minutes)
}

/// 現在のUnix時刻（秒）を取得
fn unix_now() -> Result<u64, AppError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("システム時刻取得エラー: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 6238 Appendix B のテストキー "12345678901234567890" を Base32 で表現
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn create_test_service() -> TotpService {
        TotpService::new("TestApp".to_string(), 1)
    }

    #[test]
    fn test_generate_secret() {
        let secret = TotpService::generate_secret();
        // Base32エンコードされた20バイト = 32文字
        assert_eq!(secret.len(), 32);
        assert!(
            secret
                .chars()
                .all(|c| "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567".contains(c))
        );
    }

    #[test]
    fn test_rfc_secret_decodes_to_rfc_key() {
        // 定数がRFCのキーそのものであることを固定（エンコードミス防止）
        assert_eq!(
            crate::services::base32::decode(RFC_SECRET).unwrap(),
            b"12345678901234567890"
        );
    }

    #[test]
    fn test_rfc6238_vectors() {
        let service = create_test_service();
        // RFC 6238 Appendix B（SHA1、8桁の下6桁）
        assert_eq!(service.generate_code_at(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(
            service.generate_code_at(RFC_SECRET, 1111111109).unwrap(),
            "081804"
        );
        assert_eq!(
            service.generate_code_at(RFC_SECRET, 1234567890).unwrap(),
            "005924"
        );
        assert_eq!(
            service.generate_code_at(RFC_SECRET, 2000000000).unwrap(),
            "279037"
        );
    }

    #[test]
    fn test_derive_code_is_deterministic() {
        let service = create_test_service();
        let a = service.generate_code_at(RFC_SECRET, 1111111109).unwrap();
        let b = service.generate_code_at(RFC_SECRET, 1111111109).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_window_acceptance() {
        let service = create_test_service();
        let now = 1111111109u64;

        // counter N-1 / N / N+1 のコードは受理
        for t in [now - 30, now, now + 30] {
            let code = service.generate_code_at(RFC_SECRET, t).unwrap();
            assert!(
                service.verify_code_at(RFC_SECRET, &code, now).unwrap(),
                "t={} のコードが拒否された",
                t
            );
        }

        // counter N-2 / N+2 のコードは拒否
        for t in [now - 60, now + 60] {
            let code = service.generate_code_at(RFC_SECRET, t).unwrap();
            assert!(
                !service.verify_code_at(RFC_SECRET, &code, now).unwrap(),
                "t={} のコードが受理された",
                t
            );
        }
    }

    #[test]
    fn test_verify_invalid_code_format() {
        let service = create_test_service();
        // 桁数・文字種の不正は例外ではなく false
        assert!(!service.verify_code_at(RFC_SECRET, "12a45", 59).unwrap());
        assert!(!service.verify_code_at(RFC_SECRET, "12345", 59).unwrap());
        assert!(!service.verify_code_at(RFC_SECRET, "1234567", 59).unwrap());
        assert!(!service.verify_code_at(RFC_SECRET, "", 59).unwrap());
    }

    #[test]
    fn test_verify_strips_whitespace() {
        let service = create_test_service();
        assert!(
            service
                .verify_code_at(RFC_SECRET, "  287082  ", 59)
                .unwrap()
        );
    }

    #[test]
    fn test_verify_invalid_secret() {
        let service = create_test_service();
        let result = service.verify_code_at("!!!", "123456", 59);
        assert!(matches!(result, Err(AppError::InvalidSecretFormat)));
    }

    #[test]
    fn test_provisioning_uri() {
        let service = TotpService::new("My App".to_string(), 1);
        let uri = service.provisioning_uri("user@example.com", "JBSWY3DPEHPK3PXP");
        // ラベルの区切りコロンはエンコードしない
        assert!(uri.starts_with("otpauth://totp/My%20App:user%40example.com?"));
        assert!(uri.contains("secret=JBSWY3DPEHPK3PXP"));
        assert!(uri.contains("issuer=My%20App"));
        assert!(uri.contains("algorithm=SHA1"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }

    #[test]
    fn test_trust_window_boundary() {
        let now = OffsetDateTime::now_utc();

        // ちょうど180分は境界含みで許可
        assert!(is_within_trust_window(
            true,
            true,
            Some(now - Duration::minutes(180)),
            180,
            now
        ));
        // 181分は再チャレンジ
        assert!(!is_within_trust_window(
            true,
            true,
            Some(now - Duration::minutes(181)),
            180,
            now
        ));
    }

    #[test]
    fn test_trust_window_requires_all_flags() {
        let now = OffsetDateTime::now_utc();
        let recent = Some(now - Duration::minutes(1));

        assert!(!is_within_trust_window(false, true, recent, 180, now));
        assert!(!is_within_trust_window(true, false, recent, 180, now));
        assert!(!is_within_trust_window(true, true, None, 180, now));
    }
}
