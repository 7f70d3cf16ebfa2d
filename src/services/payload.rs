use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// 暗号化済みレスポンスボディ
///
/// `payload` は `hex(iv) + ":" + hex(ciphertext)` 形式のエンベロープ。
#[derive(Debug, Serialize, Deserialize)]
pub struct SealedPayload {
    pub payload: String,
}

/// ペイロード暗号化サービス（AES-256-CBC）
///
/// APIレスポンスのJSONボディを経路上で不透明にするための難読化。
/// サーバ全体で共有する固定キー + メッセージごとのランダムIV。
/// MACを付与しないため改竄検知はない（機密性のみ、完全性なし）。
///
/// # Security
/// - キーはhexエンコードされた環境変数から一度だけ読み込み、
///   長さ不正は構築時に即座に失敗させる
#[derive(Clone)]
pub struct PayloadCodec {
    key: [u8; 32],
}

impl PayloadCodec {
    /// hexエンコードされた32バイトキーから構築
    ///
    /// キーの検証はここで完結させる。暗号化呼び出し時には失敗しない。
    pub fn new(key_hex: &str) -> Result<Self, AppError> {
        let key_bytes = HEXLOWER_PERMISSIVE
            .decode(key_hex.trim().as_bytes())
            .map_err(|_| AppError::PayloadKeyInvalid("hexデコードに失敗".to_string()))?;

        if key_bytes.len() != 32 {
            return Err(AppError::PayloadKeyInvalid(format!(
                "キーは32バイト必要（実際は{}バイト）",
                key_bytes.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);

        Ok(Self { key })
    }

    /// JSONテキストを暗号化してエンベロープ文字列を返す
    ///
    /// IVは呼び出しごとに16バイトを新規生成する（再利用禁止）。
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        format!("{}:{}", HEXLOWER.encode(&iv), HEXLOWER.encode(&ciphertext))
    }

    /// エンベロープ文字列を復号してJSONテキストを返す
    ///
    /// 形式不正・パディング不正・UTF-8不正はすべて `DecryptionFailed`。
    pub fn decrypt(&self, envelope: &str) -> Result<String, AppError> {
        let (iv_hex, ct_hex) = envelope.split_once(':').ok_or(AppError::DecryptionFailed)?;

        let iv_bytes = HEXLOWER_PERMISSIVE
            .decode(iv_hex.as_bytes())
            .map_err(|_| AppError::DecryptionFailed)?;
        let ciphertext = HEXLOWER_PERMISSIVE
            .decode(ct_hex.as_bytes())
            .map_err(|_| AppError::DecryptionFailed)?;

        let iv: [u8; 16] = iv_bytes
            .try_into()
            .map_err(|_| AppError::DecryptionFailed)?;

        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| AppError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| AppError::DecryptionFailed)
    }

    /// レスポンス値をJSONへシリアライズして封緘
    pub fn seal<T: Serialize>(&self, value: &T) -> Result<SealedPayload, AppError> {
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("シリアライズエラー: {}", e)))?;

        Ok(SealedPayload {
            payload: self.encrypt(&json),
        })
    }
}
