//! 图片托管
//!
//! 实体图片存放在 Cloudinary 兼容的图片服务上，数据库只保存 public id 和 URL。
//! 请求参数按名称排序拼接后加上密钥做 SHA-256 签名。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ImageServiceConfig;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Image service is not configured")]
    Disabled,

    #[error("Image service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image service rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub public_id: String,
    pub url: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// `file` 为 data URI 或远程图片 URL
    async fn upload(&self, file: &str, folder: Option<&str>) -> Result<UploadedImage, MediaError>;
    async fn destroy(&self, public_id: &str) -> Result<(), MediaError>;
}

/// 按键排序后拼接 `k=v&k=v`，末尾追加密钥
pub fn sign_params(params: &BTreeMap<&str, String>, secret: &str) -> String {
    let joined = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{:x}", Sha256::digest(format!("{joined}{secret}").as_bytes()))
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: Option<String>,
    secure_url: Option<String>,
    error: Option<ServiceErrorBody>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: Option<String>,
    error: Option<ServiceErrorBody>,
}

pub struct ImageServiceClient {
    client: Client,
    config: ImageServiceConfig,
}

impl ImageServiceClient {
    pub fn new(config: ImageServiceConfig) -> Result<Self, MediaError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            action
        )
    }

    /// 签名参数加上 api_key 和签名字段，得到最终表单
    fn signed_form(&self, mut params: BTreeMap<&'static str, String>) -> BTreeMap<&'static str, String> {
        params.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = sign_params(&params, &self.config.api_secret);
        params.insert("api_key", self.config.api_key.clone());
        params.insert("signature", signature);
        params.insert("signature_algorithm", "sha256".to_string());
        params
    }
}

#[async_trait]
impl MediaStore for ImageServiceClient {
    async fn upload(&self, file: &str, folder: Option<&str>) -> Result<UploadedImage, MediaError> {
        let folder = folder.unwrap_or(&self.config.folder).to_string();
        let mut form = self.signed_form(BTreeMap::from([("folder", folder)]));
        // file 不参与签名
        form.insert("file", file.to_string());

        tracing::debug!(url = %self.endpoint("upload"), "Uploading image");
        let body: UploadResponse = self
            .client
            .post(self.endpoint("upload"))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = body.error {
            return Err(MediaError::Rejected(error.message));
        }
        match (body.public_id, body.secure_url) {
            (Some(public_id), Some(url)) => {
                tracing::info!(public_id = %public_id, "Image uploaded");
                Ok(UploadedImage { public_id, url })
            }
            _ => Err(MediaError::Rejected(
                "upload response is missing public_id or secure_url".to_string(),
            )),
        }
    }

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let form = self.signed_form(BTreeMap::from([("public_id", public_id.to_string())]));

        let body: DestroyResponse = self
            .client
            .post(self.endpoint("destroy"))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = body.error {
            return Err(MediaError::Rejected(error.message));
        }
        match body.result.as_deref() {
            // 已不存在也视为成功
            Some("ok") | Some("not found") => {
                tracing::info!(public_id = %public_id, "Image destroyed");
                Ok(())
            }
            other => Err(MediaError::Rejected(format!(
                "unexpected destroy result {other:?}"
            ))),
        }
    }
}

/// 未配置图片服务时使用
pub struct DisabledMedia;

#[async_trait]
impl MediaStore for DisabledMedia {
    async fn upload(&self, _file: &str, _folder: Option<&str>) -> Result<UploadedImage, MediaError> {
        Err(MediaError::Disabled)
    }

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        tracing::debug!(public_id = %public_id, "Image service disabled, skipping destroy");
        Ok(())
    }
}

/// 删除旧图片，失败只记日志
pub async fn destroy_quietly(media: &Arc<dyn MediaStore>, public_id: Option<&str>) {
    let Some(public_id) = public_id else {
        return;
    };
    if let Err(e) = media.destroy(public_id).await {
        tracing::warn!(public_id = %public_id, error = %e, "Failed to destroy image");
    }
}
