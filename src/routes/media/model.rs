use std::borrow::Cow;

use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::utils::not_blank;

/// 只接受 data URI 形式的图片或 http(s) 地址
fn image_source(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.starts_with("data:image/")
        || value.starts_with("https://")
        || value.starts_with("http://")
    {
        return Ok(());
    }
    Err(ValidationError::new("image_source").with_message(Cow::Borrowed(
        "File must be an image data URI or an http(s) URL",
    )))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    #[validate(
        required(message = "File is required"),
        custom(function = "image_source")
    )]
    pub file: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Folder must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub folder: Option<String>,
}
