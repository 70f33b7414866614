// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/remote.rs - 远程推理服务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl,
  input::SelectedImage,
  model::{InferenceResponse, Model},
};

pub const DEFAULT_ENDPOINT: &str = "https://fastapicc-php-ku3urc7swa-uc.a.run.app";

const FORM_FIELD_NAME: &str = "image";
const FORM_FILE_NAME: &str = "image.jpg";
const FORM_CONTENT_TYPE: &str = "image/jpeg";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum RemoteModelError {
  #[error("推理服务返回错误状态: {0} {1}")]
  Status(u16, String),
  #[error("请求推理服务失败: {0}")]
  Transport(String),
  #[error("读取响应失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("解析响应失败: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl From<ureq::Error> for RemoteModelError {
  fn from(err: ureq::Error) -> Self {
    match err {
      ureq::Error::Status(code, response) => {
        RemoteModelError::Status(code, response.status_text().to_string())
      }
      ureq::Error::Transport(transport) => RemoteModelError::Transport(transport.to_string()),
    }
  }
}

pub struct RemoteModelBuilder {
  endpoint: Url,
  timeout: Duration,
}

impl FromUrl for RemoteModelBuilder {
  type Error = RemoteModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "http" | "https" => Ok(RemoteModelBuilder {
        endpoint: url.clone(),
        timeout: DEFAULT_TIMEOUT,
      }),
      other => Err(RemoteModelError::SchemeMismatch(format!(
        "推理服务地址必须使用 http 或 https 方案, 实际为 '{}'",
        other
      ))),
    }
  }
}

impl RemoteModelBuilder {
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn build(self) -> RemoteModel {
    info!("推理服务地址: {}", self.endpoint);
    debug!("请求超时: {:?}", self.timeout);
    let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
    RemoteModel {
      endpoint: self.endpoint,
      agent,
    }
  }
}

/// 通过 HTTP multipart 上传图像的远程检测模型
pub struct RemoteModel {
  endpoint: Url,
  agent: ureq::Agent,
}

impl RemoteModel {
  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }
}

impl Model for RemoteModel {
  type Input = SelectedImage;
  type Output = InferenceResponse;
  type Error = RemoteModelError;

  fn infer(&self, input: &SelectedImage) -> Result<InferenceResponse, RemoteModelError> {
    let boundary = form_boundary();
    let body = multipart_body(&boundary, input.jpeg());
    info!("上传图像: {} 字节 -> {}", input.jpeg().len(), self.endpoint);

    let response = self
      .agent
      .post(self.endpoint.as_str())
      .set(
        "Content-Type",
        &format!("multipart/form-data; boundary={}", boundary),
      )
      .send_bytes(&body)
      .map_err(|e| {
        let e = RemoteModelError::from(e);
        error!("推理请求失败: {}", e);
        e
      })?;

    let text = response.into_string()?;
    debug!("推理服务响应: {}", text);
    let result: InferenceResponse = serde_json::from_str(&text)?;
    info!(
      "收到 {} 个检测结果, 原图尺寸 {}x{}",
      result.predictions.len(),
      result.image.source_width,
      result.image.source_height
    );
    Ok(result)
  }
}

fn form_boundary() -> String {
  let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
  format!("kuangxuan-{:032x}", nanos)
}

fn multipart_body(boundary: &str, jpeg: &[u8]) -> Vec<u8> {
  let head = format!(
    "--{boundary}\r\nContent-Disposition: form-data; name=\"{FORM_FIELD_NAME}\"; filename=\"{FORM_FILE_NAME}\"\r\nContent-Type: {FORM_CONTENT_TYPE}\r\n\r\n"
  );
  let tail = format!("\r\n--{boundary}--\r\n");

  let mut body = Vec::with_capacity(head.len() + jpeg.len() + tail.len());
  body.extend_from_slice(head.as_bytes());
  body.extend_from_slice(jpeg);
  body.extend_from_slice(tail.as_bytes());
  body
}
