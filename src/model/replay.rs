// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/replay.rs - 回放已保存的推理响应
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::SelectedImage,
  model::{InferenceResponse, Model},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("响应文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("响应文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 从文件中读取推理服务响应，不访问网络
pub struct ReplayModel {
  path: PathBuf,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "response";
}

impl FromUrl for ReplayModel {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayModelError::SchemeMismatch(format!(
        "期望方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(ReplayModel {
      path: url_file_path(url),
    })
  }
}

impl Model for ReplayModel {
  type Input = SelectedImage;
  type Output = InferenceResponse;
  type Error = ReplayModelError;

  // 每次调用都重新读取文件
  fn infer(&self, _input: &SelectedImage) -> Result<InferenceResponse, ReplayModelError> {
    info!("读取响应文件: {}", self.path.display());
    let text = std::fs::read_to_string(&self.path)?;
    debug!("响应内容: {}", text);
    Ok(serde_json::from_str(&text)?)
  }
}
