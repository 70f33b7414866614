// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model.rs - 检测模型与检测结果定义
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

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 检测模型：输入选中的图像，输出推理服务的响应
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测目标，坐标位于服务端看到的原始图像坐标系中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  #[serde(rename = "x", deserialize_with = "lenient::f32_from_number_or_str")]
  pub center_x: f32,
  #[serde(rename = "y", deserialize_with = "lenient::f32_from_number_or_str")]
  pub center_y: f32,
  #[serde(deserialize_with = "lenient::f32_from_number_or_str")]
  pub width: f32,
  #[serde(deserialize_with = "lenient::f32_from_number_or_str")]
  pub height: f32,
  #[serde(rename = "class", deserialize_with = "lenient::string_from_scalar")]
  pub label: String,
}

/// 检测框的左上角与右下角
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl Detection {
  /// 中心点加尺寸转换为角点
  pub fn corners(&self) -> Corners {
    Corners {
      x1: self.center_x - self.width / 2.0,
      y1: self.center_y - self.height / 2.0,
      x2: self.center_x + self.width / 2.0,
      y2: self.center_y + self.height / 2.0,
    }
  }
}

impl TryFrom<&Value> for Detection {
  type Error = serde_json::Error;

  fn try_from(record: &Value) -> Result<Self, Self::Error> {
    Detection::deserialize(record)
  }
}

/// 服务端报告的原始图像尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
  #[serde(rename = "width", deserialize_with = "lenient::i32_from_number_or_str")]
  pub source_width: i32,
  #[serde(rename = "height", deserialize_with = "lenient::i32_from_number_or_str")]
  pub source_height: i32,
}

impl ImageMeta {
  pub fn new(source_width: i32, source_height: i32) -> Self {
    Self {
      source_width,
      source_height,
    }
  }

  pub fn is_valid(&self) -> bool {
    self.source_width > 0 && self.source_height > 0
  }
}

/// 标注结果最终显示区域的尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
  pub display_width: u32,
  pub display_height: u32,
}

impl From<(u32, u32)> for RenderTarget {
  fn from((display_width, display_height): (u32, u32)) -> Self {
    Self {
      display_width,
      display_height,
    }
  }
}

/// 推理服务的响应
///
/// 检测记录保持原始 JSON，直到绘制时才逐条解析，
/// 这样格式错误的记录只会中断它之后的绘制。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
  pub predictions: Vec<Value>,
  pub image: ImageMeta,
}

impl InferenceResponse {
  pub fn detections(&self) -> impl Iterator<Item = Result<Detection, serde_json::Error>> + '_ {
    self.predictions.iter().map(Detection::try_from)
  }

  pub fn is_empty(&self) -> bool {
    self.predictions.is_empty()
  }
}

mod lenient;

#[cfg(feature = "remote_model")]
mod remote;
#[cfg(feature = "remote_model")]
pub use self::remote::{DEFAULT_ENDPOINT, RemoteModel, RemoteModelBuilder, RemoteModelError};

mod replay;
pub use self::replay::{ReplayModel, ReplayModelError};
