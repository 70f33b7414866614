// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/draw.rs - 检测结果叠加绘制
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

use std::{fmt::Display, path::Path};

use ab_glyph::{Font, FontArc, InvalidFont, PxScale, ScaleFont};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Corners, Detection, ImageMeta, InferenceResponse, RenderTarget};

// 绘制常量
pub const STROKE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]); // 红色
pub const STROKE_WIDTH: f32 = 5.0;
pub const LABEL_FONT_SIZE: f32 = 30.0;
/// 标签基线位于检测框上边缘之上的距离
pub const LABEL_OFFSET: f32 = 10.0;

const DEFAULT_FONT: &[u8] = include_bytes!("../../assets/font.ttf");

// 超出此范围的坐标不可能落在画布上
const PIXEL_LIMIT: f32 = 1.0e6;

/// 标注结果，32 位 RGBA 位图，由调用方独占
pub type AnnotatedImage = RgbaImage;

/// 交给输出端的标注结果：绘制后的图像与实际绘制的检测目标
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
  pub image: AnnotatedImage,
  pub detections: Vec<Detection>,
}

impl Annotation {
  /// 未标注的原图副本
  pub fn unannotated(base: &DynamicImage) -> Self {
    Self {
      image: base.to_rgba8(),
      detections: Vec::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }
}

#[derive(Error, Debug)]
pub enum AnnotateError {
  #[error("图像元数据无效: 原图尺寸 {source_width}x{source_height}")]
  InvalidMetadata {
    source_width: i32,
    source_height: i32,
  },
  #[error("第 {index} 个检测记录格式错误: {reason}")]
  MalformedDetection {
    index: usize,
    reason: String,
    partial: Box<AnnotatedImage>,
  },
  #[error("字体无效: {0}")]
  InvalidFont(#[from] InvalidFont),
  #[error("字体文件读取错误: {0}")]
  FontIoError(#[from] std::io::Error),
}

impl AnnotateError {
  /// 出错前已经绘制的部分结果
  pub fn into_partial(self) -> Option<AnnotatedImage> {
    match self {
      AnnotateError::MalformedDetection { partial, .. } => Some(*partial),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotateStyle {
  pub stroke_color: Rgba<u8>,
  pub stroke_width: f32,
  pub label_color: Rgba<u8>,
  pub label_font_size: f32,
  pub label_offset: f32,
}

impl Default for AnnotateStyle {
  fn default() -> Self {
    Self {
      stroke_color: STROKE_COLOR,
      stroke_width: STROKE_WIDTH,
      label_color: STROKE_COLOR,
      label_font_size: LABEL_FONT_SIZE,
      label_offset: LABEL_OFFSET,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
  pub x: f32,
  pub y: f32,
}

/// 显示尺寸相对原图尺寸的缩放系数
pub fn scale_factors(meta: &ImageMeta, target: &RenderTarget) -> Result<ScaleFactors, AnnotateError> {
  if !meta.is_valid() {
    return Err(AnnotateError::InvalidMetadata {
      source_width: meta.source_width,
      source_height: meta.source_height,
    });
  }

  Ok(ScaleFactors {
    x: target.display_width as f32 / meta.source_width as f32,
    y: target.display_height as f32 / meta.source_height as f32,
  })
}

pub struct Annotator {
  font: FontArc,
  style: AnnotateStyle,
}

impl Annotator {
  /// 使用内嵌字体
  pub fn new() -> Result<Self, AnnotateError> {
    Ok(Self {
      font: FontArc::try_from_slice(DEFAULT_FONT)?,
      style: AnnotateStyle::default(),
    })
  }

  pub fn with_font_file<P: AsRef<Path>>(path: P) -> Result<Self, AnnotateError> {
    let data = std::fs::read(path.as_ref())?;
    debug!("加载字体: {}", path.as_ref().display());
    Ok(Self {
      font: FontArc::try_from_vec(data)?,
      style: AnnotateStyle::default(),
    })
  }

  pub fn with_style(mut self, style: AnnotateStyle) -> Self {
    self.style = style;
    self
  }

  pub fn style(&self) -> &AnnotateStyle {
    &self.style
  }

  /// 在 `base` 的副本上按输入顺序绘制检测框与标签。
  ///
  /// 元数据无效时不绘制任何内容。某条记录无法转换为 [`Detection`] 时停止绘制，
  /// 已绘制的部分随 [`AnnotateError::MalformedDetection`] 一起返回。
  pub fn annotate<I>(
    &self,
    base: &DynamicImage,
    detections: I,
    meta: &ImageMeta,
    target: &RenderTarget,
  ) -> Result<AnnotatedImage, AnnotateError>
  where
    I: IntoIterator,
    I::Item: TryInto<Detection>,
    <I::Item as TryInto<Detection>>::Error: Display,
  {
    // 缩放系数只计算不应用，检测框仍使用原图坐标
    let scale = scale_factors(meta, target)?;
    debug!("缩放系数: {:.4} x {:.4}", scale.x, scale.y);

    let mut canvas = base.to_rgba8();
    for (index, record) in detections.into_iter().enumerate() {
      let detection: Detection = match record.try_into() {
        Ok(detection) => detection,
        Err(e) => {
          warn!("第 {} 个检测记录无法解析, 停止绘制: {}", index, e);
          return Err(AnnotateError::MalformedDetection {
            index,
            reason: e.to_string(),
            partial: Box::new(canvas),
          });
        }
      };
      self.draw_detection(&mut canvas, &detection);
    }

    Ok(canvas)
  }

  pub fn annotate_response(
    &self,
    base: &DynamicImage,
    response: &InferenceResponse,
    target: &RenderTarget,
  ) -> Result<AnnotatedImage, AnnotateError> {
    self.annotate(base, response.predictions.iter(), &response.image, target)
  }

  fn draw_detection(&self, canvas: &mut RgbaImage, detection: &Detection) {
    let Corners { x1, y1, x2, y2 } = detection.corners();
    self.draw_stroke_rect(canvas, x1, y1, x2, y2);
    self.draw_label(canvas, &detection.label, x1, y1 - self.style.label_offset);
  }

  // 描边以矩形边线为中心，四条边分别填充
  fn draw_stroke_rect(&self, canvas: &mut RgbaImage, x1: f32, y1: f32, x2: f32, y2: f32) {
    let stroke = self.style.stroke_width.round().max(1.0).min(PIXEL_LIMIT) as i32;
    let half = stroke / 2;

    let (left, right) = (to_pixel(x1.min(x2)), to_pixel(x1.max(x2)));
    let (top, bottom) = (to_pixel(y1.min(y2)), to_pixel(y1.max(y2)));
    let outer_width = (right - left + stroke) as u32;
    let outer_height = (bottom - top + stroke) as u32;

    let edges = [
      Rect::at(left - half, top - half).of_size(outer_width, stroke as u32),
      Rect::at(left - half, bottom - half).of_size(outer_width, stroke as u32),
      Rect::at(left - half, top - half).of_size(stroke as u32, outer_height),
      Rect::at(right - half, top - half).of_size(stroke as u32, outer_height),
    ];
    for edge in edges {
      draw_filled_rect_mut(canvas, edge, self.style.stroke_color);
    }
  }

  // (x, baseline) 为文本基线起点
  fn draw_label(&self, canvas: &mut RgbaImage, label: &str, x: f32, baseline: f32) {
    if label.is_empty() {
      return;
    }

    let scale = PxScale::from(self.style.label_font_size);
    let ascent = self.font.as_scaled(scale).ascent();
    draw_text_mut(
      canvas,
      self.style.label_color,
      to_pixel(x),
      to_pixel(baseline - ascent),
      scale,
      &self.font,
      label,
    );
  }
}

fn to_pixel(value: f32) -> i32 {
  value.round().clamp(-PIXEL_LIMIT, PIXEL_LIMIT) as i32
}
