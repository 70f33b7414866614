// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/task.rs - 上传、标注与输出任务
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

use std::time::Instant;
use tracing::{error, info, warn};

use crate::{
  input::SelectedImage,
  model::{InferenceResponse, Model, RenderTarget},
  output::{
    Render,
    draw::{AnnotateError, Annotation, Annotator},
  },
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 取一张图像，推理、标注并输出一次。
///
/// 推理失败或元数据无效时输出未标注的原图，不视为任务失败。
pub struct OneShotTask {
  annotator: Annotator,
  target: Option<RenderTarget>,
}

impl OneShotTask {
  pub fn new(annotator: Annotator) -> Self {
    Self {
      annotator,
      target: None,
    }
  }

  /// 未指定时使用图像自身尺寸
  pub fn with_target(mut self, target: Option<RenderTarget>) -> Self {
    self.target = target;
    self
  }

  pub fn annotate(
    &self,
    frame: &SelectedImage,
    response: &InferenceResponse,
    target: &RenderTarget,
  ) -> Annotation {
    match self
      .annotator
      .annotate_response(frame.image(), response, target)
    {
      Ok(image) => Annotation {
        image,
        detections: response.detections().map_while(Result::ok).collect(),
      },
      Err(AnnotateError::MalformedDetection {
        index,
        reason,
        partial,
      }) => {
        error!("第 {} 个检测记录格式错误, 保留已绘制部分: {}", index, reason);
        Annotation {
          image: *partial,
          detections: response.detections().map_while(Result::ok).collect(),
        }
      }
      Err(e) => {
        error!("标注失败, 保留原图: {}", e);
        Annotation::unannotated(frame.image())
      }
    }
  }
}

impl<
  ME: std::error::Error,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SelectedImage>,
  M: Model<Input = SelectedImage, Output = InferenceResponse, Error = ME>,
  O: Render<SelectedImage, Annotation, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    let target = self
      .target
      .unwrap_or_else(|| RenderTarget::from((frame.width(), frame.height())));
    info!(
      "输入图像获取成功: {}x{}, 显示尺寸 {}x{}",
      frame.width(),
      frame.height(),
      target.display_width,
      target.display_height
    );

    let now = Instant::now();
    let annotation = match model.infer(&frame) {
      Ok(response) => {
        info!("推理完成，耗时: {:.2?}", now.elapsed());
        self.annotate(&frame, &response, &target)
      }
      Err(e) => {
        warn!("推理失败, 保留原图: {}", e);
        Annotation::unannotated(frame.image())
      }
    };
    info!("标注完成: {} 个检测目标", annotation.detections.len());

    output.render_result(&frame, &annotation)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ImageMeta;
  use image::{DynamicImage, Rgba, RgbaImage};
  use serde_json::json;
  use std::cell::RefCell;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("fake failure")]
  struct FakeError;

  struct FakeModel(Option<InferenceResponse>);

  impl Model for FakeModel {
    type Input = SelectedImage;
    type Output = InferenceResponse;
    type Error = FakeError;

    fn infer(&self, _input: &SelectedImage) -> Result<InferenceResponse, FakeError> {
      self.0.clone().ok_or(FakeError)
    }
  }

  #[derive(Default)]
  struct Recorder(RefCell<Option<Annotation>>);

  impl Render<SelectedImage, Annotation> for &Recorder {
    type Error = FakeError;

    fn render_result(&self, _frame: &SelectedImage, result: &Annotation) -> Result<(), FakeError> {
      self.0.replace(Some(result.clone()));
      Ok(())
    }
  }

  fn frame() -> SelectedImage {
    let image = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
    SelectedImage::from_image(DynamicImage::ImageRgba8(image)).unwrap()
  }

  fn response(predictions: Vec<serde_json::Value>, meta: ImageMeta) -> InferenceResponse {
    InferenceResponse {
      predictions,
      image: meta,
    }
  }

  fn box_record(x: f32, label: &str) -> serde_json::Value {
    json!({"x": x, "y": 50, "width": 20, "height": 20, "class": label})
  }

  fn run(model: FakeModel) -> Annotation {
    let recorder = Recorder::default();
    let input = frame();
    OneShotTask::new(Annotator::new().unwrap())
      .run_task(std::iter::once(input), model, &recorder)
      .unwrap();
    recorder.0.into_inner().unwrap()
  }

  #[test]
  fn successful_inference_is_drawn() {
    let annotation = run(FakeModel(Some(response(
      vec![box_record(30.0, "a"), box_record(70.0, "b")],
      ImageMeta::new(100, 100),
    ))));
    assert_eq!(annotation.detections.len(), 2);
    assert_eq!(annotation.detections[1].label, "b");
    assert_ne!(annotation.image, frame().image().to_rgba8());
  }

  #[test]
  fn failed_inference_renders_original() {
    let annotation = run(FakeModel(None));
    assert!(annotation.is_empty());
    assert_eq!(annotation.image, frame().image().to_rgba8());
  }

  #[test]
  fn invalid_metadata_renders_original() {
    let annotation = run(FakeModel(Some(response(
      vec![box_record(30.0, "a")],
      ImageMeta::new(0, 100),
    ))));
    assert!(annotation.is_empty());
    assert_eq!(annotation.image, frame().image().to_rgba8());
  }

  #[test]
  fn malformed_record_renders_partial() {
    let annotation = run(FakeModel(Some(response(
      vec![box_record(30.0, "a"), json!({"x": 70}), box_record(70.0, "c")],
      ImageMeta::new(100, 100),
    ))));
    assert_eq!(annotation.detections.len(), 1);
    assert_eq!(annotation.detections[0].label, "a");
    assert_ne!(annotation.image, frame().image().to_rgba8());
  }

  #[test]
  fn missing_input_is_error() {
    let recorder = Recorder::default();
    let result = OneShotTask::new(Annotator::new().unwrap()).run_task(
      std::iter::empty::<SelectedImage>(),
      FakeModel(None),
      &recorder,
    );
    assert!(result.is_err());
    assert!(recorder.0.borrow().is_none());
  }
}
