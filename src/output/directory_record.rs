// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/directory_record.rs - 按日期目录记录标注结果
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

use chrono::{DateTime, Datelike, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  input::SelectedImage,
  model::Detection,
  output::{Render, draw::Annotation, save_image_file::save_rgba_image},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 记录方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
  /// 保存标注后的图像
  Draw,
  /// 保存原图，检测结果写入同名 txt 文件
  ///
  /// `record=id` 时每行以标签编号开头，其余取值写标签名。
  Record { label_with_name: bool },
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  mode: RecordMode,
  frame_counter: AtomicU16,
  // 标签按首次出现的顺序编号，整个输出生命周期内不变
  label_ids: Mutex<Vec<String>>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mode = match uri.query_pairs().find(|(k, _)| k == "record") {
      Some((_, v)) => RecordMode::Record {
        label_with_name: v != "id",
      },
      None => RecordMode::Draw,
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: url_file_path(uri),
      mode,
      frame_counter: AtomicU16::new(0),
      label_ids: Mutex::new(Vec::new()),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn mode(&self) -> RecordMode {
    self.mode
  }

  /// 标签对应的编号，新标签追加到表尾
  pub fn label_id(&self, label: &str) -> usize {
    let mut labels = self.label_ids.lock().unwrap_or_else(PoisonError::into_inner);
    match labels.iter().position(|known| known == label) {
      Some(id) => id,
      None => {
        labels.push(label.to_string());
        labels.len() - 1
      }
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<SelectedImage, Annotation> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &SelectedImage, result: &Annotation) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("没有检测目标, 跳过记录");
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    match self.mode {
      RecordMode::Draw => save_rgba_image(&result.image, &path)?,
      RecordMode::Record { label_with_name } => {
        frame.image().save(&path)?;
        let lines: Vec<String> = result
          .detections
          .iter()
          .map(|d| {
            if label_with_name {
              record_line(&d.label, d)
            } else {
              record_line(&self.label_id(&d.label).to_string(), d)
            }
          })
          .collect();
        std::fs::write(path.with_extension("txt"), lines.join("\n"))?;
      }
    }
    info!("记录标注结果: {}", path.display());

    Ok(())
  }
}

// 标签, 中心 x, 中心 y, 宽, 高
fn record_line(label: &str, d: &Detection) -> String {
  format!(
    "{}, {:.4}, {:.4}, {:.4}, {:.4}",
    label, d.center_x, d.center_y, d.width, d.height
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use std::path::Path;
  use image::{DynamicImage, Rgba, RgbaImage};
  use url::Url;

  fn frame() -> SelectedImage {
    SelectedImage::from_image(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
      4,
      4,
      Rgba([0, 0, 0, 255]),
    )))
    .unwrap()
  }

  fn annotation(detections: Vec<Detection>) -> Annotation {
    Annotation {
      image: RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])),
      detections,
    }
  }

  fn dog() -> Detection {
    Detection {
      center_x: 2.0,
      center_y: 2.0,
      width: 2.0,
      height: 1.0,
      label: "dog".to_string(),
    }
  }

  fn output(dir: &Path, query: &str) -> DirectoryRecordOutput {
    let url = Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  fn saved_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
      for entry in std::fs::read_dir(current).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          pending.push(path);
        } else if path.extension().is_some_and(|e| e == extension) {
          found.push(path);
        }
      }
    }
    found
  }

  #[test]
  fn dated_path_with_counter() {
    let dir = tempfile::tempdir().unwrap();
    let output = output(dir.path(), "");
    let now = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();

    let first = output.frame_path(now).unwrap();
    let second = output.frame_path(now).unwrap();
    assert_eq!(first, dir.path().join("2026/03/07/09-05-01-0001.png"));
    assert_eq!(second, dir.path().join("2026/03/07/09-05-01-0002.png"));
  }

  #[test]
  fn draw_mode_saves_annotated_image() {
    let dir = tempfile::tempdir().unwrap();
    let output = output(dir.path(), "");
    assert_eq!(output.mode(), RecordMode::Draw);

    output.render_result(&frame(), &annotation(vec![dog()])).unwrap();

    let images = saved_files(dir.path(), "png");
    assert_eq!(images.len(), 1);
    let saved = image::open(&images[0]).unwrap().to_rgba8();
    assert_eq!(saved.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
  }

  #[test]
  fn record_mode_writes_original_and_txt() {
    let dir = tempfile::tempdir().unwrap();
    let output = output(dir.path(), "?record=name");
    assert_eq!(
      output.mode(),
      RecordMode::Record {
        label_with_name: true
      }
    );

    output.render_result(&frame(), &annotation(vec![dog()])).unwrap();

    let images = saved_files(dir.path(), "png");
    assert_eq!(images.len(), 1);
    let saved = image::open(&images[0]).unwrap().to_rgba8();
    assert_eq!(saved.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));

    let record = std::fs::read_to_string(images[0].with_extension("txt")).unwrap();
    assert_eq!(record, "dog, 2.0000, 2.0000, 2.0000, 1.0000");
  }

  #[test]
  fn record_id_mode_writes_stable_label_ids() {
    let dir = tempfile::tempdir().unwrap();
    let output = output(dir.path(), "?record=id");
    assert_eq!(
      output.mode(),
      RecordMode::Record {
        label_with_name: false
      }
    );

    let cat = Detection {
      label: "cat".to_string(),
      ..dog()
    };
    output
      .render_result(&frame(), &annotation(vec![dog(), cat.clone(), dog()]))
      .unwrap();
    output.render_result(&frame(), &annotation(vec![cat])).unwrap();

    let mut records: Vec<String> = saved_files(dir.path(), "txt")
      .iter()
      .map(|path| std::fs::read_to_string(path).unwrap())
      .collect();
    records.sort();
    assert_eq!(
      records,
      vec![
        "0, 2.0000, 2.0000, 2.0000, 1.0000\n1, 2.0000, 2.0000, 2.0000, 1.0000\n0, 2.0000, 2.0000, 2.0000, 1.0000",
        "1, 2.0000, 2.0000, 2.0000, 1.0000",
      ]
    );
    assert_eq!(output.label_id("dog"), 0);
    assert_eq!(output.label_id("bird"), 2);
  }

  #[test]
  fn bare_record_flag_writes_names() {
    let output = output(Path::new("/tmp"), "?record");
    assert_eq!(
      output.mode(),
      RecordMode::Record {
        label_with_name: true
      }
    );
  }

  #[test]
  fn empty_result_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    output(dir.path(), "")
      .render_result(&frame(), &annotation(Vec::new()))
      .unwrap();
    assert!(saved_files(dir.path(), "png").is_empty());

    output(dir.path(), "?always")
      .render_result(&frame(), &annotation(Vec::new()))
      .unwrap();
    assert_eq!(saved_files(dir.path(), "png").len(), 1);
  }
}
