// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input.rs - 图像输入
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

use image::{DynamicImage, ImageResult, codecs::jpeg::JpegEncoder};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 上传时使用的 JPEG 质量
pub const UPLOAD_JPEG_QUALITY: u8 = 100;

/// 用户选中的图像：解码后的位图与用于上传的 JPEG 字节
#[derive(Debug, Clone)]
pub struct SelectedImage {
  image: DynamicImage,
  jpeg: Vec<u8>,
}

impl SelectedImage {
  pub fn from_image(image: DynamicImage) -> ImageResult<Self> {
    let mut jpeg = Vec::new();
    // JPEG 不支持 alpha 通道
    DynamicImage::ImageRgb8(image.to_rgb8())
      .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, UPLOAD_JPEG_QUALITY))?;
    Ok(Self { image, jpeg })
  }

  pub fn image(&self) -> &DynamicImage {
    &self.image
  }

  pub fn jpeg(&self) -> &[u8] {
    &self.jpeg
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}
