// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/bin/replay_oneshot.rs - 使用已保存的推理响应标注图像
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use kuangxuan::{
  FromUrl,
  input::ImageFileInput,
  model::{RenderTarget, ReplayModel},
  output::{Annotator, OutputWrapper},
  task::{OneShotTask, Task},
};
use tracing::info;

/// Kuangxuan 离线回放参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///path/to/photo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 推理响应文件，例如 response:///path/to/response.json
  #[arg(long, value_name = "RESPONSE")]
  pub response: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  #[arg(long, value_name = "PIXELS", requires = "display_height")]
  pub display_width: Option<u32>,
  #[arg(long, value_name = "PIXELS", requires = "display_width")]
  pub display_height: Option<u32>,
  /// 标签字体文件
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("响应文件: {}", args.response);
  info!("输出路径: {}", args.output);

  let input_image = ImageFileInput::from_url(&args.input)?;
  let model = ReplayModel::from_url(&args.response)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let annotator = match &args.font {
    Some(path) => Annotator::with_font_file(path)?,
    None => Annotator::new()?,
  };
  let target = args
    .display_width
    .zip(args.display_height)
    .map(RenderTarget::from);

  OneShotTask::new(annotator)
    .with_target(target)
    .run_task(input_image, model, output)?;

  Ok(())
}
