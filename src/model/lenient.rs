// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/lenient.rs - 宽松的 JSON 字段解析
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

//! 推理服务的数值字段可能是数字，也可能是数字字符串；
//! 标签字段可能是字符串，也可能是数字。

use serde::{Deserialize, Deserializer, de::Error};
use serde_json::Number;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
  Number(Number),
  Text(String),
  Bool(bool),
}

fn to_f64<E: Error>(value: Scalar) -> Result<f64, E> {
  match value {
    Scalar::Number(n) => n
      .as_f64()
      .ok_or_else(|| E::custom(format!("无法表示的数字: {}", n))),
    Scalar::Text(s) => s
      .trim()
      .parse::<f64>()
      .map_err(|_| E::custom(format!("期望数字, 实际为字符串 {:?}", s))),
    Scalar::Bool(b) => Err(E::custom(format!("期望数字, 实际为布尔值 {}", b))),
  }
}

pub(super) fn f32_from_number_or_str<'de, D: Deserializer<'de>>(d: D) -> Result<f32, D::Error> {
  to_f64(Scalar::deserialize(d)?).map(|v| v as f32)
}

/// 小数部分截断
pub(super) fn i32_from_number_or_str<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
  let value = to_f64::<D::Error>(Scalar::deserialize(d)?)?.trunc();
  if value.is_finite() && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
    Ok(value as i32)
  } else {
    Err(D::Error::custom(format!("整数超出范围: {}", value)))
  }
}

pub(super) fn string_from_scalar<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(match Scalar::deserialize(d)? {
    Scalar::Text(s) => s,
    Scalar::Number(n) => n.to_string(),
    Scalar::Bool(b) => b.to_string(),
  })
}
