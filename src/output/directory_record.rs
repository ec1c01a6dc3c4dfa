// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::Mutex;

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  model::{ClassifyResult, LabelMap},
  output::{Render, ranked_json},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[cfg(feature = "save_image_file")]
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期分目录记录每次分类结果：`<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.json`
///
/// URL 带 `image` 参数时同时保存输入帧的 PNG。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  labels: LabelMap,
  frame_counters: Mutex<u16>,
  save_image: bool,
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

    let save_image = uri.query_pairs().any(|(k, _)| k == "image");
    if save_image && !cfg!(feature = "save_image_file") {
      warn!("未启用 save_image_file 特性，忽略 image 参数");
    }

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      labels: LabelMap::default(),
      frame_counters: Mutex::new(0),
      save_image,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn with_labels(mut self, labels: LabelMap) -> Self {
    self.labels = labels;
    self
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *counter = counter.wrapping_add(1);
    *counter
  }

  /// 返回不带扩展名的记录路径
  fn record_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  #[cfg(feature = "save_image_file")]
  fn save_frame<const W: u32, const H: u32>(
    &self,
    path: &std::path::Path,
    frame: &RgbNhwcFrame<W, H>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match frame.to_rgb_image() {
      Some(image) => image.save(path)?,
      None => warn!("帧数据无法转换为图像, 跳过保存: {}", path.display()),
    }
    Ok(())
  }

  #[cfg(not(feature = "save_image_file"))]
  fn save_frame<const W: u32, const H: u32>(
    &self,
    _path: &std::path::Path,
    _frame: &RgbNhwcFrame<W, H>,
  ) -> Result<(), DirectoryRecordOutputError> {
    Ok(())
  }
}

impl<const W: u32, const H: u32> Render<RgbNhwcFrame<W, H>, ClassifyResult>
  for DirectoryRecordOutput
{
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    frame: &RgbNhwcFrame<W, H>,
    result: &ClassifyResult,
  ) -> Result<(), Self::Error> {
    let path = self.record_path()?;

    let record_path = path.with_extension("json");
    let value = ranked_json(result, &self.labels);
    std::fs::write(&record_path, serde_json::to_string_pretty(&value)?)?;
    debug!("记录分类结果: {}", record_path.display());

    if self.save_image {
      self.save_frame(&path.with_extension("png"), frame)?;
    }

    Ok(())
  }
}
