// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/json_file.rs - 保存 JSON 结果文件
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

use std::path::Path;

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{ClassifyResult, LabelMap},
  output::{Render, ranked_json},
};

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub struct JsonFileOutput {
  path: String,
  labels: LabelMap,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonFileOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(JsonFileOutput {
      path: uri.path().to_string(),
      labels: LabelMap::default(),
    })
  }
}

impl JsonFileOutput {
  pub fn with_labels(mut self, labels: LabelMap) -> Self {
    self.labels = labels;
    self
  }
}

impl<F> Render<F, ClassifyResult> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn render_result(&self, _frame: &F, result: &ClassifyResult) -> Result<(), Self::Error> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let value = ranked_json(result, &self.labels);
    std::fs::write(&self.path, serde_json::to_string_pretty(&value)?)?;

    warn!("保存分类结果到文件: {}", self.path);

    Ok(())
  }
}
