// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{ClassifyResult, LabelMap},
  output::Render,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 通过 tracing 打印 Top-K 结果
#[derive(Default)]
pub struct LogOutput {
  labels: LabelMap,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(LogOutput::default())
  }
}

impl LogOutput {
  pub fn with_labels(mut self, labels: LabelMap) -> Self {
    self.labels = labels;
    self
  }
}

impl<F> Render<F, ClassifyResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, _frame: &F, result: &ClassifyResult) -> Result<(), Self::Error> {
    info!("Top-{} 分类结果:", result.len());
    for (rank, (class_id, probability)) in result.iter().enumerate() {
      info!(
        "  {}. [{}] {}: {:.2}%",
        rank + 1,
        class_id,
        self.labels.name_of(class_id),
        probability * 100.0
      );
    }
    Ok(())
  }
}
