// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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

use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::FromUrl;
use crate::FromUrlWithScheme;
use crate::frame::RgbNhwcFrame;
use crate::model::{ClassifyResult, LabelMap};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

/// 将分类结果整理为 JSON，`rank` 从 1 开始
pub fn ranked_json(result: &ClassifyResult, labels: &LabelMap) -> Value {
  let items = result
    .iter()
    .enumerate()
    .map(|(rank, (class_id, probability))| {
      json!({
        "rank": rank + 1,
        "class_id": class_id,
        "label": labels.name_of(class_id),
        "probability": probability,
      })
    })
    .collect::<Vec<_>>();

  json!({ "top_k": items })
}

mod log_output;
pub use self::log_output::{LogOutput, LogOutputError};

mod json_file;
pub use self::json_file::{JsonFileOutput, JsonFileOutputError};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[error("JSON 文件输出错误: {0}")]
  JsonFileOutputError(#[from] JsonFileOutputError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  LogOutput(LogOutput),
  JsonFileOutput(JsonFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::LogOutput(LogOutput::from_url(url)?)),
      JsonFileOutput::SCHEME => Ok(OutputWrapper::JsonFileOutput(JsonFileOutput::from_url(
        url,
      )?)),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecordOutput(
        DirectoryRecordOutput::from_url(url)?,
      )),
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl OutputWrapper {
  pub fn with_labels(self, labels: LabelMap) -> Self {
    match self {
      OutputWrapper::LogOutput(output) => OutputWrapper::LogOutput(output.with_labels(labels)),
      OutputWrapper::JsonFileOutput(output) => {
        OutputWrapper::JsonFileOutput(output.with_labels(labels))
      }
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => {
        OutputWrapper::DirectoryRecordOutput(output.with_labels(labels))
      }
    }
  }
}

impl<const W: u32, const H: u32> Render<RgbNhwcFrame<W, H>, ClassifyResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &RgbNhwcFrame<W, H>,
    result: &ClassifyResult,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::LogOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::JsonFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> ClassifyResult {
    ClassifyResult {
      probabilities: vec![0.75, 0.25],
      indices: vec![1, 4],
    }
  }

  #[test]
  fn json_ranks_start_at_one() {
    let labels = LabelMap::parse("tench\ngoldfish");
    let value = ranked_json(&sample(), &labels);

    assert_eq!(value["top_k"][0]["rank"], 1);
    assert_eq!(value["top_k"][0]["label"], "goldfish");
    assert_eq!(value["top_k"][0]["probability"], 0.75);
    assert_eq!(value["top_k"][1]["class_id"], 4);
    assert_eq!(value["top_k"][1]["label"], "#4");
  }

  #[test]
  fn wrapper_dispatches_by_scheme() {
    let url = Url::parse("log://").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::LogOutput(_))
    ));

    let url = Url::parse("json:///tmp/result.json").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::JsonFileOutput(_))
    ));

    let url = Url::parse("rtsp://localhost/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }

  #[test]
  fn wrapper_renders_to_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("result.json");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();

    let output = OutputWrapper::from_url(&url)
      .unwrap()
      .with_labels(LabelMap::parse("a\nb"));
    output
      .render_result(&RgbNhwcFrame::<2, 2>::default(), &sample())
      .unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["top_k"][0]["label"], "b");
  }
}
