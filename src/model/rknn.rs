// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/rknn.rs - RKNN 推理会话
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RGB_CHANNELS, model::InferenceSession};

const RKNN_NUM_INPUTS: u32 = 1;
const RKNN_NUM_OUTPUTS: u32 = 1;
const RKNN_DEFAULT_INPUT_W: u32 = 224;
const RKNN_DEFAULT_INPUT_H: u32 = 224;
const RKNN_DEFAULT_MODEL_FILE: &str = "model.rknn";

#[derive(Error, Debug)]
pub enum RknnSessionError {
  #[error("模型加载错误: {0}")]
  ModelLoad(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPath(String),
  #[error("输入张量大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  InputShape { expected: usize, actual: usize },
  #[error("输出类别数不匹配: 期望 {expected}, 实际 {actual}")]
  OutputShape { expected: usize, actual: usize },
  #[error("模型输出为空")]
  EmptyOutput,
  #[error("RKNN 错误: {0}")]
  Rknn(#[from] rknpu::Error),
}

impl RknnSessionError {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    RknnSessionError::ModelInvalid(msg.to_string(), e)
  }
}

/// 单输入单输出的分类模型会话
pub struct RknnSession {
  context: Context,
  input_len: usize,
  num_classes: Option<usize>,
}

pub struct RknnSessionBuilder {
  model_path: PathBuf,
  flags: InitFlags,
  input_w: u32,
  input_h: u32,
  num_classes: Option<usize>,
}

impl FromUrlWithScheme for RknnSessionBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnSessionBuilder {
  type Error = RknnSessionError;

  /// `rknn:///path/model.rknn?shape=224x224&classes=1000`
  ///
  /// 路径为目录时使用其中的 `model.rknn`。
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnSessionError::ModelPath(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = RknnSessionBuilder::new(url.path());
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "shape" => {
          let (w, h) = parse_shape(&v).ok_or_else(|| {
            RknnSessionError::ModelPath(format!("无法解析输入尺寸: {}", v))
          })?;
          builder = builder.input_shape(w, h);
        }
        "classes" => {
          let n = v.parse::<usize>().map_err(|_| {
            RknnSessionError::ModelPath(format!("无法解析类别数: {}", v))
          })?;
          builder = builder.num_classes(n);
        }
        _ => debug!("忽略未知参数: {}={}", k, v),
      }
    }

    Ok(builder)
  }
}

fn parse_shape(s: &str) -> Option<(u32, u32)> {
  let (w, h) = s.split_once('x')?;
  let w = w.trim().parse().ok()?;
  let h = h.trim().parse().ok()?;
  (w > 0 && h > 0).then_some((w, h))
}

impl RknnSessionBuilder {
  pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
    RknnSessionBuilder {
      model_path: model_path.into(),
      flags: InitFlags::default(),
      input_w: RKNN_DEFAULT_INPUT_W,
      input_h: RKNN_DEFAULT_INPUT_H,
      num_classes: None,
    }
  }

  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn input_shape(mut self, width: u32, height: u32) -> Self {
    self.input_w = width;
    self.input_h = height;
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = Some(num_classes);
    self
  }

  fn resolve_model_path(&self) -> PathBuf {
    if self.model_path.is_dir() {
      self.model_path.join(RKNN_DEFAULT_MODEL_FILE)
    } else {
      self.model_path.clone()
    }
  }

  pub fn build(self) -> Result<RknnSession, RknnSessionError> {
    let model_path = self.resolve_model_path();
    info!("加载模型文件: {}", model_path.display());
    let mode_data = std::fs::read(&model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, self.flags)?;
    info!("模型加载完成");

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!(" 查询 SDK 版本失败: {}", e);
        return Err(RknnSessionError::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| RknnSessionError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| RknnSessionError::invalid("无法获取输出数量", e))?;

    if num_inputs != RKNN_NUM_INPUTS || num_outputs != RKNN_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        RKNN_NUM_INPUTS, RKNN_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(RknnSessionError::invalid(&msg, rknpu::Error::InvalidModel));
    }

    let input_len = RGB_CHANNELS * self.input_w as usize * self.input_h as usize;
    debug!(
      "模型输入尺寸: {}x{}x{} ({} 字节)",
      self.input_w, self.input_h, RGB_CHANNELS, input_len
    );

    Ok(RknnSession {
      context,
      input_len,
      num_classes: self.num_classes,
    })
  }
}

impl InferenceSession for RknnSession {
  type Error = RknnSessionError;

  fn infer(&self, tensor: &[u8]) -> Result<Box<[f32]>, Self::Error> {
    if tensor.len() != self.input_len {
      error!(
        "输入张量大小不匹配: 期望 {}, 实际 {}",
        self.input_len,
        tensor.len()
      );
      return Err(RknnSessionError::InputShape {
        expected: self.input_len,
        actual: tensor.len(),
      });
    }

    debug!("设置模型输入");
    self
      .context
      .set_input(0, tensor, TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    debug!("获取模型输出");
    let output = self.context.get_outputs()?;
    let scores = output.get_f32(0)?.to_vec();

    if scores.is_empty() {
      return Err(RknnSessionError::EmptyOutput);
    }
    if let Some(expected) = self.num_classes
      && expected != scores.len()
    {
      return Err(RknnSessionError::OutputShape {
        expected,
        actual: scores.len(),
      });
    }

    Ok(scores.into_boxed_slice())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_shape() {
    assert_eq!(parse_shape("224x224"), Some((224, 224)));
    assert_eq!(parse_shape("320 x 240"), Some((320, 240)));
    assert_eq!(parse_shape("0x10"), None);
    assert_eq!(parse_shape("224"), None);
  }

  #[test]
  fn builder_from_url() {
    let url = Url::parse("rknn:///opt/models/densenet121.rknn?shape=256x192&classes=1000").unwrap();
    let builder = RknnSessionBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, PathBuf::from("/opt/models/densenet121.rknn"));
    assert_eq!((builder.input_w, builder.input_h), (256, 192));
    assert_eq!(builder.num_classes, Some(1000));
  }

  #[test]
  fn builder_rejects_bad_url() {
    let url = Url::parse("yolo26:///opt/models/a.rknn").unwrap();
    assert!(matches!(
      RknnSessionBuilder::from_url(&url),
      Err(RknnSessionError::ModelPath(_))
    ));

    let url = Url::parse("rknn:///opt/models/a.rknn?shape=big").unwrap();
    assert!(RknnSessionBuilder::from_url(&url).is_err());
  }

  #[test]
  fn directory_resolves_to_default_file() {
    let dir = tempfile::tempdir().unwrap();
    let builder = RknnSessionBuilder::new(dir.path());
    assert_eq!(builder.resolve_model_path(), dir.path().join("model.rknn"));
  }

  #[test]
  fn missing_model_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = RknnSessionBuilder::new(dir.path().join("missing.rknn")).build();
    assert!(matches!(result, Err(RknnSessionError::ModelLoad(_))));
  }
}
