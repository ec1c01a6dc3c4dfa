// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理引擎边界：输入 NHWC 8 位张量，输出每个类别的原始分数
pub trait InferenceSession {
  type Error;

  fn infer(&self, tensor: &[u8]) -> Result<Box<[f32]>, Self::Error>;
}

impl<S: InferenceSession + ?Sized> InferenceSession for Box<S> {
  type Error = S::Error;

  fn infer(&self, tensor: &[u8]) -> Result<Box<[f32]>, Self::Error> {
    (**self).infer(tensor)
  }
}

/// Top-K 分类结果，`probabilities` 按原始分数降序排列
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyResult {
  pub probabilities: Vec<f32>,
  pub indices: Vec<u32>,
}

impl ClassifyResult {
  pub fn len(&self) -> usize {
    self.indices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  /// 依次返回 (类别编号, 概率)
  pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
    self
      .indices
      .iter()
      .copied()
      .zip(self.probabilities.iter().copied())
  }

  pub fn top(&self) -> Option<(u32, f32)> {
    self.iter().next()
  }
}

mod classifier;
mod label;
pub use self::classifier::{Classifier, ClassifyError, DEFAULT_TOP_K};
pub use self::label::{LabelMap, LabelMapError};

#[cfg(feature = "model_rknn")]
mod rknn;
#[cfg(feature = "model_rknn")]
pub use self::rknn::{RknnSession, RknnSessionBuilder, RknnSessionError};
