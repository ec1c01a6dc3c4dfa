// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess.rs - 分类结果后处理（Top-K 与 Softmax）
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

use std::cmp::Ordering;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostprocessError {
  #[error("参数无效: {0}")]
  InvalidArgument(String),
  #[error("K 超出范围: k = {k}, 类别数 = {len}")]
  OutOfRange { k: usize, len: usize },
  #[error("Softmax 分母退化（为零或非有限值）")]
  NumericDegenerate,
}

/// 按分数降序、原始下标升序排列
fn rank_order(a: &(u32, f32), b: &(u32, f32)) -> Ordering {
  b.1
    .partial_cmp(&a.1)
    .unwrap_or(Ordering::Equal)
    .then_with(|| a.0.cmp(&b.0))
}

/// 类别编号为 u32，类别数不能超过其表示范围
fn check_class_count(len: usize) -> Result<(), PostprocessError> {
  match u32::try_from(len) {
    Ok(_) => Ok(()),
    Err(_) => Err(PostprocessError::InvalidArgument(format!(
      "类别数 {} 超出 u32 下标范围",
      len
    ))),
  }
}

/// 选出分数最高的 `k` 个类别
///
/// 返回 `(values, indices)`，两者长度均为 `k`，`values` 非递增，
/// 且 `values[i] == scores[indices[i]]`。分数相同时原始下标较小者排在前面，
/// 每个下标至多出现一次。
pub fn top_k(scores: &[f32], k: usize) -> Result<(Vec<f32>, Vec<u32>), PostprocessError> {
  if scores.is_empty() {
    return Err(PostprocessError::InvalidArgument(
      "分数向量为空".to_string(),
    ));
  }
  if k == 0 {
    return Err(PostprocessError::InvalidArgument(
      "k 必须大于 0".to_string(),
    ));
  }
  if k > scores.len() {
    return Err(PostprocessError::OutOfRange {
      k,
      len: scores.len(),
    });
  }
  if let Some(pos) = scores.iter().position(|s| s.is_nan()) {
    return Err(PostprocessError::InvalidArgument(format!(
      "第 {} 个分数为 NaN",
      pos
    )));
  }

  check_class_count(scores.len())?;

  // 长度已校验，下标不会截断
  let mut pairs: Vec<(u32, f32)> = scores
    .iter()
    .enumerate()
    .map(|(i, &s)| (i as u32, s))
    .collect();

  // rank_order 是全序，可以先划分再只对前 k 个排序
  if k < pairs.len() {
    pairs.select_nth_unstable_by(k - 1, rank_order);
    pairs.truncate(k);
  }
  pairs.sort_unstable_by(rank_order);

  debug!("Top-{} 结果: {:?}", k, pairs);

  Ok(pairs.into_iter().map(|(i, s)| (s, i)).unzip())
}

/// 原地计算数值稳定的 softmax
///
/// 失败时 `values` 中可能残留部分结果，调用方应丢弃。
pub fn softmax_in_place(values: &mut [f32]) -> Result<(), PostprocessError> {
  if values.is_empty() {
    return Err(PostprocessError::InvalidArgument(
      "softmax 输入为空".to_string(),
    ));
  }

  let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

  // 分母以 f64 累加
  let mut sum = 0.0f64;
  for v in values.iter_mut() {
    *v = (*v - max).exp();
    sum += *v as f64;
  }

  if !(sum.is_finite() && sum > 0.0) {
    return Err(PostprocessError::NumericDegenerate);
  }

  for v in values.iter_mut() {
    *v = (*v as f64 / sum) as f32;
  }

  Ok(())
}
