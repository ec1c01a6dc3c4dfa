// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/classifier.rs - 图像分类器
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

use std::marker::PhantomData;

use thiserror::Error;
use tracing::debug;

use crate::{
  input::AsNhwcFrame,
  model::{ClassifyResult, InferenceSession, Model},
  postprocess::{PostprocessError, softmax_in_place, top_k},
};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Error, Debug)]
pub enum ClassifyError<E> {
  #[error("推理错误: {0}")]
  Inference(E),
  #[error("后处理错误: {0}")]
  Postprocess(#[from] PostprocessError),
}

/// 持有一个推理会话，对单帧图像做 Top-K 分类
pub struct Classifier<S, Frame> {
  session: S,
  top_k: usize,
  _phantom: PhantomData<Frame>,
}

impl<S, Frame> Classifier<S, Frame> {
  pub fn new(session: S) -> Self {
    Self {
      session,
      top_k: DEFAULT_TOP_K,
      _phantom: PhantomData,
    }
  }

  /// `Model::infer` 使用的 K
  pub fn with_top_k(mut self, top_k: usize) -> Self {
    self.top_k = top_k;
    self
  }

  pub fn session(&self) -> &S {
    &self.session
  }
}

impl<S: InferenceSession, Frame: AsNhwcFrame> Classifier<S, Frame> {
  /// 推理后先选 Top-K，再只对选中的 K 个分数做 softmax
  pub fn classify(&self, frame: &Frame, k: usize) -> Result<ClassifyResult, ClassifyError<S::Error>> {
    let scores = self
      .session
      .infer(frame.as_nhwc())
      .map_err(ClassifyError::Inference)?;
    debug!("模型输出 {} 个类别分数", scores.len());

    let (mut probabilities, indices) = top_k(&scores, k)?;
    softmax_in_place(&mut probabilities)?;

    Ok(ClassifyResult {
      probabilities,
      indices,
    })
  }
}

impl<S, Frame> Model for Classifier<S, Frame>
where
  S: InferenceSession,
  Frame: AsNhwcFrame,
{
  type Input = Frame;
  type Output = ClassifyResult;
  type Error = ClassifyError<S::Error>;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.classify(input, self.top_k)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::RgbNhwcFrame;
  use std::cell::Cell;

  #[derive(Error, Debug, PartialEq)]
  #[error("stub failure")]
  struct StubError;

  struct StubSession {
    scores: Vec<f32>,
    calls: Cell<usize>,
  }

  impl StubSession {
    fn new(scores: Vec<f32>) -> Self {
      Self {
        scores,
        calls: Cell::new(0),
      }
    }
  }

  impl InferenceSession for StubSession {
    type Error = StubError;

    fn infer(&self, tensor: &[u8]) -> Result<Box<[f32]>, Self::Error> {
      self.calls.set(self.calls.get() + 1);
      if tensor.len() != RgbNhwcFrame::<2, 2>::LEN {
        return Err(StubError);
      }
      Ok(self.scores.clone().into_boxed_slice())
    }
  }

  struct FailingSession;

  impl InferenceSession for FailingSession {
    type Error = StubError;

    fn infer(&self, _tensor: &[u8]) -> Result<Box<[f32]>, Self::Error> {
      Err(StubError)
    }
  }

  type Frame = RgbNhwcFrame<2, 2>;

  #[test]
  fn classify_selects_then_normalizes() {
    let classifier = Classifier::<_, Frame>::new(StubSession::new(vec![1.0, 3.0, 2.0]));
    let result = classifier.classify(&Frame::default(), 2).unwrap();

    assert_eq!(result.indices, vec![1, 2]);
    assert!((result.probabilities[0] - 0.7311).abs() < 1e-4);
    assert!((result.probabilities[1] - 0.2689).abs() < 1e-4);
    assert_eq!(classifier.session().calls.get(), 1);
  }

  #[test]
  fn single_class_has_full_probability() {
    let classifier = Classifier::<_, Frame>::new(StubSession::new(vec![5.0, 5.0, 1.0]));
    let result = classifier.classify(&Frame::default(), 1).unwrap();
    assert_eq!(result.top(), Some((0, 1.0)));
  }

  #[test]
  fn model_infer_uses_configured_k() {
    let scores = (0..10).map(|i| i as f32).collect();
    let classifier = Classifier::<_, Frame>::new(StubSession::new(scores)).with_top_k(3);
    let result = classifier.infer(&Frame::default()).unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.indices, vec![9, 8, 7]);
    let sum: f32 = result.probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
  }

  #[test]
  fn k_beyond_classes_is_out_of_range() {
    let classifier = Classifier::<_, Frame>::new(StubSession::new(vec![0.1, 0.2]));
    let err = classifier.classify(&Frame::default(), 3).unwrap_err();
    assert!(matches!(
      err,
      ClassifyError::Postprocess(PostprocessError::OutOfRange { k: 3, len: 2 })
    ));
  }

  #[test]
  fn degenerate_scores_produce_no_result() {
    let classifier =
      Classifier::<_, Frame>::new(StubSession::new(vec![f32::NEG_INFINITY; 4]));
    let err = classifier.classify(&Frame::default(), 2).unwrap_err();
    assert!(matches!(
      err,
      ClassifyError::Postprocess(PostprocessError::NumericDegenerate)
    ));
  }

  #[test]
  fn session_errors_propagate_unchanged() {
    let classifier = Classifier::<_, Frame>::new(FailingSession);
    let err = classifier.classify(&Frame::default(), 1).unwrap_err();
    assert!(matches!(err, ClassifyError::Inference(StubError)));
  }

  #[test]
  fn boxed_session_is_a_session() {
    let session: Box<dyn InferenceSession<Error = StubError>> =
      Box::new(StubSession::new(vec![0.0, 2.0]));
    let classifier = Classifier::<_, Frame>::new(session);
    let result = classifier.classify(&Frame::default(), 2).unwrap();
    assert_eq!(result.indices, vec![1, 0]);
  }
}
