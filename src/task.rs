// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 任务定义
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

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复推理，统计平均耗时
#[derive(Debug)]
pub struct RepeatShotTask {
  repeat: usize,
  warmup: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      repeat: 1000,
      warmup: 2,
    }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }

  /// 统计平均耗时时跳过的前几次推理
  pub fn with_warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup;
    self
  }
}

/// 跳过预热次数后的平均耗时；样本不足时使用全部样本
pub fn average_latency(times: &[Duration], warmup: usize) -> Option<Duration> {
  let samples = if times.len() > warmup {
    &times[warmup..]
  } else {
    times
  };
  if samples.is_empty() {
    return None;
  }
  Some(samples.iter().sum::<Duration>() / samples.len() as u32)
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    let mut last = None;
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
      last = Some(result);
    }

    if let Some(avg) = average_latency(&times, self.warmup) {
      warn!("平均推理时间: {:.2?}", avg);
    }

    if let Some(result) = last {
      output.render_result(&frame, &result)?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::{Cell, RefCell};
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("test error")]
  struct TestError;

  struct CountingModel {
    calls: Cell<usize>,
  }

  impl Model for &CountingModel {
    type Input = u8;
    type Output = usize;
    type Error = TestError;

    fn infer(&self, input: &u8) -> Result<usize, TestError> {
      self.calls.set(self.calls.get() + 1);
      Ok(*input as usize * 2)
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(u8, usize)>>,
  }

  impl Render<u8, usize> for &Collect {
    type Error = TestError;

    fn render_result(&self, frame: &u8, result: &usize) -> Result<(), TestError> {
      self.seen.borrow_mut().push((*frame, *result));
      Ok(())
    }
  }

  #[test]
  fn one_shot_renders_first_frame() {
    let model = CountingModel { calls: Cell::new(0) };
    let output = Collect::default();
    OneShotTask
      .run_task([21u8, 7].into_iter(), &model, &output)
      .unwrap();

    assert_eq!(model.calls.get(), 1);
    assert_eq!(*output.seen.borrow(), vec![(21, 42)]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let model = CountingModel { calls: Cell::new(0) };
    let output = Collect::default();
    assert!(
      OneShotTask
        .run_task(std::iter::empty::<u8>(), &model, &output)
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_runs_requested_times() {
    let model = CountingModel { calls: Cell::new(0) };
    let output = Collect::default();
    RepeatShotTask::default()
      .with_repeat(5)
      .run_task(std::iter::once(3u8), &model, &output)
      .unwrap();

    assert_eq!(model.calls.get(), 5);
    assert_eq!(*output.seen.borrow(), vec![(3, 6)]);
  }

  #[test]
  fn average_skips_warmup() {
    let times = [100, 100, 10, 20].map(Duration::from_millis);
    assert_eq!(average_latency(&times, 2), Some(Duration::from_millis(15)));
    assert_eq!(average_latency(&times[..1], 2), Some(Duration::from_millis(100)));
    assert_eq!(average_latency(&[], 2), None);
  }
}
