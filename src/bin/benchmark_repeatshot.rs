// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理测速
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_classify::{
  FromUrl,
  frame::RgbNhwcFrame,
  input::ImageFileInput,
  model::{Classifier, DEFAULT_TOP_K, RknnSessionBuilder},
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};
use tracing::info;

const INPUT_W: u32 = 224;
const INPUT_H: u32 = 224;

/// Shanan 分类测速参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,
  #[arg(long, value_name = "K", default_value_t = DEFAULT_TOP_K)]
  pub top_k: usize,
  /// 重复推理次数
  #[arg(long, value_name = "COUNT", default_value_t = 1000)]
  pub repeat: usize,
  /// 统计时跳过的预热次数
  #[arg(long, value_name = "COUNT", default_value_t = 2)]
  pub warmup: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("重复次数: {}", args.repeat);

  let input = ImageFileInput::<INPUT_W, INPUT_H>::from_url(&args.input)?;
  let session = RknnSessionBuilder::from_url(&args.model)?
    .input_shape(INPUT_W, INPUT_H)
    .build()?;
  let model = Classifier::<_, RgbNhwcFrame<INPUT_W, INPUT_H>>::new(session).with_top_k(args.top_k);
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::default()
    .with_repeat(args.repeat)
    .with_warmup(args.warmup)
    .run_task(input.into_nhwc(), model, output)?;

  Ok(())
}
