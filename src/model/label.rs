// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/label.rs - 类别标签表
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

use std::{borrow::Cow, path::Path};

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LabelMapError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 类别编号到名称的映射，标签文件每行一个类别名
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
  names: Box<[String]>,
}

impl LabelMap {
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelMapError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let labels = Self::parse(&text);
    info!("加载标签文件 {}: {} 个类别", path.display(), labels.len());
    Ok(labels)
  }

  pub fn parse(text: &str) -> Self {
    let names = text
      .lines()
      .map(|line| line.trim().to_string())
      .collect::<Vec<_>>();
    // 去掉文件末尾的空行
    let end = names
      .iter()
      .rposition(|name| !name.is_empty())
      .map_or(0, |i| i + 1);
    Self {
      names: names[..end].to_vec().into_boxed_slice(),
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: u32) -> Option<&str> {
    self.names.get(class_id as usize).map(String::as_str)
  }

  /// 未知类别显示为 `#<编号>`
  pub fn name_of(&self, class_id: u32) -> Cow<'_, str> {
    match self.get(class_id) {
      Some(name) if !name.is_empty() => Cow::Borrowed(name),
      _ => Cow::Owned(format!("#{}", class_id)),
    }
  }
}
