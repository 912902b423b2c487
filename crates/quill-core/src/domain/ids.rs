//! Domain identifiers (strongly-typed IDs).
//!
//! # ReportId
//! TaskStore が採番する連番 ID です。Store 側の `INTEGER PRIMARY KEY` と 1:1 に対応し、
//! 一度割り当てられたら変わりません。
//!
//! ## なぜ newtype なのか
//! - 生の `u64` と混同できない（件数やオフセットを誤って渡せない）
//! - JSON 上は素の数値として出る（`#[serde(transparent)]`）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Identifier of a report task, assigned by the task store.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(u64);

impl ReportId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ReportId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}
