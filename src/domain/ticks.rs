// src/domain/ticks.rs

// 🌍 Standard library
use std::collections::VecDeque;

// 📦 External crates
use chrono::{DateTime, Utc};

// 🧠 Internal modules
use crate::model::Tick;

pub const DEFAULT_CHART_POINTS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub ask: f64,
    pub bid: f64,
}

impl ChartPoint {
    /// `HH:MM:SS` label for the x axis.
    #[must_use]
    pub fn label(&self) -> String {
        self.time.format("%H:%M:%S").to_string()
    }
}

/// Rolling window of the most recent ticks, oldest first.
#[derive(Debug, Clone)]
pub struct TickWindow {
    capacity: usize,
    points: VecDeque<ChartPoint>,
}

impl Default for TickWindow {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHART_POINTS)
    }
}

impl TickWindow {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a tick; returns `false` if the epoch is out of range and the
    /// tick was skipped.
    pub fn push(&mut self, tick: &Tick) -> bool {
        let Some(time) = tick.timestamp() else {
            return false;
        };
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(ChartPoint {
            time,
            ask: tick.ask,
            bid: tick.bid,
        });
        true
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    pub fn points(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter()
    }
}
