//! Summary figures over the job list.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::analysis::Intention;
use crate::queue::{Job, JobStatus};

/// Days covered by the default trend.
pub const TREND_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total: usize,
    pub uploads_last_7_days: usize,
    pub completed: usize,
    pub high_intent: usize,
}

impl Overview {
    pub fn compute(jobs: &[Job], now: DateTime<Utc>) -> Self {
        let since = now - Duration::days(7);

        Self {
            total: jobs.len(),
            uploads_last_7_days: jobs.iter().filter(|job| job.created_at >= since).count(),
            completed: jobs
                .iter()
                .filter(|job| job.status == JobStatus::Success)
                .count(),
            high_intent: jobs
                .iter()
                .filter(|job| {
                    job.analysis
                        .as_ref()
                        .is_some_and(|a| a.intention == Intention::High)
                })
                .count(),
        }
    }
}

/// Intention buckets over successful jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntentionDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl IntentionDistribution {
    pub fn compute(jobs: &[Job]) -> Self {
        let mut dist = Self::default();
        let analysed = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Success)
            .filter_map(|job| job.analysis.as_ref());

        for analysis in analysed {
            match analysis.intention {
                Intention::High => dist.high += 1,
                Intention::Medium => dist.medium += 1,
                Intention::Low => dist.low += 1,
            }
        }
        dist
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Uploads and mean score for one calendar day (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub day: NaiveDate,
    pub uploads: usize,
    /// Rounded mean of the scores of that day's jobs, 0 if none has one.
    pub avg_score: u8,
}

/// One point per day for the `days` days ending with `today`, oldest first.
pub fn daily_trend(jobs: &[Job], today: NaiveDate, days: u32) -> Vec<DailyPoint> {
    (0..days)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(i64::from(offset));
            let day_jobs: Vec<&Job> = jobs
                .iter()
                .filter(|job| job.created_at.date_naive() == day)
                .collect();

            let scores: Vec<u32> = day_jobs
                .iter()
                .filter_map(|job| job.analysis.as_ref().map(|a| u32::from(a.score)))
                .collect();
            let avg_score = if scores.is_empty() {
                0
            } else {
                let sum: u32 = scores.iter().sum();
                (f64::from(sum) / scores.len() as f64).round() as u8
            };

            DailyPoint {
                day,
                uploads: day_jobs.len(),
                avg_score,
            }
        })
        .collect()
}
