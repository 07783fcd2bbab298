//! Event Window Grouping

use crate::{Channel, EventLabel, ImuSample, LabeledSample, WindowConfig, WindowError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Contiguous samples of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventWindow {
    /// Event identifier from the recording
    pub event_id: String,
    /// Event label, `None` for unannotated recordings
    pub label: Option<EventLabel>,
    /// Samples in recording order
    pub samples: Vec<ImuSample>,
}

impl EventWindow {
    /// Create a window from already grouped samples
    pub fn new(
        event_id: impl Into<String>,
        label: impl Into<Option<EventLabel>>,
        samples: Vec<ImuSample>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            label: label.into(),
            samples,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the window holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values of one channel across the window
    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.samples.iter().map(|s| s.channel(channel)).collect()
    }

    /// Acceleration magnitude series
    pub fn accel_magnitude(&self) -> Vec<f64> {
        self.channel(Channel::AccelMag)
    }

    /// Angular velocity magnitude series
    pub fn gyro_magnitude(&self) -> Vec<f64> {
        self.samples.iter().map(ImuSample::gyro_magnitude).collect()
    }
}

/// Result of grouping samples into windows
#[derive(Debug, Clone, Default)]
pub struct WindowingReport {
    /// Windows in first-appearance order of their event
    pub windows: Vec<EventWindow>,
    /// Events dropped for having fewer samples than a full window
    pub skipped_short: usize,
}

/// Groups labeled samples into event windows
#[derive(Debug, Clone)]
pub struct Windower {
    config: WindowConfig,
}

/// Samples of one event while grouping
struct PendingEvent {
    event_id: String,
    label: Option<EventLabel>,
    rows: Vec<(Option<i64>, ImuSample)>,
    mixed_labels: bool,
}

impl Windower {
    /// Create a windower, validating the configuration
    pub fn new(config: WindowConfig) -> Result<Self, WindowError> {
        if config.window_size == 0 {
            return Err(WindowError::ZeroWindowSize);
        }
        if config.sample_rate_hz <= 0.0 || !config.sample_rate_hz.is_finite() {
            return Err(WindowError::InvalidSampleRate(config.sample_rate_hz));
        }
        Ok(Self { config })
    }

    /// Windowing configuration
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Group samples by event id into windows
    pub fn group<I>(&self, samples: I) -> WindowingReport
    where
        I: IntoIterator<Item = LabeledSample>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut pending: Vec<PendingEvent> = Vec::new();

        for row in samples {
            match index.get(&row.event_id) {
                Some(&slot) => {
                    let event = &mut pending[slot];
                    if event.label != row.label {
                        event.mixed_labels = true;
                    }
                    event.rows.push((row.sample_index, row.sample));
                }
                None => {
                    index.insert(row.event_id.clone(), pending.len());
                    pending.push(PendingEvent {
                        event_id: row.event_id,
                        label: row.label,
                        rows: vec![(row.sample_index, row.sample)],
                        mixed_labels: false,
                    });
                }
            }
        }

        let mut report = WindowingReport::default();
        for mut event in pending {
            if event.mixed_labels {
                debug!(
                    "Event {} has mixed labels, using first label {:?}",
                    event.event_id, event.label
                );
            }

            if self.config.require_full_window && event.rows.len() < self.config.window_size {
                debug!(
                    "Skipping event {}: {} samples < {}",
                    event.event_id,
                    event.rows.len(),
                    self.config.window_size
                );
                report.skipped_short += 1;
                continue;
            }

            // Stable: rows without an index keep file order
            if event.rows.iter().any(|(idx, _)| idx.is_some()) {
                event.rows.sort_by_key(|(idx, _)| idx.unwrap_or(i64::MAX));
            }

            let mut samples: Vec<ImuSample> = event.rows.into_iter().map(|(_, s)| s).collect();
            if self.config.require_full_window {
                samples.truncate(self.config.window_size);
            }

            report
                .windows
                .push(EventWindow::new(event.event_id, event.label, samples));
        }

        info!(
            "Built {} event windows of {:.1}s ({} short events skipped)",
            report.windows.len(),
            self.config.duration_secs(),
            report.skipped_short
        );
        report
    }
}

/// Count labeled windows per label, in class order, omitting absent labels
pub fn class_distribution(windows: &[EventWindow]) -> Vec<(EventLabel, usize)> {
    EventLabel::ALL
        .iter()
        .map(|&label| (label, windows.iter().filter(|w| w.label == Some(label)).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(event: &str, idx: Option<i64>, label: EventLabel, ax: f64) -> LabeledSample {
        LabeledSample {
            event_id: event.to_string(),
            sample_index: idx,
            label: Some(label),
            sample: ImuSample::new([ax, 0.0, 1.0], [0.0; 3]),
        }
    }

    fn config(window_size: usize, require_full_window: bool) -> WindowConfig {
        WindowConfig {
            window_size,
            require_full_window,
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_zero_window() {
        assert!(matches!(
            Windower::new(config(0, true)),
            Err(WindowError::ZeroWindowSize)
        ));
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        let bad = WindowConfig {
            sample_rate_hz: 0.0,
            ..Default::default()
        };
        assert!(Windower::new(bad).is_err());
    }

    #[test]
    fn test_skips_short_and_trims_long() {
        let windower = Windower::new(config(3, true)).unwrap();
        let mut rows = Vec::new();
        for i in 0..5 {
            rows.push(row("long", None, EventLabel::Brake, i as f64));
        }
        for i in 0..2 {
            rows.push(row("short", None, EventLabel::Turn, i as f64));
        }

        let report = windower.group(rows);
        assert_eq!(report.skipped_short, 1);
        assert_eq!(report.windows.len(), 1);
        assert_eq!(report.windows[0].len(), 3);
        assert_eq!(report.windows[0].channel(Channel::AccelX), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_keeps_partial_windows_when_not_strict() {
        let windower = Windower::new(config(150, false)).unwrap();
        let rows = vec![
            row("a", None, EventLabel::Bump, 1.0),
            row("a", None, EventLabel::Bump, 2.0),
        ];
        let report = windower.group(rows);
        assert_eq!(report.windows.len(), 1);
        assert_eq!(report.windows[0].len(), 2);
    }

    #[test]
    fn test_orders_by_sample_index() {
        let windower = Windower::new(config(3, true)).unwrap();
        let rows = vec![
            row("e", Some(2), EventLabel::Crash, 2.0),
            row("e", Some(0), EventLabel::Crash, 0.0),
            row("e", Some(1), EventLabel::Crash, 1.0),
        ];
        let report = windower.group(rows);
        assert_eq!(report.windows[0].channel(Channel::AccelX), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_first_label_wins_and_order_is_first_appearance() {
        let windower = Windower::new(config(1, true)).unwrap();
        let rows = vec![
            row("b", None, EventLabel::Normal, 0.0),
            row("a", None, EventLabel::Brake, 0.0),
            row("b", None, EventLabel::Turn, 0.0),
        ];
        let report = windower.group(rows);
        let ids: Vec<_> = report.windows.iter().map(|w| w.event_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(report.windows[0].label, Some(EventLabel::Normal));
    }

    #[test]
    fn test_groups_unlabeled_events() {
        let windower = Windower::new(config(2, true)).unwrap();
        let rows: Vec<LabeledSample> = (0..2)
            .map(|i| LabeledSample {
                label: None,
                ..row("fresh", Some(i), EventLabel::Normal, i as f64)
            })
            .collect();
        let report = windower.group(rows);
        assert_eq!(report.windows.len(), 1);
        assert_eq!(report.windows[0].label, None);
        assert!(class_distribution(&report.windows).is_empty());
    }

    #[test]
    fn test_class_distribution() {
        let windows = vec![
            EventWindow::new("1", EventLabel::Turn, vec![]),
            EventWindow::new("2", EventLabel::Brake, vec![]),
            EventWindow::new("3", EventLabel::Turn, vec![]),
        ];
        assert_eq!(
            class_distribution(&windows),
            vec![(EventLabel::Brake, 1), (EventLabel::Turn, 2)]
        );
    }

    proptest! {
        #[test]
        fn prop_full_windows_have_exact_size(lengths in proptest::collection::vec(1usize..12, 1..8)) {
            let windower = Windower::new(config(5, true)).unwrap();
            let mut rows = Vec::new();
            for (event, len) in lengths.iter().enumerate() {
                for i in 0..*len {
                    rows.push(row(&event.to_string(), None, EventLabel::Normal, i as f64));
                }
            }
            let report = windower.group(rows);
            let expected_kept = lengths.iter().filter(|&&l| l >= 5).count();
            prop_assert_eq!(report.windows.len(), expected_kept);
            prop_assert_eq!(report.skipped_short, lengths.len() - expected_kept);
            prop_assert!(report.windows.iter().all(|w| w.len() == 5));
        }
    }
}
