use std::collections::HashMap;
use std::time::Instant;

/// Per-stage observations of the live pipeline.
///
/// The live loop reports through this trait so that the capture thread,
/// tests and future exporters can observe it without touching the loop.
pub trait PipelineMetrics: Send {
    /// How long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A point-in-time value (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// One frame went through the whole pipeline.
    fn frame_done(&mut self);

    /// End-of-stream summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineMetrics;

impl PipelineMetrics for NullPipelineMetrics {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn frame_done(&mut self) {}
}

/// Running aggregate of one series of observations.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub sum: f64,
}

impl SeriesStats {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Collects stage timings and logs them through the `log` facade.
///
/// A progress line is emitted every `throttle_frames` frames; the summary
/// is logged when the stream stops. Only a count and a sum are kept per
/// series, so a camera stream can run indefinitely.
pub struct LogPipelineMetrics {
    throttle_frames: usize,
    timings: HashMap<String, SeriesStats>,
    metrics: HashMap<String, SeriesStats>,
    start_time: Instant,
    frames: usize,
}

impl LogPipelineMetrics {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn timings_for(&self, stage: &str) -> Option<SeriesStats> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<SeriesStats> {
        self.metrics.get(name).copied()
    }

    /// Formatted summary, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Live stream summary ({} frames, {:.1}s):",
            self.frames,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let stats = self.timings[stage];
            let total_ms = stats.sum;
            let avg_ms = stats.mean();
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            lines.push(format!("  {name}: avg {:.2}", self.metrics[name].mean()));
        }

        if self.frames > 0 && elapsed_ms > 0.0 {
            let fps = self.frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }
        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineMetrics {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineMetrics for LogPipelineMetrics {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn frame_done(&mut self) {
        self.frames += 1;
        if self.frames % self.throttle_frames == 0 {
            let secs = self.start_time.elapsed().as_secs_f64();
            let fps = if secs > 0.0 {
                self.frames as f64 / secs
            } else {
                0.0
            };
            log::info!("Live stream: {} frames ({fps:.1} fps)", self.frames);
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
