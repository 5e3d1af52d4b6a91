//! Metrics sinks.
//!
//! The trainer hands one [`UpdateSnapshot`] per logged update to a
//! [`MetricsLogger`]. Sinks decide how to render it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use super::drq_metrics::DrqMetrics;

/// Metrics of one logged update.
#[derive(Debug, Clone)]
pub struct UpdateSnapshot {
    /// Update counter of the training state after the update.
    pub step: usize,
    pub metrics: DrqMetrics,
    pub learning_rate: f64,
}

impl UpdateSnapshot {
    pub fn new(step: usize, metrics: DrqMetrics) -> Self {
        Self {
            step,
            metrics,
            learning_rate: 0.0,
        }
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    fn log(&mut self, snapshot: &UpdateSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Tabular stdout logger.
pub struct ConsoleLogger {
    log_interval: usize,
    last_log_step: Option<usize>,
    start_time: Instant,
    show_header: bool,
}

impl ConsoleLogger {
    /// `log_interval` is the minimum number of updates between two rows.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval,
            last_log_step: None,
            start_time: Instant::now(),
            show_header: true,
        }
    }

    fn should_log(&self, step: usize) -> bool {
        match self.last_log_step {
            None => true,
            Some(last) => step >= last + self.log_interval,
        }
    }

    fn print_header(&self) {
        println!(
            "{:>8} {:>11} {:>11} {:>9} {:>9} {:>9} {:>9} {:>8}",
            "Step", "CriticLoss", "ActorLoss", "Entropy", "Reward", "Value", "GradNorm", "UPS"
        );
        println!("{}", "-".repeat(82));
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &UpdateSnapshot) {
        if !self.should_log(snapshot.step) {
            return;
        }

        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        let elapsed = self.start_time.elapsed().as_secs_f32();
        let ups = if elapsed > 0.0 {
            snapshot.step as f32 / elapsed
        } else {
            0.0
        };

        let m = &snapshot.metrics;
        println!(
            "{:>8} {:>11.4} {:>11.4} {:>9.4} {:>9.3} {:>9.3} {:>9.3} {:>8.1}",
            snapshot.step, m.critic_loss, m.actor_loss, m.entropy, m.reward, m.value, m.grad_norm, ups
        );

        self.last_log_step = Some(snapshot.step);
    }

    fn flush(&mut self) {}
}

/// CSV file logger.
pub struct CsvLogger {
    writer: BufWriter<File>,
    start_time: Instant,
}

impl CsvLogger {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "step,{},learning_rate,elapsed_secs",
            DrqMetrics::NAMES.join(",")
        )?;

        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &UpdateSnapshot) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let m = &snapshot.metrics;

        if let Err(e) = writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{:.2}",
            snapshot.step,
            m.critic_loss,
            m.actor_loss,
            m.entropy,
            m.reward,
            m.value,
            m.grad_norm,
            snapshot.learning_rate,
            elapsed
        ) {
            log::warn!("Failed to write metrics row: {}", e);
        }
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Fans a snapshot out to several loggers.
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &UpdateSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
