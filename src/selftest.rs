//! Diagnostic self-test
//!
//! Subscribes to the report topic, prints the converter metadata of the
//! first report, then polls for fresh reports and prints every populated
//! channel. The test only reads from the topic, so it can run next to the
//! engine without touching its state.

use crate::config::SelfTestConfig;
use crate::topic::Topic;
use crate::types::AdcReport;
use std::io::Write;

/// Result of a self-test run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfTestOutcome {
    /// Whether a report was available at the start
    pub initial_report: bool,
    /// Number of polling rounds
    pub iterations: u32,
    /// Rounds in which no fresh report arrived
    pub failed_polls: u32,
}

impl SelfTestOutcome {
    pub fn passed(&self) -> bool {
        self.initial_report
    }

    /// Process-style result: 0 when the initial report was observed
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

/// Run the self-test against `topic`, writing the listing to `out`
pub fn run_self_test(
    topic: &Topic<AdcReport>,
    config: &SelfTestConfig,
    out: &mut dyn Write,
) -> std::io::Result<SelfTestOutcome> {
    let subscription = topic.subscribe();
    let mut outcome = SelfTestOutcome::default();

    let Some(mut report) = subscription.wait(config.initial_wait()) else {
        tracing::warn!("ADC self-test: no report within {:?}", config.initial_wait());
        return Ok(outcome);
    };
    outcome.initial_report = true;

    writeln!(out, "DeviceID: {}", report.device_id)?;
    writeln!(out, "Resolution: {}", report.resolution)?;
    writeln!(out, "Voltage Reference: {:.6}", report.v_ref)?;

    for _ in 0..config.iterations {
        for (channel, raw) in report.channels() {
            write!(out, "{:>2}:{:>6}", channel, raw)?;
        }
        writeln!(out)?;

        std::thread::sleep(config.poll_interval());
        outcome.iterations += 1;

        match subscription.update() {
            Some(fresh) => report = fresh,
            None => {
                outcome.failed_polls += 1;
                writeln!(out, "\t ADC test failed.")?;
            }
        }
    }

    writeln!(out, "\t ADC test successful.")?;
    tracing::debug!(
        "ADC self-test finished: {} rounds, {} without a fresh report",
        outcome.iterations,
        outcome.failed_polls
    );

    Ok(outcome)
}
