//! Driver lifecycle and command surface
//!
//! [`AdcController`] owns at most one running [`SamplingEngine`] and maps the
//! driver commands onto it:
//!
//! - `start` - build the converter and engine from the configuration, initialise and schedule it
//! - `stop` - cooperative shutdown, waits for the converter to be released
//! - `status` - lifecycle state, channel set and cycle statistics
//! - `test` - run the self-test against the report topic
//! - `help` - usage
//!
//! [`AdcController::execute`] is the string entry point used by the binary;
//! it returns a process-style result code (0 on success).

use crate::config::{AdcConfig, HalConfig};
use crate::engine::{EngineHandle, SamplingEngine};
use crate::error::{AdcError, Result};
use crate::hal::{self, AdcHal};
use crate::scheduler::WorkQueue;
use crate::selftest::{run_self_test, SelfTestOutcome};
use crate::topic::Topic;
use crate::types::{AdcReport, EngineState};
use std::io::{BufRead, Write};
use std::str::FromStr;

/// Commands understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Test,
    Help,
}

impl FromStr for Command {
    type Err = AdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            "test" => Ok(Command::Test),
            "help" | "-h" | "--help" => Ok(Command::Help),
            other => Err(AdcError::UnknownCommand(other.to_string())),
        }
    }
}

/// Builds the converter for a `start`
pub type HalFactory = Box<dyn FnMut(&HalConfig) -> Box<dyn AdcHal> + Send>;

/// Owner of the single engine instance
pub struct AdcController {
    config: AdcConfig,
    work_queue: WorkQueue,
    topic: Topic<AdcReport>,
    hal_factory: HalFactory,
    instance: Option<EngineHandle>,
}

impl AdcController {
    /// Create a controller that builds converters with [`hal::from_config`]
    pub fn new(config: AdcConfig) -> Self {
        Self {
            config,
            work_queue: WorkQueue::default(),
            topic: Topic::new(),
            hal_factory: Box::new(hal::from_config),
            instance: None,
        }
    }

    /// Replace the converter factory
    pub fn with_hal_factory<F>(mut self, factory: F) -> Self
    where
        F: FnMut(&HalConfig) -> Box<dyn AdcHal> + Send + 'static,
    {
        self.hal_factory = Box::new(factory);
        self
    }

    pub fn config(&self) -> &AdcConfig {
        &self.config
    }

    /// Report topic the engine publishes on
    pub fn topic(&self) -> Topic<AdcReport> {
        self.topic.clone()
    }

    pub fn is_running(&self) -> bool {
        self.instance.as_ref().is_some_and(EngineHandle::is_running)
    }

    /// State of the live instance, `None` without one
    pub fn engine_state(&self) -> Option<EngineState> {
        self.instance.as_ref().map(EngineHandle::state)
    }

    /// Build, initialise and schedule the engine
    pub fn start(&mut self) -> Result<()> {
        if let Some(instance) = &self.instance {
            if instance.is_running() {
                tracing::warn!("ADC driver already running");
                return Err(AdcError::AlreadyRunning);
            }
            tracing::warn!("Reaping stale ADC instance ({})", instance.state());
            // a previous engine that is still mid-cycle holds the converter
            if self.stop().is_err() {
                return Err(AdcError::AlreadyRunning);
            }
        }

        let driver = &self.config.driver;
        let hal = (self.hal_factory)(&self.config.hal);
        let engine = SamplingEngine::new(hal, driver.base_address, driver.channel_mask, self.topic.clone())
            .with_interval(driver.interval());

        match engine.init(&self.work_queue) {
            Ok(handle) => {
                self.instance = Some(handle);
                Ok(())
            }
            Err(e) => {
                tracing::error!("ADC start failed: {}", e);
                Err(e)
            }
        }
    }

    /// Request shutdown and forget the instance once it has stopped.
    ///
    /// When the engine is still inside a cycle after the stop timeout the
    /// instance is kept and [`AdcError::StopTimeout`] is returned; a later
    /// `stop` or `start` reaps it once the cycle has finished.
    pub fn stop(&mut self) -> Result<()> {
        let timeout = self.config.driver.stop_timeout();
        let Some(instance) = self.instance.as_mut() else {
            return Err(AdcError::NotRunning);
        };

        if !instance.stop(timeout) {
            tracing::error!("ADC engine still busy after {:?}, keeping instance", timeout);
            return Err(AdcError::StopTimeout(timeout));
        }

        self.instance = None;
        tracing::info!("ADC driver stopped");
        Ok(())
    }

    /// Run the self-test; fails immediately when no instance is running
    pub fn test(&self, out: &mut dyn Write) -> Result<SelfTestOutcome> {
        if !self.is_running() {
            return Err(AdcError::NotRunning);
        }

        let outcome = run_self_test(&self.topic, &self.config.self_test, out)?;
        if !outcome.passed() {
            return Err(AdcError::SelfTest(format!(
                "no report within {:?}",
                self.config.self_test.initial_wait()
            )));
        }
        Ok(outcome)
    }

    /// Print the driver status
    pub fn status(&self, out: &mut dyn Write) -> Result<()> {
        let Some(instance) = &self.instance else {
            writeln!(out, "adc: not running")?;
            return Ok(());
        };

        writeln!(out, "adc: {} on {}", instance.state(), self.work_queue.name())?;
        writeln!(out, "backend: {}", self.config.hal.backend_name())?;
        writeln!(out, "base: {:#x}", self.config.driver.base_address)?;
        writeln!(out, "interval: {}us", self.config.driver.interval_us)?;
        writeln!(out, "channels: {}", instance.channels())?;
        if instance.channels().is_over_capacity() {
            writeln!(out, "warning: only the first channels fit in a report")?;
        }
        writeln!(out, "{}", instance.stats())?;
        Ok(())
    }

    /// Execute one command line and return its result code
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> i32 {
        let verb = match line.split_whitespace().next() {
            Some(verb) => verb,
            None => {
                let _ = print_usage(out, None);
                return 1;
            }
        };

        let command = match verb.parse::<Command>() {
            Ok(command) => command,
            Err(_) => {
                let _ = print_usage(out, Some("unknown command"));
                return 1;
            }
        };

        let result = match command {
            Command::Start => self.start().map(|_| 0),
            Command::Stop => self.stop().map(|_| 0),
            Command::Status => self.status(out).map(|_| 0),
            Command::Test => self.test(out).map(|outcome| outcome.exit_code()),
            Command::Help => print_usage(out, None).map(|_| 0).map_err(AdcError::from),
        };

        match result {
            Ok(code) => code,
            Err(e) => {
                let _ = writeln!(out, "adc {}: {}", verb, e);
                e.exit_code()
            }
        }
    }

    /// Run `commands` in order, then read one command per line from `input`.
    ///
    /// Reading stops at `exit`, `quit` or end of input. When `commands` is
    /// not empty, `input` is only read if they left the engine running, so
    /// `adc start` keeps sampling until a `stop` or `exit` arrives. Returns
    /// the result code of the last command.
    pub fn run_session(
        &mut self,
        commands: &[String],
        input: &mut dyn BufRead,
        out: &mut dyn Write,
    ) -> std::io::Result<i32> {
        let mut code = 0;
        for command in commands {
            code = self.execute(command, out);
            if code != 0 {
                return Ok(code);
            }
        }
        if !commands.is_empty() && !self.is_running() {
            return Ok(code);
        }

        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if command == "exit" || command == "quit" {
                break;
            }

            code = self.execute(command, out);
            if code != 0 {
                writeln!(out, "adc: {} returned {}", command, code)?;
            }
            out.flush()?;
        }

        Ok(code)
    }
}

impl Drop for AdcController {
    fn drop(&mut self) {
        if self.instance.is_some() {
            let _ = self.stop();
        }
    }
}

/// Print the module description and commands, preceded by `reason`
pub fn print_usage(out: &mut dyn Write, reason: Option<&str>) -> std::io::Result<()> {
    if let Some(reason) = reason {
        tracing::warn!("{}", reason);
        writeln!(out, "{}\n", reason)?;
    }

    writeln!(out, "### Description")?;
    writeln!(out, "ADC driver.")?;
    writeln!(out)?;
    writeln!(out, "Usage: adc <command>")?;
    writeln!(out, "  start      Start sampling")?;
    writeln!(out, "  stop       Stop sampling")?;
    writeln!(out, "  status     Print driver status")?;
    writeln!(out, "  test       Print live readings of every channel")?;
    writeln!(out, "  help       Print this message")
}
