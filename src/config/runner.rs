// src/config/runner.rs

//! Turning a validated [`ConfigFile`] into running handles.

use std::time::Duration;

use crate::config::model::{CommandEntry, CommandInput, ConfigFile};
use crate::errors::Result;
use crate::pipeline::{Pipe, Pipeline, RunningPipeline};
use crate::pool::{Pool, PoolBuilder, RunningPool};
use crate::process::{Input, ProcessResult};
use crate::types::{ExecutionMode, Key, Signal};

/// Whatever the configured mode started.
#[derive(Debug, Clone)]
pub enum Started {
    Pool(RunningPool),
    Pipeline(RunningPipeline),
}

/// Results of a configured run.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Key → result, one entry per distinct key.
    Pool(std::collections::HashMap<Key, ProcessResult>),
    Pipeline(ProcessResult),
}

impl Outcome {
    pub fn successful(&self) -> bool {
        match self {
            Outcome::Pool(results) => results.values().all(ProcessResult::successful),
            Outcome::Pipeline(result) => result.successful(),
        }
    }
}

impl Started {
    pub async fn wait(&self) -> Outcome {
        match self {
            Started::Pool(pool) => Outcome::Pool(pool.wait().await),
            Started::Pipeline(pipe) => Outcome::Pipeline(pipe.wait().await),
        }
    }

    pub fn signal(&self, signal: Signal) -> Result<()> {
        match self {
            Started::Pool(pool) => pool.signal(signal),
            Started::Pipeline(pipe) => pipe.signal(signal),
        }
    }

    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        match self {
            Started::Pool(pool) => pool.stop(timeout).await,
            Started::Pipeline(pipe) => pipe.stop(timeout).await,
        }
    }
}

fn input_of(entry: &CommandEntry) -> Option<Input> {
    entry.input.as_ref().map(|input| match input {
        CommandInput::Literal(text) => Input::from(text.as_str()),
        CommandInput::File(path) => Input::file(path),
    })
}

impl ConfigFile {
    /// The pool this config describes, without its commands.
    pub fn pool(&self) -> Pool {
        let mut pool = Pool::new()
            .concurrency(self.concurrency)
            .strategy_kind(self.strategy);
        if let Some(timeout) = self.timeout {
            pool = pool.timeout(timeout);
        }
        pool
    }

    pub fn pipeline(&self) -> Pipeline {
        let mut pipeline = Pipeline::new();
        if let Some(timeout) = self.timeout {
            pipeline = pipeline.timeout(timeout);
        }
        pipeline
    }

    fn fill_pool(&self, builder: &mut PoolBuilder) {
        for entry in &self.commands {
            let cmd = builder.command(entry.program.clone(), entry.args.iter().cloned());
            cmd.key(entry.key.clone()).priority(entry.priority);
            if let Some(timeout) = entry.timeout {
                cmd.timeout(timeout);
            }
            if let Some(path) = &entry.path {
                cmd.path(path);
            }
            for (k, v) in &entry.env {
                cmd.env(k, v);
            }
            if let Some(input) = input_of(entry) {
                cmd.input(input);
            }
            if entry.quiet {
                cmd.quiet();
            }
            if entry.disable_buffering {
                cmd.disable_buffering();
            }
        }
    }

    fn fill_pipe(&self, pipe: &mut Pipe) {
        for entry in &self.commands {
            let step = pipe.command(entry.program.clone(), entry.args.iter().cloned());
            step.key(entry.key.clone());
            if let Some(path) = &entry.path {
                step.path(path);
            }
            for (k, v) in &entry.env {
                step.env(k, v);
            }
            if let Some(input) = input_of(entry) {
                step.input(input);
            }
            if entry.quiet {
                step.quiet();
            }
            if entry.disable_buffering {
                step.disable_buffering();
            }
        }
    }

    pub fn start_pool(&self) -> Result<RunningPool> {
        self.pool().start(|b| self.fill_pool(b))
    }

    pub fn start_pipeline(&self) -> Result<RunningPipeline> {
        self.pipeline().start(|p| self.fill_pipe(p))
    }

    /// Start in the configured mode.
    pub fn start(&self) -> Result<Started> {
        match self.mode {
            ExecutionMode::Pool => self.start_pool().map(Started::Pool),
            ExecutionMode::Pipeline => self.start_pipeline().map(Started::Pipeline),
        }
    }

    /// `(key, command line)` in the order commands would start.
    pub fn plan(&self) -> Vec<(Key, String)> {
        match self.mode {
            ExecutionMode::Pool => self.pool().plan(|b| self.fill_pool(b)),
            ExecutionMode::Pipeline => {
                let mut pipe = Pipe::default();
                self.fill_pipe(&mut pipe);
                pipe.plan()
            }
        }
    }
}
