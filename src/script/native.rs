//! Host backed by named Rust closures instead of an interpreter.
//!
//! A source is a list of lines; each non-empty line that does not start with
//! `#` is `name arg arg ...`. A shading payload is the name of a registered
//! shader. The built-in `set <key> <value>` writes the shared environment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{JobContext, ScriptHost, ShadeEnv};
use crate::jobs::ParallelParams;
use crate::util::{Error, Result};

type CommandFn = dyn Fn(&[&str], &JobContext<'_>) -> Result<()> + Send + Sync;
type ShaderFn = dyn Fn(&ParallelParams, &JobContext<'_>) -> Result<()> + Send + Sync;

/// Registry of commands and shaders.
#[derive(Default)]
pub struct NativeHost {
    commands: HashMap<String, Arc<CommandFn>>,
    shaders: HashMap<String, Arc<ShaderFn>>,
    globals: Mutex<HashMap<String, String>>,
}

impl NativeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command callable from script lines.
    pub fn command<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[&str], &JobContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.commands.insert(name.into(), Arc::new(f));
        self
    }

    /// Register a per-pixel shader.
    pub fn shader<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ParallelParams, &JobContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.shaders.insert(name.into(), Arc::new(f));
        self
    }

    /// Value of a shared variable set with `set`.
    pub fn global(&self, key: &str) -> Option<String> {
        self.globals.lock().get(key).cloned()
    }

    pub fn num_globals(&self) -> usize {
        self.globals.lock().len()
    }

    fn run_line(&self, line: &str, ctx: &JobContext<'_>) -> Result<()> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(());
        };
        let args: Vec<&str> = tokens.collect();

        if name == "set" {
            let [key, value @ ..] = args.as_slice() else {
                return Err(Error::script("set: missing key"));
            };
            self.globals.lock().insert((*key).to_string(), value.join(" "));
            return Ok(());
        }

        let command = self
            .commands
            .get(name)
            .ok_or_else(|| Error::script(format!("Unknown command: {name}")))?;
        command(args.as_slice(), ctx)
    }
}

impl ScriptHost for NativeHost {
    fn execute(&self, source: &str, ctx: &JobContext<'_>) -> Result<()> {
        for line in source.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.run_line(line, ctx)?;
        }
        Ok(())
    }

    fn new_env(&self) -> Box<dyn ShadeEnv> {
        Box::new(NativeEnv {
            shaders: self.shaders.clone(),
            shaded: 0,
        })
    }

    fn reset(&self) {
        self.globals.lock().clear();
    }
}

impl fmt::Debug for NativeHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHost")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("shaders", &self.shaders.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Private environment handed to one worker.
pub struct NativeEnv {
    shaders: HashMap<String, Arc<ShaderFn>>,
    shaded: u64,
}

impl NativeEnv {
    /// Pixels shaded since this environment was created.
    pub fn shaded(&self) -> u64 {
        self.shaded
    }
}

impl ShadeEnv for NativeEnv {
    fn shade(&mut self, params: &ParallelParams, ctx: &JobContext<'_>) -> Result<()> {
        let name = params.payload.trim();
        let shader = self
            .shaders
            .get(name)
            .ok_or_else(|| Error::script(format!("Failed to execute parallel script: unknown shader '{name}'")))?;
        shader(params, ctx)?;
        self.shaded += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Job, Scheduler};
    use crate::resources::Resources;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_execute_lines() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let host = NativeHost::new()
            .command("bump", move |args, _| {
                counter.fetch_add(args.len().max(1), Ordering::SeqCst);
                Ok(())
            });
        let host = Arc::new(host);

        let resources = Arc::new(Resources::new(16));
        let pool = Scheduler::with_workers(host.clone(), Arc::clone(&resources), 1).unwrap();
        pool.submit_single(Job::execute("# comment\n\nbump\nbump a b\nset name quad grid\n")).unwrap();
        pool.wait_idle();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(host.global("name").as_deref(), Some("quad grid"));
        assert_eq!(resources.num_errors(), 0);

        host.reset();
        assert_eq!(host.num_globals(), 0);
    }

    #[test]
    fn test_unknown_command_reports() {
        let resources = Arc::new(Resources::new(16));
        let pool = Scheduler::with_workers(Arc::new(NativeHost::new()), Arc::clone(&resources), 1).unwrap();
        pool.submit_single(Job::execute("frobnicate 1 2")).unwrap();
        pool.wait_idle();

        assert_eq!(resources.errors(), vec!["Unknown command: frobnicate".to_string()]);
    }
}
