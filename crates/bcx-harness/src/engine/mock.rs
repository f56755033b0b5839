//! In-memory engine for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use bcx_harness_common::mutex_lock_or_recover;

use super::ContainerEngine;
use super::ContainerInfo;
use super::CreateSpec;
use super::EngineError;
use super::StartSpec;
use crate::ports::Channel;
use crate::ports::HostBinding;
use crate::ports::PortMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create(CreateSpec),
    Start(String, StartSpec),
    Inspect(String),
    Restart(String),
    Wait(String),
    Remove { id: String, force: bool },
    Commit { id: String, repo: String },
}

impl EngineCall {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCall::Create(_) => "create",
            EngineCall::Start(..) => "start",
            EngineCall::Inspect(_) => "inspect",
            EngineCall::Restart(_) => "restart",
            EngineCall::Wait(_) => "wait",
            EngineCall::Remove { .. } => "remove",
            EngineCall::Commit { .. } => "commit",
        }
    }
}

#[derive(Debug)]
struct State {
    next_id: usize,
    ports: PortMap,
    hidden_inspects: usize,
    failing: Vec<&'static str>,
    failing_once: Vec<&'static str>,
    exit_code: i64,
    running: HashMap<String, bool>,
}

/// Records every call and answers from configurable state.
#[derive(Debug)]
pub struct MockEngine {
    state: Mutex<State>,
    calls: Mutex<Vec<EngineCall>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ports: PortMap {
                    p2p: 40001,
                    rpc_shares: 40002,
                    rpc_credits: 40003,
                },
                hidden_inspects: 0,
                failing: Vec::new(),
                failing_once: Vec::new(),
                exit_code: 0,
                running: HashMap::new(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_ports(self, ports: PortMap) -> Self {
        self.set_ports(ports);
        self
    }

    /// The next `count` inspects report no network settings.
    pub fn with_hidden_ports(self, count: usize) -> Self {
        self.hide_ports(count);
        self
    }

    pub fn hide_ports(&self, count: usize) {
        mutex_lock_or_recover(&self.state).hidden_inspects = count;
    }

    /// Makes every call of `operation` (`"create"`, `"start"`, ...) fail.
    pub fn with_failure(self, operation: &'static str) -> Self {
        mutex_lock_or_recover(&self.state).failing.push(operation);
        self
    }

    /// Makes only the next call of `operation` fail.
    pub fn with_failure_once(self, operation: &'static str) -> Self {
        mutex_lock_or_recover(&self.state).failing_once.push(operation);
        self
    }

    pub fn with_exit_code(self, code: i64) -> Self {
        mutex_lock_or_recover(&self.state).exit_code = code;
        self
    }

    /// Ports reported by later inspects, e.g. after a restart.
    pub fn set_ports(&self, ports: PortMap) {
        mutex_lock_or_recover(&self.state).ports = ports;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        mutex_lock_or_recover(&self.calls).clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls().iter().map(EngineCall::name).collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.name() == operation)
            .count()
    }

    pub fn start_spec(&self) -> Option<StartSpec> {
        self.calls().into_iter().find_map(|call| match call {
            EngineCall::Start(_, spec) => Some(spec),
            _ => None,
        })
    }

    pub fn create_spec(&self) -> Option<CreateSpec> {
        self.calls().into_iter().find_map(|call| match call {
            EngineCall::Create(spec) => Some(spec),
            _ => None,
        })
    }

    fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        let operation = call.name();
        mutex_lock_or_recover(&self.calls).push(call);
        let mut state = mutex_lock_or_recover(&self.state);
        let once = state.failing_once.iter().position(|op| *op == operation);
        if let Some(index) = once {
            state.failing_once.remove(index);
        }
        if once.is_some() || state.failing.contains(&operation) {
            return Err(EngineError::Rejected {
                message: format!("mock {operation} failure"),
            });
        }
        Ok(())
    }
}

fn bindings(ports: &PortMap) -> HashMap<String, Vec<HostBinding>> {
    Channel::ALL
        .iter()
        .map(|channel| {
            (
                channel.port_key(),
                vec![HostBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(ports.get(*channel).to_string()),
                }],
            )
        })
        .collect()
}

impl ContainerEngine for MockEngine {
    fn create(&self, spec: &CreateSpec) -> Result<String, EngineError> {
        self.record(EngineCall::Create(spec.clone()))?;
        let mut state = mutex_lock_or_recover(&self.state);
        let id = format!("mock-{}", state.next_id);
        state.next_id += 1;
        state.running.insert(id.clone(), false);
        Ok(id)
    }

    fn start(&self, id: &str, spec: &StartSpec) -> Result<(), EngineError> {
        self.record(EngineCall::Start(id.to_string(), spec.clone()))?;
        mutex_lock_or_recover(&self.state)
            .running
            .insert(id.to_string(), true);
        Ok(())
    }

    fn inspect(&self, id: &str) -> Result<ContainerInfo, EngineError> {
        self.record(EngineCall::Inspect(id.to_string()))?;
        let mut state = mutex_lock_or_recover(&self.state);
        let Some(running) = state.running.get(id).copied() else {
            return Err(EngineError::NotFound { id: id.to_string() });
        };
        let ports = if state.hidden_inspects > 0 {
            state.hidden_inspects -= 1;
            None
        } else {
            Some(bindings(&state.ports))
        };
        Ok(ContainerInfo {
            id: id.to_string(),
            name: format!("/{id}"),
            running,
            ports,
        })
    }

    fn restart(&self, id: &str) -> Result<(), EngineError> {
        self.record(EngineCall::Restart(id.to_string()))
    }

    fn wait(&self, id: &str) -> Result<i64, EngineError> {
        self.record(EngineCall::Wait(id.to_string()))?;
        let mut state = mutex_lock_or_recover(&self.state);
        state.running.insert(id.to_string(), false);
        Ok(state.exit_code)
    }

    fn remove(&self, id: &str, force: bool) -> Result<(), EngineError> {
        self.record(EngineCall::Remove {
            id: id.to_string(),
            force,
        })?;
        mutex_lock_or_recover(&self.state).running.remove(id);
        Ok(())
    }

    fn commit(&self, id: &str, repo: &str) -> Result<(), EngineError> {
        self.record(EngineCall::Commit {
            id: id.to_string(),
            repo: repo.to_string(),
        })
    }
}
