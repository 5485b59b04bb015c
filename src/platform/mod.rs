// Uplift
// Copyright (C) 2025 - Uplift contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

//! The provisioning client: realizes topology resources on a
//! virtualization platform.
//!
//! Implementations are keyed by resource identity (the spec id is the
//! platform VMID), which makes `ensure` idempotent and safe to re-invoke
//! after a partial failure. The platform API is eventually consistent: a
//! successful create does not guarantee the resource is immediately
//! queryable, so callers never assume synchronous visibility.

pub mod proxmox;
pub mod simulate;

use crate::error::{Result, UpliftError};
use crate::run::cancel::CancelToken;
use crate::topology::spec::{AddressFamily, ResourceSpec};
use std::thread;
use std::time::Duration;

/// Lifecycle of a realized resource. `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Creating,
    Created,
    Booting,
    Ready,
    Failed,
}

impl ResourceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceState::Ready | ResourceState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Creating => "creating",
            ResourceState::Created => "created",
            ResourceState::Booting => "booting",
            ResourceState::Ready => "ready",
            ResourceState::Failed => "failed",
        }
    }
}

/// Runtime handle for a spec realized on the platform.
#[derive(Debug, Clone)]
pub struct ProvisionedResource {
    /// Back-reference to the spec; lookup only, no ownership.
    pub spec_id: u64,
    /// Opaque id assigned by the platform.
    pub handle: String,
    pub state: ResourceState,
}

impl ProvisionedResource {
    pub fn new(spec_id: u64, handle: String, state: ResourceState) -> Self {
        Self { spec_id, handle, state }
    }

    /// Advance the lifecycle. Terminal states are immutable; an attempt to
    /// leave one is ignored and reported as false.
    pub fn transition(&mut self, next: ResourceState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = next;
        true
    }
}

/// Whether `ensure` found the resource or had to create it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

/// Result of a successful `ensure` call.
#[derive(Debug, Clone)]
pub struct Ensured {
    pub resource: ProvisionedResource,
    pub outcome: EnsureOutcome,
}

/// One address reported by the in-guest discovery channel.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestAddress {
    pub address: String,
    pub family: AddressFamily,
}

/// One guest interface with its addresses, in reported order.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestInterface {
    pub name: String,
    pub addresses: Vec<GuestAddress>,
}

/// Outcome of one discovery poll.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentPing {
    /// Guest or agent not up yet; poll again.
    NotReady,
    /// Interface report, possibly still without a usable address.
    Interfaces(Vec<GuestInterface>),
}

/// Platform contract used by the orchestrator and the readiness poller.
pub trait Platform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Look up the platform handle for a spec's identity, if realized.
    fn find(&self, spec: &ResourceSpec) -> Result<Option<String>>;

    /// Idempotent create-or-adopt keyed by `spec.id`. At-least-once
    /// semantics: safe to call again after a partial failure.
    fn ensure(&self, spec: &ResourceSpec) -> Result<Ensured>;

    /// One poll of the in-guest discovery channel.
    fn query_interfaces(&self, spec: &ResourceSpec, handle: &str) -> Result<AgentPing>;

    /// Tear down the realized resource. Returns false when nothing existed.
    fn destroy(&self, spec: &ResourceSpec) -> Result<bool>;
}

/// Retry policy for transient platform failures.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            cap: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

/// Run `f`, retrying transient failures with exponential backoff until the
/// attempt budget is spent. Fatal errors surface immediately. Cancellation
/// is observed between attempts, never mid-call.
pub fn retry_transient<T, F>(policy: &BackoffPolicy, cancel: &CancelToken, mut f: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut delay = policy.base;
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(UpliftError::Cancelled);
        }
        attempt += 1;
        match f() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                thread::sleep(delay);
                delay = (delay * 2).min(policy.cap);
            }
            Err(e) => return Err(e),
        }
    }
}
