//! Tool Adapters
//!
//! [`Toolbox`] composes the command builder with the process runner. Each
//! operation builds one command, runs it under the tool's timeout and
//! attributes the result to the tool and the caller's target. The toolbox
//! holds no per-call state, so one instance serves every request.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use super::builder::{
    ContentScan, EndpointFuzz, NetworkScan, ParameterDiscovery, ToolInvocation, UrlProbe,
    VulnerabilityScan, WebServerScan,
};
use super::executor::{ExecutionResult, ProcessRunner};
use super::registry::ToolKind;
use super::timeout::ExecutionTimeout;
use crate::metrics;

/// Per-tool timeouts, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolTimeouts {
    pub nmap: u64,
    pub nuclei: u64,
    pub ffuf: u64,
    pub arjun: u64,
    pub httpx: u64,
    pub nikto: u64,
    pub dirb: u64,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            nmap: 300,
            nuclei: 600,
            ffuf: 300,
            arjun: 300,
            httpx: 120,
            nikto: 600,
            dirb: 300,
        }
    }
}

impl ToolTimeouts {
    pub fn secs(&self, kind: ToolKind) -> u64 {
        match kind {
            ToolKind::Nmap => self.nmap,
            ToolKind::Nuclei => self.nuclei,
            ToolKind::Ffuf => self.ffuf,
            ToolKind::Arjun => self.arjun,
            ToolKind::Httpx => self.httpx,
            ToolKind::Nikto => self.nikto,
            ToolKind::Dirb => self.dirb,
        }
    }

    pub fn secs_mut(&mut self, kind: ToolKind) -> &mut u64 {
        match kind {
            ToolKind::Nmap => &mut self.nmap,
            ToolKind::Nuclei => &mut self.nuclei,
            ToolKind::Ffuf => &mut self.ffuf,
            ToolKind::Arjun => &mut self.arjun,
            ToolKind::Httpx => &mut self.httpx,
            ToolKind::Nikto => &mut self.nikto,
            ToolKind::Dirb => &mut self.dirb,
        }
    }

    pub fn for_tool(&self, kind: ToolKind) -> ExecutionTimeout {
        ExecutionTimeout::from_secs(self.secs(kind))
    }
}

/// Runs registered tools through one shared process runner
#[derive(Debug, Clone)]
pub struct Toolbox {
    runner: Arc<ProcessRunner>,
    timeouts: ToolTimeouts,
}

impl Toolbox {
    pub fn new(runner: ProcessRunner, timeouts: ToolTimeouts) -> Self {
        Self {
            runner: Arc::new(runner),
            timeouts,
        }
    }

    /// Run any tool invocation
    ///
    /// A parameter that fails validation produces a failure result without
    /// spawning anything.
    #[instrument(skip(self, invocation), fields(tool = %invocation.kind(), target = %invocation.target()))]
    pub async fn run(&self, invocation: ToolInvocation) -> ExecutionResult {
        let kind = invocation.kind();
        let start = Instant::now();

        let result = match invocation.build() {
            Ok(command) => {
                self.runner
                    .run(&command, self.timeouts.for_tool(kind))
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Rejected tool parameters");
                ExecutionResult::failure(e.to_string(), start.elapsed())
            }
        };

        metrics::record_scan(kind, &result);
        info!(
            success = result.success,
            return_code = result.return_code,
            duration_ms = result.duration_ms,
            "Tool run finished"
        );
        result.annotate(kind, invocation.target())
    }

    pub async fn scan_network(&self, params: NetworkScan) -> ExecutionResult {
        self.run(ToolInvocation::NetworkScan(params)).await
    }

    pub async fn scan_vulnerabilities(&self, params: VulnerabilityScan) -> ExecutionResult {
        self.run(ToolInvocation::VulnerabilityScan(params)).await
    }

    pub async fn fuzz_endpoints(&self, params: EndpointFuzz) -> ExecutionResult {
        self.run(ToolInvocation::EndpointFuzz(params)).await
    }

    pub async fn discover_parameters(&self, params: ParameterDiscovery) -> ExecutionResult {
        self.run(ToolInvocation::ParameterDiscovery(params)).await
    }

    pub async fn probe_urls(&self, params: UrlProbe) -> ExecutionResult {
        self.run(ToolInvocation::UrlProbe(params)).await
    }

    /// nikto
    pub async fn scan_web_server(&self, params: WebServerScan) -> ExecutionResult {
        self.run(ToolInvocation::WebServerScan(params)).await
    }

    /// dirb
    pub async fn scan_content(&self, params: ContentScan) -> ExecutionResult {
        self.run(ToolInvocation::ContentScan(params)).await
    }
}
