//! Tool Registry
//!
//! The single list of scanners both front-ends dispatch through. Each tool
//! has a binary name (used by the HTTP `/scan` endpoint and as the `tool`
//! annotation on results) and, for tools advertised over MCP, a protocol
//! name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered security tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Network discovery and service detection
    Nmap,
    /// Template-based vulnerability scanner
    Nuclei,
    /// Web fuzzer for endpoint discovery
    Ffuf,
    /// HTTP parameter discovery
    Arjun,
    /// URL prober
    Httpx,
    /// Web server scanner
    Nikto,
    /// Web content scanner
    Dirb,
}

impl ToolKind {
    /// Every registered tool, in advertisement order
    pub const ALL: [ToolKind; 7] = [
        ToolKind::Nmap,
        ToolKind::Nuclei,
        ToolKind::Ffuf,
        ToolKind::Arjun,
        ToolKind::Httpx,
        ToolKind::Nikto,
        ToolKind::Dirb,
    ];

    /// Executable name inside the execution environment
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Nmap => "nmap",
            Self::Nuclei => "nuclei",
            Self::Ffuf => "ffuf",
            Self::Arjun => "arjun",
            Self::Httpx => "httpx",
            Self::Nikto => "nikto",
            Self::Dirb => "dirb",
        }
    }

    /// Name under which the tool is advertised over MCP, if it is
    pub fn mcp_name(&self) -> Option<&'static str> {
        match self {
            Self::Nmap => Some("scan_network"),
            Self::Nuclei => Some("scan_vulnerabilities"),
            Self::Ffuf => Some("fuzz_endpoints"),
            Self::Arjun => Some("discover_parameters"),
            Self::Httpx => Some("probe_urls"),
            Self::Nikto | Self::Dirb => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Nmap => "Run nmap network scan for port discovery and service detection",
            Self::Nuclei => {
                "Run nuclei vulnerability scanner with templates to detect security issues"
            }
            Self::Ffuf => {
                "Run ffuf to discover hidden endpoints, directories, and files via fuzzing"
            }
            Self::Arjun => "Run arjun to discover hidden API parameters",
            Self::Httpx => "Run httpx to probe URLs and get status codes, content types, and titles",
            Self::Nikto => "Run nikto web server vulnerability scanner",
            Self::Dirb => "Run dirb web content scanner",
        }
    }

    /// Look a tool up by binary name or MCP name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.binary() == name || kind.mcp_name() == Some(name))
    }

    /// Tools advertised over MCP
    pub fn mcp_tools() -> impl Iterator<Item = ToolKind> {
        Self::ALL.into_iter().filter(|kind| kind.mcp_name().is_some())
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Error returned when parsing an unknown tool name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tool: {0}")]
pub struct UnknownTool(pub String);

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownTool(s.to_string()))
    }
}
