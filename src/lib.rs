//! KaliDocker Library
//!
//! Runs Kali security tools (nmap, nuclei, ffuf, arjun, httpx, nikto, dirb)
//! inside a container and exposes them two ways: an HTTP API for the web UI
//! and an MCP server for AI assistants. Both front-ends share one
//! [`tools::Toolbox`], so validation, timeouts and result shapes are identical.

pub mod api;
pub mod config;
pub mod mcp;
pub mod metrics;
pub mod runtime;
pub mod tools;
