//! Input schemas advertised by `tools/list`

use serde_json::{json, Value};

use super::protocol::Tool;
use crate::tools::{ToolKind, DEFAULT_METHOD, DEFAULT_SCAN_TYPE, DEFAULT_WORDLIST};

/// JSON Schema for a tool's arguments, `None` for tools not exposed over MCP
pub fn input_schema(kind: ToolKind) -> Option<Value> {
    let schema = match kind {
        ToolKind::Nmap => json!({
            "type": "object",
            "properties": {
                "target": {
                    "type": "string",
                    "description": "Target IP, hostname, or CIDR range (e.g., '192.168.1.1', 'example.com', '10.0.0.0/24')"
                },
                "ports": {
                    "type": "string",
                    "description": "Port specification (e.g., '22,80,443' or '1-1000'). Optional."
                },
                "scan_type": {
                    "type": "string",
                    "description": "Nmap scan type flags (default: 'sV' for version detection)",
                    "default": DEFAULT_SCAN_TYPE
                },
                "extra_args": {
                    "type": "string",
                    "description": "Additional nmap arguments"
                }
            },
            "required": ["target"]
        }),
        ToolKind::Nuclei => json!({
            "type": "object",
            "properties": {
                "target": {
                    "type": "string",
                    "description": "Target URL (e.g., 'https://example.com')"
                },
                "templates": {
                    "type": "string",
                    "description": "Template category or path (e.g., 'cves', 'exposures', 'vulnerabilities')"
                },
                "severity": {
                    "type": "string",
                    "description": "Filter by severity: critical, high, medium, low, info"
                },
                "extra_args": {
                    "type": "string",
                    "description": "Additional nuclei arguments"
                }
            },
            "required": ["target"]
        }),
        ToolKind::Ffuf => json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Target URL with FUZZ keyword (e.g., 'https://example.com/FUZZ')"
                },
                "wordlist": {
                    "type": "string",
                    "description": "Path to wordlist file",
                    "default": DEFAULT_WORDLIST
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (GET, POST, etc.)",
                    "default": DEFAULT_METHOD
                },
                "extra_args": {
                    "type": "string",
                    "description": "Additional ffuf arguments"
                }
            },
            "required": ["url"]
        }),
        ToolKind::Arjun => json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Target API URL"
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (GET, POST)",
                    "default": DEFAULT_METHOD
                },
                "extra_args": {
                    "type": "string",
                    "description": "Additional arjun arguments"
                }
            },
            "required": ["url"]
        }),
        ToolKind::Httpx => json!({
            "type": "object",
            "properties": {
                "urls": {
                    "type": "string",
                    "description": "Single URL or comma-separated list of URLs"
                },
                "extra_args": {
                    "type": "string",
                    "description": "Additional httpx arguments"
                }
            },
            "required": ["urls"]
        }),
        ToolKind::Nikto | ToolKind::Dirb => return None,
    };
    Some(schema)
}

/// Tool definitions for every MCP-exposed tool, in registry order
pub fn tool_definitions() -> Vec<Tool> {
    ToolKind::mcp_tools()
        .filter_map(|kind| {
            Some(Tool {
                name: kind.mcp_name()?.to_string(),
                description: kind.description().to_string(),
                input_schema: input_schema(kind)?,
            })
        })
        .collect()
}
