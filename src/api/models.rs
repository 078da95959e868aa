//! Request and response bodies

use serde::{Deserialize, Serialize};

/// Scan id reported by `/scan`; scans are not tracked, so it never varies
pub const SCAN_ID: &str = "scan-1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub docker: bool,
    pub database: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub tool: String,
    pub target: String,
    #[serde(default)]
    pub options: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResponse {
    pub id: String,
    pub status: String,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceStatus {
    pub name: String,
    pub status: String,
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Tools listed by `/tools`
pub const TOOL_CATALOG: [(&str, &str); 6] = [
    ("nmap", "Network discovery and security auditing"),
    ("nuclei", "Fast vulnerability scanner"),
    ("nikto", "Web server vulnerability scanner"),
    ("dirb", "Web content scanner"),
    ("sqlmap", "SQL injection detection"),
    ("metasploit", "Penetration testing framework"),
];

/// `kalidocker-kali-1` is shown as `kali`
pub fn display_name(container: &str) -> &str {
    let name = container.strip_prefix("kalidocker-").unwrap_or(container);
    name.strip_suffix("-1").unwrap_or(name)
}

/// Short container id, as `docker ps` prints it
pub fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}
