//! Command Builder
//!
//! Pure mapping from typed tool parameters to a [`CommandSpec`]. Nothing here
//! touches a process or the filesystem. Parameter structs deserialize
//! directly from MCP tool arguments, so their serde defaults are the
//! defaults advertised in the tool schemas.

use serde::{Deserialize, Serialize};

use super::registry::ToolKind;
use super::validator::{check_flag, check_positional, split_options, CommandValidationError};

/// Default nmap scan type (version detection)
pub const DEFAULT_SCAN_TYPE: &str = "sV";

/// Default ffuf wordlist inside the Kali image
pub const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/dirb/common.txt";

/// Default HTTP method for ffuf and arjun
pub const DEFAULT_METHOD: &str = "GET";

fn default_scan_type() -> String {
    DEFAULT_SCAN_TYPE.to_string()
}

fn default_wordlist() -> String {
    DEFAULT_WORDLIST.to_string()
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

/// An optional parameter; blank strings count as not given
fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// A defaulted parameter; a blank value falls back to `default`
fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// A command ready for execution: program, argument vector and optional stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Render as a single space-joined line (for logs and diagnostics only)
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Append validated free-form options, if any
fn with_extra_args(
    spec: CommandSpec,
    extra_args: Option<&str>,
) -> Result<CommandSpec, CommandValidationError> {
    match extra_args {
        Some(raw) => Ok(spec.args(split_options("extra_args", raw)?)),
        None => Ok(spec),
    }
}

/// nmap network scan parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkScan {
    /// Target IP, hostname, or CIDR range
    pub target: String,
    pub ports: Option<String>,
    #[serde(default = "default_scan_type")]
    pub scan_type: String,
    pub extra_args: Option<String>,
}

impl NetworkScan {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ports: None,
            scan_type: default_scan_type(),
            extra_args: None,
        }
    }

    /// `nmap -<scan_type> [-p <ports>] [<extra_args>] <target>`
    pub fn build(&self) -> Result<CommandSpec, CommandValidationError> {
        let mut spec = CommandSpec::new(ToolKind::Nmap.binary())
            .arg(format!(
                "-{}",
                check_flag("scan_type", or_default(&self.scan_type, DEFAULT_SCAN_TYPE))?
            ));
        if let Some(ports) = provided(&self.ports) {
            spec = spec.arg("-p").arg(check_positional("ports", ports)?);
        }
        let spec = with_extra_args(spec, self.extra_args.as_deref())?;
        Ok(spec.arg(check_positional("target", &self.target)?))
    }
}

/// nuclei vulnerability scan parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityScan {
    /// Target URL
    pub target: String,
    pub templates: Option<String>,
    pub severity: Option<String>,
    pub extra_args: Option<String>,
}

impl VulnerabilityScan {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            templates: None,
            severity: None,
            extra_args: None,
        }
    }

    /// `nuclei -u <target> [-t <templates>] [-severity <severity>] [<extra_args>]`
    pub fn build(&self) -> Result<CommandSpec, CommandValidationError> {
        let mut spec = CommandSpec::new(ToolKind::Nuclei.binary())
            .arg("-u")
            .arg(check_positional("target", &self.target)?);
        if let Some(templates) = provided(&self.templates) {
            spec = spec.arg("-t").arg(check_positional("templates", templates)?);
        }
        if let Some(severity) = provided(&self.severity) {
            spec = spec
                .arg("-severity")
                .arg(check_positional("severity", severity)?);
        }
        with_extra_args(spec, self.extra_args.as_deref())
    }
}

/// ffuf endpoint fuzzing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFuzz {
    /// Target URL containing the `FUZZ` keyword
    pub url: String,
    #[serde(default = "default_wordlist")]
    pub wordlist: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub extra_args: Option<String>,
}

impl EndpointFuzz {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wordlist: default_wordlist(),
            method: default_method(),
            extra_args: None,
        }
    }

    /// `ffuf -u <url> -w <wordlist> -X <method> -mc all -fc 404 [<extra_args>]`
    pub fn build(&self) -> Result<CommandSpec, CommandValidationError> {
        let spec = CommandSpec::new(ToolKind::Ffuf.binary())
            .arg("-u")
            .arg(check_positional("url", &self.url)?)
            .arg("-w")
            .arg(check_positional("wordlist", or_default(&self.wordlist, DEFAULT_WORDLIST))?)
            .arg("-X")
            .arg(check_positional("method", or_default(&self.method, DEFAULT_METHOD))?)
            .args(["-mc", "all", "-fc", "404"]);
        with_extra_args(spec, self.extra_args.as_deref())
    }
}

/// arjun parameter discovery parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDiscovery {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub extra_args: Option<String>,
}

impl ParameterDiscovery {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            extra_args: None,
        }
    }

    /// `arjun -u <url> -m <method> [<extra_args>]`
    pub fn build(&self) -> Result<CommandSpec, CommandValidationError> {
        let spec = CommandSpec::new(ToolKind::Arjun.binary())
            .arg("-u")
            .arg(check_positional("url", &self.url)?)
            .arg("-m")
            .arg(check_positional("method", or_default(&self.method, DEFAULT_METHOD))?);
        with_extra_args(spec, self.extra_args.as_deref())
    }
}

/// httpx URL probing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlProbe {
    /// Single URL or comma-separated list of URLs
    pub urls: String,
    pub extra_args: Option<String>,
}

impl UrlProbe {
    pub fn new(urls: impl Into<String>) -> Self {
        Self {
            urls: urls.into(),
            extra_args: None,
        }
    }

    /// `httpx -silent -status-code -content-type -title [<extra_args>]`
    ///
    /// The URL list is fed on stdin, one URL per line.
    pub fn build(&self) -> Result<CommandSpec, CommandValidationError> {
        let mut input = String::new();
        for url in self.urls.split(',').map(str::trim).filter(|u| !u.is_empty()) {
            input.push_str(check_positional("urls", url)?);
            input.push('\n');
        }
        if input.is_empty() {
            return Err(CommandValidationError::Empty {
                field: "urls".to_string(),
            });
        }

        let spec = CommandSpec::new(ToolKind::Httpx.binary())
            .args(["-silent", "-status-code", "-content-type", "-title"])
            .stdin(input);
        with_extra_args(spec, self.extra_args.as_deref())
    }
}

/// nikto web server scan parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebServerScan {
    pub target: String,
    pub extra_args: Option<String>,
}

impl WebServerScan {
    /// `nikto -h <target> [<extra_args>]`
    pub fn build(&self) -> Result<CommandSpec, CommandValidationError> {
        let spec = CommandSpec::new(ToolKind::Nikto.binary())
            .arg("-h")
            .arg(check_positional("target", &self.target)?);
        with_extra_args(spec, self.extra_args.as_deref())
    }
}

/// dirb content scan parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentScan {
    pub target: String,
    pub extra_args: Option<String>,
}

impl ContentScan {
    /// `dirb <target> [<extra_args>]`
    pub fn build(&self) -> Result<CommandSpec, CommandValidationError> {
        let spec = CommandSpec::new(ToolKind::Dirb.binary())
            .arg(check_positional("target", &self.target)?);
        with_extra_args(spec, self.extra_args.as_deref())
    }
}

/// A fully-typed request for one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    NetworkScan(NetworkScan),
    VulnerabilityScan(VulnerabilityScan),
    EndpointFuzz(EndpointFuzz),
    ParameterDiscovery(ParameterDiscovery),
    UrlProbe(UrlProbe),
    WebServerScan(WebServerScan),
    ContentScan(ContentScan),
}

impl ToolInvocation {
    /// Deserialize tool arguments (as received over MCP) for `kind`
    pub fn from_arguments(
        kind: ToolKind,
        arguments: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ToolKind::Nmap => Self::NetworkScan(serde_json::from_value(arguments)?),
            ToolKind::Nuclei => Self::VulnerabilityScan(serde_json::from_value(arguments)?),
            ToolKind::Ffuf => Self::EndpointFuzz(serde_json::from_value(arguments)?),
            ToolKind::Arjun => Self::ParameterDiscovery(serde_json::from_value(arguments)?),
            ToolKind::Httpx => Self::UrlProbe(serde_json::from_value(arguments)?),
            ToolKind::Nikto => Self::WebServerScan(serde_json::from_value(arguments)?),
            ToolKind::Dirb => Self::ContentScan(serde_json::from_value(arguments)?),
        })
    }

    /// Build from the HTTP `/scan` shape: one target plus a free-form option string
    ///
    /// The target lands in the tool's required field and the options become
    /// its extra arguments; every other parameter keeps its default.
    pub fn from_target(kind: ToolKind, target: impl Into<String>, options: Option<String>) -> Self {
        let target = target.into();
        match kind {
            ToolKind::Nmap => Self::NetworkScan(NetworkScan {
                extra_args: options,
                ..NetworkScan::new(target)
            }),
            ToolKind::Nuclei => Self::VulnerabilityScan(VulnerabilityScan {
                extra_args: options,
                ..VulnerabilityScan::new(target)
            }),
            ToolKind::Ffuf => Self::EndpointFuzz(EndpointFuzz {
                extra_args: options,
                ..EndpointFuzz::new(target)
            }),
            ToolKind::Arjun => Self::ParameterDiscovery(ParameterDiscovery {
                extra_args: options,
                ..ParameterDiscovery::new(target)
            }),
            ToolKind::Httpx => Self::UrlProbe(UrlProbe {
                extra_args: options,
                ..UrlProbe::new(target)
            }),
            ToolKind::Nikto => Self::WebServerScan(WebServerScan {
                target,
                extra_args: options,
            }),
            ToolKind::Dirb => Self::ContentScan(ContentScan {
                target,
                extra_args: options,
            }),
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::NetworkScan(_) => ToolKind::Nmap,
            Self::VulnerabilityScan(_) => ToolKind::Nuclei,
            Self::EndpointFuzz(_) => ToolKind::Ffuf,
            Self::ParameterDiscovery(_) => ToolKind::Arjun,
            Self::UrlProbe(_) => ToolKind::Httpx,
            Self::WebServerScan(_) => ToolKind::Nikto,
            Self::ContentScan(_) => ToolKind::Dirb,
        }
    }

    /// The caller-supplied target, as reported on the result
    pub fn target(&self) -> &str {
        match self {
            Self::NetworkScan(p) => &p.target,
            Self::VulnerabilityScan(p) => &p.target,
            Self::EndpointFuzz(p) => &p.url,
            Self::ParameterDiscovery(p) => &p.url,
            Self::UrlProbe(p) => &p.urls,
            Self::WebServerScan(p) => &p.target,
            Self::ContentScan(p) => &p.target,
        }
    }

    pub fn build(&self) -> Result<CommandSpec, CommandValidationError> {
        match self {
            Self::NetworkScan(p) => p.build(),
            Self::VulnerabilityScan(p) => p.build(),
            Self::EndpointFuzz(p) => p.build(),
            Self::ParameterDiscovery(p) => p.build(),
            Self::UrlProbe(p) => p.build(),
            Self::WebServerScan(p) => p.build(),
            Self::ContentScan(p) => p.build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nmap_defaults() {
        let spec = NetworkScan::new("10.0.0.1").build().unwrap();
        assert_eq!(spec.command_line(), "nmap -sV 10.0.0.1");
        assert!(spec.stdin.is_none());
    }

    #[test]
    fn test_nmap_ports_precede_extra_args() {
        let scan = NetworkScan {
            ports: Some("22,80".to_string()),
            extra_args: Some("-T4 --open".to_string()),
            ..NetworkScan::new("10.0.0.1")
        };
        let spec = scan.build().unwrap();
        assert_eq!(spec.command_line(), "nmap -sV -p 22,80 -T4 --open 10.0.0.1");
        assert_eq!(
            spec.args,
            vec!["-sV", "-p", "22,80", "-T4", "--open", "10.0.0.1"]
        );
    }

    #[test]
    fn test_nmap_custom_scan_type() {
        let scan = NetworkScan {
            scan_type: "sS".to_string(),
            ..NetworkScan::new("example.com")
        };
        assert_eq!(scan.build().unwrap().command_line(), "nmap -sS example.com");
    }

    #[test]
    fn test_nmap_target_stays_a_single_argument() {
        // Whitespace in the target is not word-split into extra options
        let spec = NetworkScan::new("10.0.0.1 10.0.0.2").build().unwrap();
        assert_eq!(spec.args.last().unwrap(), "10.0.0.1 10.0.0.2");
    }

    #[test]
    fn test_nuclei_full() {
        let scan = VulnerabilityScan {
            templates: Some("cves".to_string()),
            severity: Some("critical".to_string()),
            extra_args: Some("-rl 50".to_string()),
            ..VulnerabilityScan::new("https://example.com")
        };
        assert_eq!(
            scan.build().unwrap().command_line(),
            "nuclei -u https://example.com -t cves -severity critical -rl 50"
        );
        assert_eq!(
            VulnerabilityScan::new("https://example.com")
                .build()
                .unwrap()
                .command_line(),
            "nuclei -u https://example.com"
        );
    }

    #[test]
    fn test_ffuf_defaults() {
        let spec = EndpointFuzz::new("https://example.com/FUZZ").build().unwrap();
        assert_eq!(
            spec.command_line(),
            "ffuf -u https://example.com/FUZZ -w /usr/share/wordlists/dirb/common.txt -X GET -mc all -fc 404"
        );
    }

    #[test]
    fn test_arjun() {
        let discovery = ParameterDiscovery {
            method: "POST".to_string(),
            extra_args: Some("--stable".to_string()),
            ..ParameterDiscovery::new("https://api.example.com/v1")
        };
        assert_eq!(
            discovery.build().unwrap().command_line(),
            "arjun -u https://api.example.com/v1 -m POST --stable"
        );
    }

    #[test]
    fn test_httpx_feeds_urls_on_stdin() {
        let probe = UrlProbe {
            extra_args: Some("-follow-redirects".to_string()),
            ..UrlProbe::new("https://a.example, https://b.example,,")
        };
        let spec = probe.build().unwrap();
        assert_eq!(
            spec.command_line(),
            "httpx -silent -status-code -content-type -title -follow-redirects"
        );
        assert_eq!(
            spec.stdin.as_deref(),
            Some("https://a.example\nhttps://b.example\n")
        );
    }

    #[test]
    fn test_blank_optionals_are_skipped() {
        let nmap = ToolInvocation::from_arguments(
            ToolKind::Nmap,
            json!({"target": "10.0.0.1", "ports": "", "extra_args": ""}),
        )
        .unwrap();
        assert_eq!(nmap.build().unwrap().command_line(), "nmap -sV 10.0.0.1");

        let nuclei = ToolInvocation::from_arguments(
            ToolKind::Nuclei,
            json!({"target": "https://example.com", "templates": "", "severity": "  "}),
        )
        .unwrap();
        assert_eq!(
            nuclei.build().unwrap().command_line(),
            "nuclei -u https://example.com"
        );
    }

    #[test]
    fn test_blank_defaulted_fields_use_defaults() {
        let ffuf = ToolInvocation::from_arguments(
            ToolKind::Ffuf,
            json!({"url": "https://example.com/FUZZ", "wordlist": "", "method": ""}),
        )
        .unwrap();
        assert_eq!(
            ffuf.build().unwrap().command_line(),
            "ffuf -u https://example.com/FUZZ -w /usr/share/wordlists/dirb/common.txt -X GET -mc all -fc 404"
        );

        let nmap = NetworkScan {
            scan_type: String::new(),
            ..NetworkScan::new("10.0.0.1")
        };
        assert_eq!(nmap.build().unwrap().command_line(), "nmap -sV 10.0.0.1");
    }

    #[test]
    fn test_httpx_rejects_empty_list() {
        assert!(matches!(
            UrlProbe::new(" , ,").build(),
            Err(CommandValidationError::Empty { .. })
        ));
    }

    #[test]
    fn test_nikto_and_dirb() {
        let nikto = ToolInvocation::from_target(ToolKind::Nikto, "http://10.0.0.5", None);
        assert_eq!(nikto.build().unwrap().command_line(), "nikto -h http://10.0.0.5");

        let dirb = ToolInvocation::from_target(
            ToolKind::Dirb,
            "http://10.0.0.5",
            Some("-r".to_string()),
        );
        assert_eq!(dirb.build().unwrap().command_line(), "dirb http://10.0.0.5 -r");
    }

    #[test]
    fn test_injection_attempts_are_rejected() {
        let scan = NetworkScan {
            extra_args: Some("-T4; cat /etc/shadow".to_string()),
            ..NetworkScan::new("10.0.0.1")
        };
        assert!(matches!(
            scan.build(),
            Err(CommandValidationError::ShellMetacharacter { .. })
        ));

        let scan = NetworkScan::new("--script=evil");
        assert!(matches!(
            scan.build(),
            Err(CommandValidationError::OptionInjection { .. })
        ));

        let fuzz = EndpointFuzz {
            wordlist: "-o /tmp/x".to_string(),
            ..EndpointFuzz::new("https://example.com/FUZZ")
        };
        assert!(fuzz.build().is_err());
    }

    #[test]
    fn test_from_arguments_applies_defaults() {
        let invocation =
            ToolInvocation::from_arguments(ToolKind::Ffuf, json!({"url": "http://x/FUZZ"})).unwrap();
        match &invocation {
            ToolInvocation::EndpointFuzz(fuzz) => {
                assert_eq!(fuzz.wordlist, DEFAULT_WORDLIST);
                assert_eq!(fuzz.method, DEFAULT_METHOD);
                assert!(fuzz.extra_args.is_none());
            }
            other => panic!("unexpected invocation: {:?}", other),
        }
        assert_eq!(invocation.kind(), ToolKind::Ffuf);
        assert_eq!(invocation.target(), "http://x/FUZZ");
    }

    #[test]
    fn test_from_arguments_missing_required_field() {
        let err = ToolInvocation::from_arguments(ToolKind::Nmap, json!({"ports": "80"}))
            .unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_from_target_maps_options_to_extra_args() {
        let invocation =
            ToolInvocation::from_target(ToolKind::Nmap, "10.0.0.1", Some("-Pn".to_string()));
        assert_eq!(invocation.build().unwrap().command_line(), "nmap -sV -Pn 10.0.0.1");
        assert_eq!(invocation.target(), "10.0.0.1");
    }

    #[test]
    fn test_build_is_deterministic() {
        for kind in ToolKind::ALL {
            let invocation = ToolInvocation::from_target(kind, "http://10.0.0.1", None);
            assert_eq!(invocation.build().unwrap(), invocation.build().unwrap());
            assert_eq!(invocation.build().unwrap().program, kind.binary());
        }
    }
}
