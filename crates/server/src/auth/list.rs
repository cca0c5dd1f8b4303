//! Authorization list document: parsing, validation and matching.
//!
//! ```yaml
//! authorization_list:
//!   - name: www.example.com
//!     allow: web1.internal,web2.internal
//!   - name: api.example.com
//!     allow: /^api-\d+\.internal$/
//!     reload:
//!       nginx:
//!         cmd: [systemctl, reload, nginx]
//! ```

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::AuthError;

/// Compiled form of an entry's allow pattern
#[derive(Debug, Clone)]
pub enum HostMatcher {
    /// Exact hostnames
    Literal(Vec<String>),
    /// `/…/` pattern, unanchored search
    Pattern(Regex),
    /// Pattern failed to compile; denies everyone
    Nothing,
}

impl HostMatcher {
    /// Compile an allow pattern
    ///
    /// Returns the regex compile error alongside [`HostMatcher::Nothing`].
    pub fn compile(allow: &str) -> (Self, Option<regex::Error>) {
        if allow.len() >= 2 && allow.starts_with('/') && allow.ends_with('/') {
            return match Regex::new(&allow[1..allow.len() - 1]) {
                Ok(re) => (HostMatcher::Pattern(re), None),
                Err(e) => (HostMatcher::Nothing, Some(e)),
            };
        }

        let hosts = allow
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        (HostMatcher::Literal(hosts), None)
    }

    pub fn matches(&self, hostname: &str) -> bool {
        match self {
            HostMatcher::Literal(hosts) => hosts.iter().any(|h| h == hostname),
            HostMatcher::Pattern(re) => re.is_match(hostname),
            HostMatcher::Nothing => false,
        }
    }
}

/// Command run by an external reload hook
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReloadHook {
    #[serde(default)]
    pub cmd: Vec<String>,
}

/// One named resource and who may fetch it
#[derive(Debug, Clone)]
pub struct AuthorizationEntry {
    pub name: String,
    pub allow: String,
    pub matcher: HostMatcher,
    pub reload: BTreeMap<String, ReloadHook>,
}

impl AuthorizationEntry {
    pub fn is_allowed(&self, hostname: &str) -> bool {
        self.matcher.matches(hostname)
    }
}

/// Ordered list of entries; lookups are first-match
#[derive(Debug, Clone, Default)]
pub struct AuthorizationList {
    entries: Vec<AuthorizationEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    #[serde(default, alias = "domains")]
    allow: Option<String>,
    #[serde(default)]
    reload: BTreeMap<String, ReloadHook>,
}

#[derive(Debug, Deserialize)]
struct RawList {
    authorization_list: Option<Vec<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    authorization_list: Option<Vec<RawEntry>>,
    #[serde(default)]
    config: Option<RawList>,
}

impl AuthorizationList {
    /// Parse a verified YAML document and validate every entry
    pub fn from_yaml(text: &[u8]) -> Result<Self, AuthError> {
        let doc: RawDocument =
            serde_yaml::from_slice(text).map_err(|e| AuthError::Parse(e.to_string()))?;

        let raw = doc
            .authorization_list
            .or_else(|| doc.config.and_then(|c| c.authorization_list))
            .ok_or_else(|| AuthError::Parse("missing authorization_list".to_string()))?;

        Ok(Self::validate(raw))
    }

    fn validate(raw: Vec<RawEntry>) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(raw.len());

        for item in raw {
            let allow = match item.allow {
                Some(a) if !a.is_empty() => a,
                _ => item.name.clone(),
            };

            let (matcher, compile_error) = HostMatcher::compile(&allow);
            if let Some(e) = compile_error {
                warn!(
                    name = %item.name,
                    pattern = %allow,
                    error = %e,
                    "Invalid allow pattern, entry will deny all requesters"
                );
            }

            if !seen.insert(item.name.clone()) {
                warn!(name = %item.name, "Duplicate authorization entry, first one wins");
            }

            info!(name = %item.name, "Loaded authorized domain");
            entries.push(AuthorizationEntry {
                name: item.name,
                allow,
                matcher,
                reload: item.reload,
            });
        }

        debug!(entry_count = entries.len(), "Authorization list validated");
        Self { entries }
    }

    /// First entry named `name`
    pub fn get(&self, name: &str) -> Option<&AuthorizationEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[AuthorizationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> AuthorizationList {
        AuthorizationList::from_yaml(yaml.as_bytes()).unwrap()
    }

    #[test]
    fn test_literal_list() {
        let list = parse(
            r#"
authorization_list:
  - name: a.com
    allow: "host1, host2,,host3 "
"#,
        );
        let entry = list.get("a.com").unwrap();
        assert!(entry.is_allowed("host1"));
        assert!(entry.is_allowed("host2"));
        assert!(entry.is_allowed("host3"));
        assert!(!entry.is_allowed(""));
        assert!(!entry.is_allowed("host4"));
        assert!(!entry.is_allowed("a.com"));
    }

    #[test]
    fn test_empty_allow_defaults_to_name() {
        let list = parse(
            r#"
authorization_list:
  - name: self.example
  - name: blank.example
    allow: ""
"#,
        );
        assert!(list.get("self.example").unwrap().is_allowed("self.example"));
        assert!(!list.get("self.example").unwrap().is_allowed("other"));
        assert_eq!(list.get("blank.example").unwrap().allow, "blank.example");
    }

    #[test]
    fn test_regex_pattern() {
        let list = parse(
            r#"
authorization_list:
  - name: a.com
    domains: /^.*\.b\.com$/
"#,
        );
        let entry = list.get("a.com").unwrap();
        assert!(matches!(entry.matcher, HostMatcher::Pattern(_)));
        assert!(entry.is_allowed("x.b.com"));
        assert!(!entry.is_allowed("b.com"));
    }

    #[test]
    fn test_invalid_regex_denies_without_failing() {
        let list = parse(
            r#"
authorization_list:
  - name: broken.com
    allow: /([a-z/
  - name: ok.com
"#,
        );
        assert_eq!(list.len(), 2);
        let broken = list.get("broken.com").unwrap();
        assert!(matches!(broken.matcher, HostMatcher::Nothing));
        assert!(!broken.is_allowed("anything"));
        assert!(list.get("ok.com").unwrap().is_allowed("ok.com"));
    }

    #[test]
    fn test_single_slash_is_literal() {
        let (matcher, err) = HostMatcher::compile("/");
        assert!(err.is_none());
        assert!(matcher.matches("/"));
    }

    #[test]
    fn test_nested_config_and_reload_hooks() {
        let list = parse(
            r#"
config:
  authorization_list:
    - name: a.com
      allow: web1
      reload:
        nginx:
          cmd: [systemctl, reload, nginx]
"#,
        );
        let entry = list.get("a.com").unwrap();
        assert_eq!(
            entry.reload.get("nginx").unwrap().cmd,
            vec!["systemctl", "reload", "nginx"]
        );
    }

    #[test]
    fn test_duplicate_first_wins() {
        let list = parse(
            r#"
authorization_list:
  - name: a.com
    allow: first
  - name: a.com
    allow: second
"#,
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list.get("a.com").unwrap().allow, "first");
    }

    #[test]
    fn test_missing_list_is_parse_error() {
        let err = AuthorizationList::from_yaml(b"other: 1\n").unwrap_err();
        assert!(matches!(err, AuthError::Parse(_)));

        let err = AuthorizationList::from_yaml(b"authorization_list: [\n").unwrap_err();
        assert!(matches!(err, AuthError::Parse(_)));
    }
}
