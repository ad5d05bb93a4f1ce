//! Prompt classification for network devices.
//!
//! A device signals that it finished answering by printing its prompt at the
//! start of a fresh line. The prompt syntax also gives away the vendor: H3C
//! Comware wraps the hostname in `<...>` or `[...]`, Cisco IOS ends it with
//! `#` or `>`. This module holds an ordered table of (vendor, pattern) rows
//! and matches it against the tail of captured output only, so prompt-like
//! text in the middle of a command's output never counts.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::TelnetError;

/// H3C Comware prompt: `<Router>` or `[Router-vlan10]` at the end of output.
pub const H3C_PROMPT_PATTERN: &str = r"[\r\n](\[[^\]]+\]|<[^>]+>)\s*$";

/// Cisco IOS prompt: `Router#`, `Router>`, `Router(config-if)#` at the end of output.
pub const CISCO_PROMPT_PATTERN: &str = r"[\r\n]([A-Za-z0-9._-]+(\([a-z0-9-]+\))?[#>])\s*$";

/// Placeholder reported when no prompt is recognized.
pub const UNKNOWN: &str = "unknown";

/// Built-in classifier: H3C first, then Cisco. Unknown vendors fall back to
/// the Cisco pattern when waiting for a prompt.
pub static BUILTIN: Lazy<PromptClassifier> = Lazy::new(|| PromptClassifier {
    rules: vec![
        PromptRule::builtin(Vendor::H3c, H3C_PROMPT_PATTERN),
        PromptRule::builtin(Vendor::Cisco, CISCO_PROMPT_PATTERN),
    ],
    fallback: Vendor::Cisco,
});

/// Device vendor as inferred from its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Cisco,
    H3c,
    #[default]
    Unknown,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Cisco => "cisco",
            Vendor::H3c => "h3c",
            Vendor::Unknown => UNKNOWN,
        }
    }

    /// Command that turns off output paging for this vendor's CLI.
    pub fn disable_paging_command(&self) -> Option<&'static str> {
        match self {
            Vendor::Cisco => Some("terminal length 0"),
            Vendor::H3c => Some("screen-length 0 temporary"),
            Vendor::Unknown => None,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = TelnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cisco" => Ok(Vendor::Cisco),
            "h3c" => Ok(Vendor::H3c),
            UNKNOWN => Ok(Vendor::Unknown),
            other => Err(TelnetError::UnsupportedVendor(other.to_string())),
        }
    }
}

/// Result of classifying captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMatch {
    pub vendor: Vendor,
    /// Literal prompt text, `None` when nothing matched.
    pub prompt: Option<String>,
}

impl PromptMatch {
    pub fn unknown() -> Self {
        Self {
            vendor: Vendor::Unknown,
            prompt: None,
        }
    }

    /// Prompt text, or `"unknown"` when nothing matched.
    pub fn mode(&self) -> &str {
        self.prompt.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn is_match(&self) -> bool {
        self.prompt.is_some()
    }
}

/// One row of the prompt table.
#[derive(Debug, Clone)]
pub struct PromptRule {
    vendor: Vendor,
    regex: Regex,
}

impl PromptRule {
    /// Compiles a rule. Patterns should anchor to the end of text (`$`).
    pub fn new(vendor: Vendor, pattern: &str) -> Result<Self, TelnetError> {
        let regex = Regex::new(pattern).map_err(|err| {
            TelnetError::InvalidPromptPattern(format!(
                "invalid prompt regex for vendor '{vendor}': {err}"
            ))
        })?;
        Ok(Self { vendor, regex })
    }

    fn builtin(vendor: Vendor, pattern: &'static str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => Self { vendor, regex },
            Err(err) => panic!("invalid built-in {vendor} prompt regex: {err}"),
        }
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns the prompt text if this rule matches the tail of `clean`.
    ///
    /// Capture group 1 is the prompt when the pattern has one, otherwise the
    /// whole match with line breaks and trailing blanks trimmed.
    fn find_prompt(&self, clean: &str) -> Option<String> {
        let caps = self.regex.captures(clean)?;
        let text = match caps.get(1) {
            Some(group) => group.as_str(),
            None => caps.get(0)?.as_str().trim(),
        };
        Some(text.to_string())
    }
}

/// Ordered prompt table. The first matching row wins.
#[derive(Debug, Clone)]
pub struct PromptClassifier {
    rules: Vec<PromptRule>,
    /// Vendor whose pattern is used when a session's vendor has no row.
    fallback: Vendor,
}

impl PromptClassifier {
    /// Builds a classifier from `(vendor, pattern)` rows in priority order.
    pub fn new<I, S>(rules: I, fallback: Vendor) -> Result<Self, TelnetError>
    where
        I: IntoIterator<Item = (Vendor, S)>,
        S: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .map(|(vendor, pattern)| PromptRule::new(vendor, pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if rules.is_empty() {
            return Err(TelnetError::InvalidPromptPattern(
                "prompt table is empty".to_string(),
            ));
        }
        Ok(Self { rules, fallback })
    }

    pub fn rules(&self) -> &[PromptRule] {
        &self.rules
    }

    /// Classifies the tail of `output`.
    pub fn classify(&self, output: &str) -> PromptMatch {
        if output.is_empty() {
            return PromptMatch::unknown();
        }
        let clean = normalize(output);
        for rule in &self.rules {
            if let Some(prompt) = rule.find_prompt(&clean) {
                trace!("Prompt matched vendor {}: {:?}", rule.vendor, prompt);
                return PromptMatch {
                    vendor: rule.vendor,
                    prompt: Some(prompt),
                };
            }
        }
        PromptMatch::unknown()
    }

    /// Returns the row used to detect the end of a command for `vendor`.
    ///
    /// Vendors without a row (including `unknown`) use the fallback vendor's
    /// row, so an unrecognized device is waited on with Cisco-style prompts.
    pub fn rule_for(&self, vendor: Vendor) -> &PromptRule {
        self.rules
            .iter()
            .find(|rule| rule.vendor == vendor)
            .or_else(|| self.rules.iter().find(|rule| rule.vendor == self.fallback))
            .unwrap_or(&self.rules[0])
    }

    /// Checks whether `output` ends with a prompt of the given vendor.
    pub fn tail_matches(&self, vendor: Vendor, output: &str) -> bool {
        let clean = normalize(output);
        self.rule_for(vendor).regex.is_match(&clean)
    }
}

impl Default for PromptClassifier {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

/// Classifies `output` with the built-in table.
pub fn detect_vendor_and_mode(output: &str) -> PromptMatch {
    BUILTIN.classify(output)
}

/// Removes terminal erase artifacts: `" \x08"` pairs first, then lone
/// backspaces.
pub fn normalize(output: &str) -> Cow<'_, str> {
    if !output.contains('\x08') {
        return Cow::Borrowed(output);
    }
    Cow::Owned(output.replace(" \x08", "").replace('\x08', ""))
}
