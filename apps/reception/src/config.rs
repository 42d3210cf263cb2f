//! # Reception Configuration
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. Every variable is checked before any error is returned, so one
//! start-up run reports every problem.
//!
//! ## Checks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Typed coercion     url / email / boolean / number / enum           │
//! │  2. Refinements        SESSION_STORE=redis   → UPSTASH_REDIS_REST_*     │
//! │                        EMAIL_PROVIDER=sendgrid → SENDGRID_API_KEY       │
//! │                        EMAIL_PROVIDER=resend   → RESEND_API_KEY         │
//! │                        NODE_ENV=production     → SESSION_SECRET (32+)   │
//! │  3. Job variables      DEPOSIT_RELEASE_* / REVERSE_LOGISTICS_* /        │
//! │                        LATE_FEE_*: *_ENABLED is true|false,             │
//! │                        *_INTERVAL_MS is a number                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Refinements run only after every variable has coerced. Empty values
//! count as unset.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use tracing::error;
use url::Url;

/// Prefixes of the background-job variables.
pub const JOB_PREFIXES: &[&str] = &["DEPOSIT_RELEASE_", "REVERSE_LOGISTICS_", "LATE_FEE_"];

const ENABLED_SUFFIX: &str = "_ENABLED";
const INTERVAL_SUFFIX: &str = "_INTERVAL_MS";
const MIN_SECRET_LEN: usize = 32;
const DEFAULT_CMS_BASE_URL: &str = "http://localhost:3006";
const DEFAULT_DATABASE_PATH: &str = "./reception.db";

// =============================================================================
// Configuration
// =============================================================================

/// Reception configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ReceptionConfig {
    /// `development`, `test` or `production`
    pub node_env: NodeEnv,

    /// SQLite ledger file
    pub database_path: PathBuf,

    /// Base URL of the CMS REST API
    pub cms_base_url: Url,

    pub cms_space_url: Option<Url>,

    #[serde(skip)]
    pub cms_access_token: Option<String>,

    #[serde(skip)]
    pub session_secret: Option<String>,

    pub session_store: SessionStore,

    pub upstash_redis_rest_url: Option<Url>,

    #[serde(skip)]
    pub upstash_redis_rest_token: Option<String>,

    pub email_provider: EmailProvider,

    pub email_from: Option<String>,

    #[serde(skip)]
    pub sendgrid_api_key: Option<String>,

    #[serde(skip)]
    pub resend_api_key: Option<String>,

    /// Background jobs keyed by variable stem (`DEPOSIT_RELEASE`,
    /// `LATE_FEE_SPECIAL`).
    pub jobs: BTreeMap<String, JobSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeEnv {
    Development,
    Test,
    Production,
}

impl FromStr for NodeEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(NodeEnv::Development),
            "test" => Ok(NodeEnv::Test),
            "production" => Ok(NodeEnv::Production),
            _ => Err("must be one of development, test, production".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStore {
    Memory,
    Redis,
}

impl FromStr for SessionStore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(SessionStore::Memory),
            "redis" => Ok(SessionStore::Redis),
            _ => Err("must be one of memory, redis".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Noop,
    Smtp,
    Sendgrid,
    Resend,
}

impl FromStr for EmailProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noop" => Ok(EmailProvider::Noop),
            "smtp" => Ok(EmailProvider::Smtp),
            "sendgrid" => Ok(EmailProvider::Sendgrid),
            "resend" => Ok(EmailProvider::Resend),
            _ => Err("must be one of noop, smtp, sendgrid, resend".to_string()),
        }
    }
}

/// `<STEM>_ENABLED` and `<STEM>_INTERVAL_MS`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSettings {
    pub enabled: Option<bool>,
    pub interval_ms: Option<f64>,
}

// =============================================================================
// Errors
// =============================================================================

/// One offending variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub key: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigIssue {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variables ({} issue(s))", .0.len())]
    Invalid(Vec<ConfigIssue>),
}

impl ConfigError {
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl ReceptionConfig {
    /// Loads configuration from the process environment.
    ///
    /// Every issue is logged as `  • KEY: message` before the error returns.
    pub fn load() -> Result<Self, ConfigError> {
        ReceptionConfig::from_vars(env::vars()).inspect_err(|err| {
            error!("Invalid environment variables:");
            for issue in err.issues() {
                error!("  • {}", issue);
            }
        })
    }

    /// Loads configuration from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let mut env = EnvReader {
            vars: &vars,
            issues: Vec::new(),
        };

        let node_env = env.parsed("NODE_ENV").unwrap_or(NodeEnv::Development);
        let cms_base_url = env.url_or_default("CMS_BASE_URL", DEFAULT_CMS_BASE_URL);
        let cms_space_url = env.url("CMS_SPACE_URL");
        let session_store = env.parsed("SESSION_STORE").unwrap_or(SessionStore::Memory);
        let upstash_redis_rest_url = env.url("UPSTASH_REDIS_REST_URL");
        let email_provider = env.parsed("EMAIL_PROVIDER").unwrap_or(EmailProvider::Noop);
        let email_from = env.email("EMAIL_FROM");
        let jobs = env.jobs();

        // Refinements only run once every variable has coerced.
        let Some(cms_base_url) = cms_base_url.filter(|_| env.issues.is_empty()) else {
            return Err(ConfigError::Invalid(env.issues));
        };

        let config = ReceptionConfig {
            node_env,
            database_path: env
                .string("RECEPTION_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            cms_base_url,
            cms_space_url,
            cms_access_token: env.string("CMS_ACCESS_TOKEN"),
            session_secret: env.string("SESSION_SECRET"),
            session_store,
            upstash_redis_rest_url,
            upstash_redis_rest_token: env.string("UPSTASH_REDIS_REST_TOKEN"),
            email_provider,
            email_from,
            sendgrid_api_key: env.string("SENDGRID_API_KEY"),
            resend_api_key: env.string("RESEND_API_KEY"),
            jobs,
        };

        let mut issues = Vec::new();
        config.refine(&mut issues);
        if issues.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    /// Cross-field rules.
    fn refine(&self, issues: &mut Vec<ConfigIssue>) {
        if self.session_store == SessionStore::Redis {
            if self.upstash_redis_rest_url.is_none() {
                issues.push(ConfigIssue::new(
                    "UPSTASH_REDIS_REST_URL",
                    "UPSTASH_REDIS_REST_URL is required when SESSION_STORE=redis",
                ));
            }
            if self.upstash_redis_rest_token.is_none() {
                issues.push(ConfigIssue::new(
                    "UPSTASH_REDIS_REST_TOKEN",
                    "UPSTASH_REDIS_REST_TOKEN is required when SESSION_STORE=redis",
                ));
            }
        }

        match self.email_provider {
            EmailProvider::Sendgrid if self.sendgrid_api_key.is_none() => issues.push(
                ConfigIssue::new("SENDGRID_API_KEY", "Required when EMAIL_PROVIDER=sendgrid"),
            ),
            EmailProvider::Resend if self.resend_api_key.is_none() => issues.push(
                ConfigIssue::new("RESEND_API_KEY", "Required when EMAIL_PROVIDER=resend"),
            ),
            _ => {}
        }

        if self.node_env == NodeEnv::Production {
            match self.session_secret.as_deref() {
                None => issues.push(ConfigIssue::new("SESSION_SECRET", "Required")),
                Some(secret) if secret.chars().count() < MIN_SECRET_LEN => {
                    issues.push(ConfigIssue::new(
                        "SESSION_SECRET",
                        format!("must be at least {MIN_SECRET_LEN} characters"),
                    ))
                }
                Some(_) => {}
            }
        }
    }

    pub fn job(&self, stem: &str) -> Option<&JobSettings> {
        self.jobs.get(stem)
    }
}

// =============================================================================
// Variable Reader
// =============================================================================

struct EnvReader<'a> {
    vars: &'a BTreeMap<String, String>,
    issues: Vec<ConfigIssue>,
}

impl EnvReader<'_> {
    fn string(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(|v| v.trim().to_string())
    }

    fn parsed<T: FromStr<Err = String>>(&mut self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        raw.parse()
            .map_err(|message: String| self.issues.push(ConfigIssue::new(key, message)))
            .ok()
    }

    fn url_or_default(&mut self, key: &str, default: &str) -> Option<Url> {
        let raw = self.string(key).unwrap_or_else(|| default.to_string());
        Url::parse(&raw)
            .map_err(|_| self.issues.push(ConfigIssue::new(key, "Invalid url")))
            .ok()
    }

    fn url(&mut self, key: &str) -> Option<Url> {
        let raw = self.string(key)?;
        Url::parse(&raw)
            .map_err(|_| self.issues.push(ConfigIssue::new(key, "Invalid url")))
            .ok()
    }

    fn email(&mut self, key: &str) -> Option<String> {
        let raw = self.string(key)?;
        if is_email(&raw) {
            Some(raw)
        } else {
            self.issues.push(ConfigIssue::new(key, "Invalid email"));
            None
        }
    }

    /// Collects every `*_ENABLED` / `*_INTERVAL_MS` under the job prefixes.
    ///
    /// Prefixed variables with any other suffix are ignored.
    fn jobs(&mut self) -> BTreeMap<String, JobSettings> {
        let mut jobs: BTreeMap<String, JobSettings> = BTreeMap::new();
        let vars = self.vars;

        for (key, raw) in vars {
            if !JOB_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
                continue;
            }
            if let Some(stem) = key.strip_suffix(ENABLED_SUFFIX) {
                match parse_bool(raw) {
                    Some(enabled) => jobs.entry(stem.to_string()).or_default().enabled = Some(enabled),
                    None => self.issues.push(ConfigIssue::new(key.as_str(), "must be true or false")),
                }
            } else if let Some(stem) = key.strip_suffix(INTERVAL_SUFFIX) {
                match parse_number(raw) {
                    Some(ms) => jobs.entry(stem.to_string()).or_default().interval_ms = Some(ms),
                    None => self.issues.push(ConfigIssue::new(key.as_str(), "must be a number")),
                }
            }
        }
        jobs
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// `local@domain.tld` with no whitespace.
fn is_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !raw.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================
