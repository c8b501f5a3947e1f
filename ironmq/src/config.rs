//! Layered configuration resolution.
//!
//! Every option is resolved first-write-wins across the documented source
//! chain: explicit builder options, `IRON_MQ_*` / `IRON_*` environment
//! variables, a cascading scan of on-disk JSON config files, a single named
//! config file, and finally hard-coded defaults. The environment and the
//! cwd/home directories are injected into the [`Resolver`] so tests can run
//! against a temp tree without touching process globals.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Company segment of env var prefixes and config file names.
const COMPANY: &str = "iron";
/// Product segment of env var prefixes and config file names.
const PRODUCT: &str = "mq";

/// Default `User-Agent` header value.
pub const DEFAULT_USER_AGENT: &str = concat!("ironmq-rust/", env!("CARGO_PKG_VERSION"));

/// Default API version segment of request paths.
pub const DEFAULT_API_VERSION: &str = "3";

/// Keystone identity fields as they appear in configuration.
///
/// Treated as a single leaf value: the first source that supplies a
/// `keystone` object wins wholesale, fields are not merged across sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoneOptions {
    /// Identity service base URL.
    pub server: String,
    /// Tenant (realm) name.
    pub tenant: String,
    /// Login user name.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl KeystoneOptions {
    /// All four fields must be present for a login exchange to work.
    pub fn is_complete(&self) -> bool {
        !self.server.is_empty()
            && !self.tenant.is_empty()
            && !self.username.is_empty()
            && !self.password.is_empty()
    }
}

/// One named, typed field per recognized option key.
///
/// A field is written at most once during resolution; later sources only
/// fill fields that are still `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOptions {
    /// Endpoint scheme (`http` / `https`).
    pub scheme: Option<String>,
    /// Endpoint host.
    pub host: Option<String>,
    /// Endpoint port.
    pub port: Option<u16>,
    /// `User-Agent` header override.
    pub user_agent: Option<String>,
    /// Project identifier.
    pub project_id: Option<String>,
    /// Static OAuth token.
    pub token: Option<String>,
    /// Keystone identity login fields.
    pub keystone: Option<KeystoneOptions>,
    /// Environment name used for file suffixes and nested sections.
    pub env: Option<String>,
    /// Path to a single named config file to load.
    pub config: Option<PathBuf>,
}

impl ConfigOptions {
    /// Copy every field of `source` that is still unset here.
    fn fill_from(&mut self, source: &ConfigOptions) {
        fill(&mut self.scheme, &source.scheme);
        fill(&mut self.host, &source.host);
        fill(&mut self.port, &source.port);
        fill(&mut self.user_agent, &source.user_agent);
        fill(&mut self.project_id, &source.project_id);
        fill(&mut self.token, &source.token);
        fill(&mut self.keystone, &source.keystone);
        fill(&mut self.env, &source.env);
        fill(&mut self.config, &source.config);
    }

    /// Parse recognized keys out of one JSON object (a config file section).
    fn from_json_section(section: &serde_json::Map<String, Value>) -> Self {
        let mut opts = ConfigOptions {
            scheme: string_key(section, "scheme"),
            host: string_key(section, "host"),
            port: port_key(section),
            user_agent: string_key(section, "user_agent"),
            project_id: string_key(section, "project_id"),
            token: string_key(section, "token"),
            env: string_key(section, "env"),
            config: string_key(section, "config").map(PathBuf::from),
            keystone: None,
        };
        if let Some(value) = section.get("keystone") {
            match serde_json::from_value::<KeystoneOptions>(value.clone()) {
                Ok(ks) => opts.keystone = Some(ks),
                Err(e) => debug!(error = %e, "skipping malformed keystone section"),
            }
        }
        opts
    }

    /// The hard-coded bottom of the precedence chain.
    fn defaults() -> Self {
        let cloud = crate::cloud::Cloud::aws_us_east();
        ConfigOptions {
            scheme: Some(cloud.scheme().to_string()),
            host: Some(cloud.host().to_string()),
            port: Some(cloud.port()),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            ..Default::default()
        }
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        if let Some(v) = value {
            *slot = Some(v.clone());
        }
    }
}

fn string_key(section: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match section.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn port_key(section: &serde_json::Map<String, Value>) -> Option<u16> {
    match section.get("port") {
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

/// Resolves a [`ConfigOptions`] through the full source chain.
pub struct Resolver<'a> {
    env_lookup: &'a dyn Fn(&str) -> Option<String>,
    cwd: PathBuf,
    home: Option<PathBuf>,
    /// How many ancestor directories of cwd take part in the file scan.
    lookup_depth: u32,
}

/// Environment lookup backed by the real process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl<'a> Resolver<'a> {
    /// Resolver over the real process environment, cwd, and home directory.
    pub fn from_process(lookup_depth: u32) -> Result<Self> {
        Ok(Self {
            env_lookup: &process_env,
            cwd: std::env::current_dir()?,
            home: dirs::home_dir(),
            lookup_depth,
        })
    }

    /// Resolver with explicit environment and directories, for tests.
    pub fn with_sources(
        env_lookup: &'a dyn Fn(&str) -> Option<String>,
        cwd: PathBuf,
        home: Option<PathBuf>,
        lookup_depth: u32,
    ) -> Self {
        Self {
            env_lookup,
            cwd,
            home,
            lookup_depth,
        }
    }

    /// Run the full resolution chain.
    pub fn resolve(&self, explicit: ConfigOptions) -> ConfigOptions {
        let env_name = self.resolve_env_name(&explicit);

        let mut opts = ConfigOptions {
            env: env_name.clone(),
            ..Default::default()
        };

        // 1. Explicit options.
        opts.fill_from(&explicit);

        // 2. Environment variables, product prefix before company prefix.
        opts.fill_from(&self.options_from_env(&format!(
            "{}_{}",
            COMPANY.to_uppercase(),
            PRODUCT.to_uppercase()
        )));
        opts.fill_from(&self.options_from_env(&COMPANY.to_uppercase()));

        // 3. Cascading file scan.
        for path in self.candidate_files(env_name.as_deref()) {
            if let Some(from_file) = self.load_file(&path, env_name.as_deref()) {
                opts.fill_from(&from_file);
            }
        }

        // 4. Single named config file, when some source supplied one.
        if let Some(named) = opts.config.clone() {
            if let Some(from_file) = self.load_file(&named, env_name.as_deref()) {
                opts.fill_from(&from_file);
            }
        }

        // 5. Defaults.
        opts.fill_from(&ConfigOptions::defaults());

        opts
    }

    /// The environment name has its own precedence chain and is resolved
    /// before anything else, because it shapes the file scan.
    fn resolve_env_name(&self, explicit: &ConfigOptions) -> Option<String> {
        explicit
            .env
            .clone()
            .or_else(|| {
                (self.env_lookup)(&format!(
                    "{}_{}_ENV",
                    COMPANY.to_uppercase(),
                    PRODUCT.to_uppercase()
                ))
            })
            .or_else(|| (self.env_lookup)(&format!("{}_ENV", COMPANY.to_uppercase())))
    }

    /// Read per-option variables under one prefix (`<PREFIX>_<OPTION>`).
    fn options_from_env(&self, prefix: &str) -> ConfigOptions {
        let get = |key: &str| (self.env_lookup)(&format!("{prefix}_{key}"));
        ConfigOptions {
            scheme: get("SCHEME"),
            host: get("HOST"),
            port: get("PORT").and_then(|p| p.parse().ok()),
            user_agent: get("USER_AGENT"),
            project_id: get("PROJECT_ID"),
            token: get("TOKEN"),
            config: get("CONFIG").map(PathBuf::from),
            keystone: None,
            env: None,
        }
    }

    /// Every file path the cascade may consult, in precedence order:
    /// env-suffixed names first (`-env`, then `_env`), then bare names;
    /// within a suffix, base names `iron-mq`, `iron_mq`, `iron`; within a
    /// base, cwd (and its ancestors up to `lookup_depth`, each with a
    /// `config/` subdirectory), then home, with the plain file before the
    /// dotfile.
    fn candidate_files(&self, env_name: Option<&str>) -> Vec<PathBuf> {
        let mut suffixes = Vec::new();
        if let Some(env) = env_name {
            suffixes.push(format!("-{env}"));
            suffixes.push(format!("_{env}"));
        }
        suffixes.push(String::new());

        let bases = [
            format!("{COMPANY}-{PRODUCT}"),
            format!("{COMPANY}_{PRODUCT}"),
            COMPANY.to_string(),
        ];

        let mut dirs: Vec<PathBuf> = Vec::new();
        let mut cursor = Some(self.cwd.clone());
        for _ in 0..=self.lookup_depth {
            let Some(dir) = cursor else { break };
            dirs.push(dir.clone());
            dirs.push(dir.join("config"));
            cursor = dir.parent().map(Path::to_path_buf);
        }
        if let Some(home) = &self.home {
            dirs.push(home.clone());
        }

        let mut paths = Vec::new();
        for suffix in &suffixes {
            for base in &bases {
                for dir in &dirs {
                    paths.push(dir.join(format!("{base}{suffix}.json")));
                    paths.push(dir.join(format!(".{base}{suffix}.json")));
                }
            }
        }
        paths
    }

    /// Load one config file, merging its nested sections in priority order.
    /// Missing or malformed files are skipped, matching the tolerance of the
    /// cascade: a config file that is not there is not an error.
    fn load_file(&self, path: &Path, env_name: Option<&str>) -> Option<ConfigOptions> {
        let data = std::fs::read_to_string(path).ok()?;
        let root: Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unparseable config file");
                return None;
            }
        };
        let root = root.as_object()?;
        debug!(path = %path.display(), "loading config file");

        let iron_mq = format!("{COMPANY}_{PRODUCT}");
        let mut section_paths: Vec<Vec<&str>> = Vec::new();
        if let Some(env) = env_name {
            section_paths.extend([
                vec![env, &iron_mq],
                vec![env, COMPANY, PRODUCT],
                vec![env, PRODUCT],
                vec![env, COMPANY],
                vec![&iron_mq, env],
                vec![COMPANY, PRODUCT, env],
                vec![PRODUCT, env],
                vec![COMPANY, env],
                vec![env],
            ]);
        }
        section_paths.extend([
            vec![&iron_mq as &str],
            vec![COMPANY, PRODUCT],
            vec![PRODUCT],
            vec![COMPANY],
            vec![],
        ]);

        let mut opts = ConfigOptions::default();
        for section_path in &section_paths {
            if let Some(section) = sub_section(root, section_path) {
                opts.fill_from(&ConfigOptions::from_json_section(section));
            }
        }
        Some(opts)
    }
}

/// Walk nested objects by key; `None` if any step is missing or not an object.
fn sub_section<'v>(
    root: &'v serde_json::Map<String, Value>,
    keys: &[&str],
) -> Option<&'v serde_json::Map<String, Value>> {
    let mut current = root;
    for key in keys {
        current = current.get(*key)?.as_object()?;
    }
    Some(current)
}
