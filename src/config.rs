//! Bot configuration: a TOML file with built-in defaults.
//!
//! The default configuration reproduces the four r/PCSX2 bots (CPU, GPU,
//! wiki, helper). Every per-bot difference is data here, never code:
//! summon phrase, catalog source, resolver thresholds, tier table, wording.
//!
//! Credentials never live in the file; see [`RedditCredentials::from_env`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;
use crate::catalog::{Catalog, SourceKind};
use crate::compose::{ReplyTemplate, Tier, TierTable};
use crate::dispatch::Dispatcher;
use crate::error::{BotResult, CatalogResult, ConfigError, ConfigResult};
use crate::resolve::{QueryRewrite, ResolverConfig, Scorer};
use crate::responder::{CatalogResponder, HelpResponder, Responder};

const REQUIREMENTS_PAGE: &str = "https://pcsx2.net/getting-started.html";
const LATEST_BUILD: &str = "https://buildbot.orphis.net/pcsx2/";
const STEAM_GUIDE: &str =
    "https://forums.pcsx2.net/Thread-A-steam-guide-to-using-your-DS4-and-other-controllers";
const SPECS_SCREENSHOT: &str = "https://media.discordapp.net/attachments/453394610514034689/697528371562676244/unknown.png?width=1442&height=654";

// ── Top level ───────────────────────────────────────────────────────────

/// Complete bot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub bot: BotSection,
    pub backoff: BackoffConfig,
    pub responders: Vec<ResponderConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot: BotSection::default(),
            backoff: BackoffConfig::default(),
            responders: vec![
                ResponderConfig::Catalog(CatalogBotConfig::cpu()),
                ResponderConfig::Catalog(CatalogBotConfig::gpu()),
                ResponderConfig::Catalog(CatalogBotConfig::wiki()),
                ResponderConfig::Help(HelpBotConfig::default()),
            ],
        }
    }
}

/// Stream and posting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSection {
    /// Subreddit to watch, without the `r/` prefix.
    pub subreddit: String,
    pub user_agent: String,
    /// Trailing markup appended to every reply after a separator.
    pub footer: Option<String>,
    /// Pause between polls when no new comment arrived.
    pub poll_interval_secs: u64,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            subreddit: "pcsx2".into(),
            user_agent: concat!("linux:pcsx2-helper-bot:v", env!("CARGO_PKG_VERSION")).into(),
            footer: Some(
                "^(Check my commands by commenting `HelperBot! commands`. I'm a bot, and should \
                 only be used for reference. If there are any issues, please contact my) \
                 ^[Creator](https://www.reddit.com/message/compose/?to=theoriginal123123&subject=/u/PCSX2-Wiki-Bot)\
                 \n\n[^GitHub](https://github.com/Pixxel123/PCSX2-Helper-Bot)\n"
                    .into(),
            ),
            poll_interval_secs: 10,
        }
    }
}

// ── Responders ──────────────────────────────────────────────────────────

/// One registered bot, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponderConfig {
    Catalog(CatalogBotConfig),
    Help(HelpBotConfig),
}

impl ResponderConfig {
    pub fn phrase(&self) -> &str {
        match self {
            Self::Catalog(c) => &c.phrase,
            Self::Help(h) => &h.phrase,
        }
    }
}

/// A bot that resolves terms against a scraped catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogBotConfig {
    pub name: String,
    pub phrase: String,
    pub usage: String,
    pub source: SourceKind,
    /// Listing page the catalog is scraped from.
    pub url: String,
    /// Added once per reply when this bot quoted a rating.
    #[serde(default)]
    pub appendix: Option<String>,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub tiers: Option<TierTable>,
    #[serde(default)]
    pub reply: ReplyTemplate,
}

impl CatalogBotConfig {
    fn rating_appendix() -> String {
        format!(
            "**These ratings should only be used as a rough guide as some games are unusually \
             demanding.**\n\nThe latest dev version of PCSX2 can be found [HERE]({LATEST_BUILD})"
        )
    }

    pub fn cpu() -> Self {
        let url = "https://www.cpubenchmark.net/cpu_list.php";
        Self {
            name: "cpu".into(),
            phrase: "CPUBot!".into(),
            usage: "CPUBot! cpu model".into(),
            source: SourceKind::PassmarkCpu,
            url: url.into(),
            resolver: ResolverConfig {
                prefilter: Scorer::TokenSet,
                prefilter_threshold: 50,
                acceptance_threshold: 85,
                strip_clock_speed: true,
                ..Default::default()
            },
            tiers: TierTable::new(vec![
                Tier::new(0, "Awful"),
                Tier::new(800, "Very slow"),
                Tier::new(1200, "OK for 2D games"),
                Tier::new(1600, "OK for 3D games"),
                Tier::new(2000, "Good for most games"),
                Tier::new(2400, "Great for most games"),
                Tier::new(2800, "Overkill"),
            ])
            .ok(),
            reply: ReplyTemplate {
                noun: "CPU".into(),
                metric_label: "CPU STR".into(),
                page_label: "CPU Benchmark Page".into(),
                results_label: "potential matches".into(),
                retry_noun: "models".into(),
                source_label: "Passmark list".into(),
                source_url: url.into(),
                requirements: Some(format!(
                    "[Single Thread Rating **Minimum:** 1600 | **Recommended:** 2100 \
                     (PCSX2 Requirements Page)]({REQUIREMENTS_PAGE})"
                )),
            },
            appendix: Some(Self::rating_appendix()),
        }
    }

    pub fn gpu() -> Self {
        let url = "https://www.videocardbenchmark.net/gpu_list.php";
        Self {
            name: "gpu".into(),
            phrase: "GPUBot!".into(),
            usage: "GPUBot! gpu model".into(),
            source: SourceKind::PassmarkGpu,
            url: url.into(),
            resolver: ResolverConfig {
                prefilter: Scorer::TokenSet,
                prefilter_threshold: 50,
                acceptance_threshold: 65,
                strip_clock_speed: false,
                rewrites: vec![QueryRewrite {
                    pattern: r"(?i)(\d{3,4})(Ti)".into(),
                    replacement: "$1 $2".into(),
                }],
                ..Default::default()
            },
            tiers: TierTable::new(vec![
                Tier::new(0, "Slow"),
                Tier::new(360, "Native"),
                Tier::new(1720, "2x Native (~720p)"),
                Tier::new(3230, "3x Native (~1080p)"),
                Tier::new(4890, "4x Native (~2K)"),
                Tier::new(6700, "5x Native (~3K)"),
                Tier::new(8660, "6x Native (~4K)"),
                Tier::new(13030, "8x Native (~5K)"),
            ])
            .ok(),
            reply: ReplyTemplate {
                noun: "GPU".into(),
                metric_label: "GPU G3D Mark".into(),
                page_label: "GPU Benchmark Page".into(),
                results_label: "potential matches".into(),
                retry_noun: "models".into(),
                source_label: "Passmark GPU list".into(),
                source_url: url.into(),
                requirements: Some(format!(
                    "[PassMark G3D Mark **Minimum:** 3000 | **Recommended:** 6000 \
                     (PCSX2 Requirements Page)]({REQUIREMENTS_PAGE})"
                )),
            },
            appendix: Some(Self::rating_appendix()),
        }
    }

    pub fn wiki() -> Self {
        Self {
            name: "wiki".into(),
            phrase: "WikiBot!".into(),
            usage: "WikiBot! game name".into(),
            source: SourceKind::Pcsx2Wiki,
            url: "https://wiki.pcsx2.net/Complete_List_of_Games".into(),
            resolver: ResolverConfig {
                prefilter: Scorer::Simple,
                prefilter_threshold: 48,
                acceptance_threshold: 85,
                strip_clock_speed: false,
                ..Default::default()
            },
            tiers: None,
            reply: ReplyTemplate {
                noun: "game".into(),
                results_label: "wiki results".into(),
                retry_noun: "game names".into(),
                source_label: "PCSX2 Wiki".into(),
                source_url: "https://wiki.pcsx2.net".into(),
                ..Default::default()
            },
            appendix: None,
        }
    }
}

/// The helper bot: fixed replies per keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpBotConfig {
    pub phrase: String,
    pub usage: String,
    /// Keyword → reply body.
    pub commands: BTreeMap<String, String>,
    /// Keyword answered for unknown input.
    pub fallback: String,
}

impl Default for HelpBotConfig {
    fn default() -> Self {
        let support = "### **Getting Help on r/PCSX2**\n\n\
            1) Please have the following information ready:\n\n\
            - What PCSX2 version you are using. 'Latest' is not helpful, please look at the \
            actual version number (Found at the top of your PCSX2 window if you're not in \
            fullscreen).\n\
            - What CPU and GPU your PC has. The `HelperBot! specs` command will show you where \
            you can find these on Windows 10.\n\
            - What specific game(s) you are having problems with.\n\n\
            2) Ask your question! Don't worry about asking (as long as your question falls \
            within the rules).";
        let specs = format!(
            "### **Finding PC specs on Windows 10:**\n\nOpen Task Manager by pressing \
             'Ctrl + Shift + Esc', then follow these screenshots to locate your CPU and GPU: \
             [SPECS SCREENSHOT]({SPECS_SCREENSHOT})"
        );
        let steam = format!(
            "### **A guide to using your DS4 and other controllers via Steam:**\n\n\
             A basic guide to setting up your controller:\n\n{STEAM_GUIDE}"
        );
        let commands = "I respond to the following commands (**NOTE:** The bot call is not \
            case-sensitive):\n\n\
            `GPUBot! gpu model` - Find graphics card G3D mark and how it performs with PCSX2\n\n\
            `CPUBot! cpu model` - Find processor Single Thread Rating and how it performs with PCSX2\n\n\
            `WikiBot! game name` - Find game from PCSX2 wiki and lists active and fixed issues if available\n\n\
            `HelperBot! support` - A guideline for asking good questions and getting better support with issues\n\n\
            `HelperBot! specs` - Shows how to find CPU and GPU models in Windows 10\n\n\
            `HelperBot! steam` - How to set up DualShock4 or other controllers on PCSX2 via Steam\n\n\
            `HelperBot! commands` - Shows this message.\n\n\
            Please be aware that you can have one of each bot call in the same comment, such as \
            `CPUBot!` and `WikiBot!`, but for multiple lookups or HelperBot commands, each command \
            or lookup must be separated by a comma as follows:\n\n    \
            CPUBot! cpu model 1, cpu model 2\n    \
            WikiBot! game name 1, game name 2\n    \
            HelperBot! specs, support";

        Self {
            phrase: "HelperBot!".into(),
            usage: "HelperBot! commands".into(),
            commands: BTreeMap::from([
                ("support".to_string(), support.to_string()),
                ("specs".to_string(), specs),
                ("steam".to_string(), steam),
                ("commands".to_string(), commands.to_string()),
            ]),
            fallback: "commands".into(),
        }
    }
}

// ── Load, save, validate ────────────────────────────────────────────────

impl BotConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), responders = config.responders.len(), "config loaded");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: format!("config does not serialize: {e}"),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.backoff.validate()?;
        if self.bot.subreddit.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "bot.subreddit must not be empty".into(),
            });
        }
        if self.responders.is_empty() {
            return Err(ConfigError::Invalid {
                message: "at least one responder must be configured".into(),
            });
        }

        let mut seen = HashSet::new();
        for responder in &self.responders {
            let phrase = responder.phrase().trim();
            if phrase.is_empty() {
                return Err(ConfigError::Invalid {
                    message: "summon phrase must not be empty".into(),
                });
            }
            if !seen.insert(phrase.to_lowercase()) {
                return Err(ConfigError::Invalid {
                    message: format!("summon phrase {phrase:?} is registered twice"),
                });
            }
            if let ResponderConfig::Catalog(bot) = responder {
                bot.resolver.validate()?;
                let rated = matches!(bot.source, SourceKind::PassmarkCpu | SourceKind::PassmarkGpu);
                if rated && bot.tiers.is_none() {
                    return Err(ConfigError::Invalid {
                        message: format!("bot {:?} reports a metric but has no tier table", bot.name),
                    });
                }
            }
        }
        Ok(())
    }

    /// Catalog bots, in registration order.
    pub fn catalog_bots(&self) -> impl Iterator<Item = &CatalogBotConfig> {
        self.responders.iter().filter_map(|r| match r {
            ResponderConfig::Catalog(c) => Some(c),
            ResponderConfig::Help(_) => None,
        })
    }

    /// Build the dispatcher, obtaining each catalog from `load_catalog`.
    pub fn build_dispatcher<F>(&self, mut load_catalog: F) -> BotResult<Dispatcher>
    where
        F: FnMut(&CatalogBotConfig) -> CatalogResult<Catalog>,
    {
        let mut responders: Vec<Box<dyn Responder>> = Vec::with_capacity(self.responders.len());
        for config in &self.responders {
            match config {
                ResponderConfig::Catalog(bot) => {
                    let catalog = load_catalog(bot)?;
                    tracing::info!(bot = %bot.name, entries = catalog.len(), "catalog ready");
                    responders.push(Box::new(CatalogResponder::from_config(bot, catalog)?));
                }
                ResponderConfig::Help(help) => {
                    responders.push(Box::new(HelpResponder::from_config(help)));
                }
            }
        }
        Ok(Dispatcher::new(responders, self.bot.footer.clone())?)
    }
}

// ── Credentials ─────────────────────────────────────────────────────────

/// Reddit script-app credentials, read from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl RedditCredentials {
    pub const CLIENT_ID: &'static str = "REDDIT_CLIENT_ID";
    pub const CLIENT_SECRET: &'static str = "REDDIT_CLIENT_SECRET";
    pub const USERNAME: &'static str = "REDDIT_USERNAME";
    pub const PASSWORD: &'static str = "REDDIT_PASSWORD";

    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let var = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnv { name: name.into() })
        };
        Ok(Self {
            client_id: var(Self::CLIENT_ID)?,
            client_secret: var(Self::CLIENT_SECRET)?,
            username: var(Self::USERNAME)?,
            password: var(Self::PASSWORD)?,
        })
    }
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_has_four_bots() {
        let config = BotConfig::default();
        config.validate().unwrap();
        let phrases: Vec<_> = config.responders.iter().map(|r| r.phrase()).collect();
        assert_eq!(phrases, vec!["CPUBot!", "GPUBot!", "WikiBot!", "HelperBot!"]);
    }

    #[test]
    fn default_tier_tables_match_production() {
        let config = BotConfig::default();
        let cpu = config.catalog_bots().next().unwrap();
        let tiers = cpu.tiers.as_ref().unwrap();
        assert_eq!(tiers.classify(1999), "OK for 3D games");
        assert_eq!(tiers.classify(3000), "Overkill");
        assert_eq!(tiers.classify(-1), "Awful");

        let gpu = config.catalog_bots().nth(1).unwrap();
        assert_eq!(gpu.tiers.as_ref().unwrap().classify(6700), "5x Native (~3K)");
    }

    #[test]
    fn toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bot.toml");
        let config = BotConfig::default();
        config.save(&path).unwrap();
        let loaded = BotConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config = BotConfig::from_toml(
            r#"
            [bot]
            subreddit = "cpubottest"

            [backoff]
            margin_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.bot.subreddit, "cpubottest");
        assert_eq!(config.bot.poll_interval_secs, 10);
        assert_eq!(config.backoff.margin_secs, 30);
        assert_eq!(config.backoff.default_secs, 15);
        assert_eq!(config.responders.len(), 4);
    }

    #[test]
    fn custom_responder_table() {
        let config = BotConfig::from_toml(
            r#"
            [[responders]]
            kind = "catalog"
            name = "games"
            phrase = "GameBot!"
            usage = "GameBot! title"
            source = "pcsx2_wiki"
            url = "https://wiki.pcsx2.net/Complete_List_of_Games"

            [responders.resolver]
            prefilter = "simple"
            prefilter_threshold = 40
            acceptance_threshold = 90
            inclusive_acceptance = false

            [[responders]]
            kind = "help"
            phrase = "Help!"
            "#,
        )
        .unwrap();
        assert_eq!(config.responders.len(), 2);
        let ResponderConfig::Catalog(games) = &config.responders[0] else {
            panic!("expected catalog bot");
        };
        assert_eq!(games.resolver.prefilter, Scorer::Simple);
        assert!(!games.resolver.inclusive_acceptance);
        assert_eq!(games.reply, ReplyTemplate::default());
        let ResponderConfig::Help(help) = &config.responders[1] else {
            panic!("expected help bot");
        };
        assert!(help.commands.contains_key("support"));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut dup = BotConfig::default();
        dup.responders.push(ResponderConfig::Help(HelpBotConfig {
            phrase: "cpubot!".into(),
            ..Default::default()
        }));
        assert!(matches!(dup.validate(), Err(ConfigError::Invalid { .. })));

        let mut threshold = BotConfig::default();
        if let ResponderConfig::Catalog(cpu) = &mut threshold.responders[0] {
            cpu.resolver.prefilter_threshold = 120;
        }
        assert!(threshold.validate().is_err());

        let mut tierless = BotConfig::default();
        if let ResponderConfig::Catalog(gpu) = &mut tierless.responders[1] {
            gpu.tiers = None;
        }
        assert!(tierless.validate().is_err());

        let empty_tiers = r#"
            [[responders]]
            kind = "catalog"
            name = "cpu"
            phrase = "CPUBot!"
            usage = "CPUBot! x"
            source = "passmark_cpu"
            url = "https://x.test"
            tiers = []
        "#;
        assert!(matches!(BotConfig::from_toml(empty_tiers), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = BotConfig::load(Path::new("/nonexistent/helper-bot.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn credentials_come_from_lookup() {
        let vars = BTreeMap::from([
            ("REDDIT_CLIENT_ID", "id"),
            ("REDDIT_CLIENT_SECRET", "secret"),
            ("REDDIT_USERNAME", "PCSX2-Helper-Bot"),
            ("REDDIT_PASSWORD", "hunter2"),
        ]);
        let creds =
            RedditCredentials::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.username, "PCSX2-Helper-Bot");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("secret\""));

        let err = RedditCredentials::from_lookup(|k| {
            (k != "REDDIT_PASSWORD").then(|| "x".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { name } if name == "REDDIT_PASSWORD"));
    }
}
