use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use bid_leveling_core::{
    Command, Event, NormalizationRule, RuleId, RuleKind, RuleScope, SessionError,
};
use bid_leveling_session::{self as session, query, Session};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// Rule set loaded from a TOML manifest.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct RuleManifest {
    version: u32,
    #[serde(default)]
    rules: Vec<ManifestRule>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct ManifestRule {
    id: String,
    label: String,
    kind: RuleKind,
    value: f64,
    #[serde(default = "default_active")]
    active: bool,
    apply_to: RuleScope,
}

const fn default_active() -> bool {
    true
}

/// Errors raised while loading a rule manifest into a session.
#[derive(Debug, Error)]
pub(crate) enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read rule manifest at {path}")]
    Read {
        /// Location of the manifest.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The manifest contents were not valid TOML for the expected schema.
    #[error("failed to parse rule manifest toml contents")]
    Parse(#[from] toml::de::Error),
    /// The manifest declared a version this build does not understand.
    #[error(
        "unsupported rule manifest version {found}; expected {}",
        SUPPORTED_MANIFEST_VERSION
    )]
    UnsupportedVersion {
        /// Version found in the manifest.
        found: u32,
    },
    /// The same rule id appeared twice.
    #[error("rule manifest contains duplicate entry for '{0}'")]
    DuplicateRule(RuleId),
    /// A manifest entry tried to change the kind or scope of an existing rule.
    #[error("rule '{0}' already exists; only its value and active flag can be overridden")]
    ArithmeticMismatch(RuleId),
    /// The session refused one of the generated commands.
    #[error("session rejected rule manifest entry")]
    Rejected(#[source] SessionError),
}

impl RuleManifest {
    /// Reads and parses the manifest stored at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parses manifest contents, checking the version and duplicate ids.
    pub(crate) fn parse(contents: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(contents)?;
        if manifest.version != SUPPORTED_MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: manifest.version,
            });
        }

        let mut seen = HashSet::new();
        for rule in &manifest.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(ManifestError::DuplicateRule(RuleId::new(rule.id.as_str())));
            }
        }

        Ok(manifest)
    }

    /// Translates the manifest into session commands.
    ///
    /// Entries naming an existing rule override its value and active flag.
    /// Every other entry is added as a new rule.
    pub(crate) fn commands(&self, session: &Session) -> Result<Vec<Command>, ManifestError> {
        let mut commands = Vec::new();
        for entry in &self.rules {
            let id = RuleId::new(entry.id.as_str());
            let Some(existing) = query::rule(session, &id) else {
                commands.push(Command::AddRule {
                    rule: NormalizationRule::new(
                        entry.id.as_str(),
                        entry.label.as_str(),
                        entry.kind,
                        entry.value,
                        entry.apply_to,
                    )
                    .with_active(entry.active),
                });
                continue;
            };

            if existing.kind != entry.kind || existing.apply_to != entry.apply_to {
                return Err(ManifestError::ArithmeticMismatch(id));
            }
            if existing.value != entry.value {
                commands.push(Command::SetRuleValue {
                    rule: id.clone(),
                    value: entry.value,
                });
            }
            if existing.active != entry.active {
                commands.push(Command::ToggleRule { rule: id });
            }
        }
        Ok(commands)
    }

    /// Applies the manifest to `session`, failing on the first rejection.
    pub(crate) fn apply_to(&self, session: &mut Session) -> Result<(), ManifestError> {
        let commands = self.commands(session)?;
        info!(commands = commands.len(), "applying rule manifest");

        let mut events = Vec::new();
        for command in commands {
            events.clear();
            session::apply(session, command, &mut events);
            for event in &events {
                match event {
                    Event::RuleRejected { reason, .. } => {
                        return Err(ManifestError::Rejected(reason.clone()));
                    }
                    other => debug!(?other, "manifest change applied"),
                }
            }
        }
        Ok(())
    }
}
