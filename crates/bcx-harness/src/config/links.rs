//! Peer links between harness containers.
//!
//! Link input arrives in one of several shapes; it is converted exactly once
//! into [`NamedPeers`] and never re-inspected afterwards.

use serde_json::Value;

use crate::error::HarnessError;
use crate::error::Result;
use crate::ports::Channel;

pub const DEFAULT_CONNECT_METHOD: &str = "addnode";
pub const CONNECT_METHOD: &str = "connect";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLink {
    pub name: String,
    pub alias: String,
}

impl PeerLink {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// A link to a container by name; the alias drops the leading `/` the
    /// engine puts on container names.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let alias = name.strip_prefix('/').unwrap_or(&name).to_string();
        Self { name, alias }
    }

    /// `name:alias`, the engine's link syntax.
    pub fn engine_spec(&self) -> String {
        format!("{}:{}", self.name, self.alias)
    }

    /// Prefix of the variables the engine injects for this link: the alias
    /// uppercased with every character outside `[A-Z0-9_]` turned into `_`.
    pub fn env_prefix(&self) -> String {
        self.alias
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Daemon peer directive reading the address the engine injects into
    /// the environment for this link.
    pub fn connect_directive(&self, method: &str) -> String {
        let upper = self.env_prefix();
        let port = Channel::P2p.container_port();
        format!("-{method}=${upper}_PORT_{port}_TCP_ADDR:${upper}_PORT_{port}_TCP_PORT")
    }
}

/// Accepted link shapes before conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PeerLinks {
    #[default]
    None,
    /// link-name -> alias, in the given order.
    Mapping(Vec<(String, String)>),
    /// Container names; the alias is derived from each name.
    Names(Vec<String>),
}

impl PeerLinks {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PeerLinks::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn mapping<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        PeerLinks::Mapping(
            pairs
                .into_iter()
                .map(|(name, alias)| (name.into(), alias.into()))
                .collect(),
        )
    }

    /// Converts untyped scenario input: an object is a mapping, an array of
    /// strings is a name list, `null` is no links.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(PeerLinks::None),
            Value::Object(object) => {
                let mut pairs = Vec::with_capacity(object.len());
                for (name, alias) in object {
                    let alias = alias.as_str().ok_or_else(|| {
                        HarnessError::configuration(format!(
                            "Unknown link alias for {name}: {alias}"
                        ))
                    })?;
                    pairs.push((name.clone(), alias.to_string()));
                }
                Ok(PeerLinks::Mapping(pairs))
            }
            Value::Array(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str().ok_or_else(|| {
                        HarnessError::configuration(format!("Unknown link: {item}"))
                    })?;
                    names.push(name.to_string());
                }
                Ok(PeerLinks::Names(names))
            }
            other => Err(HarnessError::configuration(format!(
                "Invalid links: {other}"
            ))),
        }
    }

    pub fn into_named(self) -> NamedPeers {
        let links = match self {
            PeerLinks::None => Vec::new(),
            PeerLinks::Mapping(pairs) => pairs
                .into_iter()
                .map(|(name, alias)| PeerLink::new(name, alias))
                .collect(),
            PeerLinks::Names(names) => names.into_iter().map(PeerLink::from_name).collect(),
        };
        NamedPeers(links)
    }
}

/// Ordered `(name, alias)` pairs used for both the engine links and the
/// daemon peer directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedPeers(Vec<PeerLink>);

impl NamedPeers {
    pub fn iter(&self) -> std::slice::Iter<'_, PeerLink> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn engine_specs(&self) -> Vec<String> {
        self.0.iter().map(PeerLink::engine_spec).collect()
    }

    pub fn connect_directives(&self, method: &str) -> Vec<String> {
        self.0
            .iter()
            .map(|link| link.connect_directive(method))
            .collect()
    }
}

impl From<PeerLinks> for NamedPeers {
    fn from(links: PeerLinks) -> Self {
        links.into_named()
    }
}

/// Chooses the directive name: `connect` wins when requested, then the
/// explicit method, then `addnode`.
pub fn resolve_connect_method(explicit: Option<&str>, link_with_connect: bool) -> &str {
    if link_with_connect {
        return CONNECT_METHOD;
    }
    explicit.unwrap_or(DEFAULT_CONNECT_METHOD)
}
