use std::fmt;
use std::str::FromStr;

use crate::error::HarnessError;
use crate::ports::Channel;

/// Which of the node's two RPC servers to address. Each serves one of the
/// currencies the daemon manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// BlockShares, unit `'8'`.
    Shares,
    /// BlockCredits, unit `'C'`.
    Credits,
}

impl Unit {
    pub fn code(self) -> char {
        match self {
            Unit::Shares => '8',
            Unit::Credits => 'C',
        }
    }

    pub fn from_code(code: char) -> Result<Self, HarnessError> {
        match code {
            '8' => Ok(Unit::Shares),
            'C' => Ok(Unit::Credits),
            other => Err(HarnessError::configuration(format!(
                "Unknown RPC unit: {other:?}"
            ))),
        }
    }

    /// Unit named the way scenarios spell it. An empty name means shares.
    pub fn from_name(name: &str) -> Result<Self, HarnessError> {
        match name.trim() {
            "BlockShare" | "BlockShares" | "BKS" | "" => Ok(Unit::Shares),
            "BlockCredit" | "BlockCredits" | "BKC" => Ok(Unit::Credits),
            other => Err(HarnessError::configuration(format!(
                "Unknown unit: {other:?}"
            ))),
        }
    }

    pub fn channel(self) -> Channel {
        match self {
            Unit::Shares => Channel::RpcShares,
            Unit::Credits => Channel::RpcCredits,
        }
    }
}

impl TryFrom<char> for Unit {
    type Error = HarnessError;

    fn try_from(code: char) -> Result<Self, Self::Error> {
        Unit::from_code(code)
    }
}

/// Accepts a single-character unit code or a unit name.
impl FromStr for Unit {
    type Err = HarnessError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => Unit::from_code(code),
            _ => Unit::from_name(raw),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
