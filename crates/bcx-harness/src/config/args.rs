//! Daemon argument values and their command-line encoding.

use std::fmt;

use serde_json::Value;

use crate::error::HarnessError;
use crate::error::Result;

/// A single `-key...` value. The encoding is asymmetric: `true` is a bare
/// flag while `false` becomes a literal `0`.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ArgValue {
    pub fn encode(&self, key: &str) -> String {
        match self {
            ArgValue::Flag(true) => format!("-{key}"),
            ArgValue::Flag(false) => format!("-{key}=0"),
            ArgValue::Int(value) => format!("-{key}={value}"),
            ArgValue::Float(value) => format!("-{key}={}", decimal(*value)),
            ArgValue::Text(value) => format!("-{key}=\"{value}\""),
        }
    }

    /// Converts an untyped scenario value. Anything that is not a boolean or
    /// a number is rendered as quoted text; `null` becomes an empty string.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(flag) => ArgValue::Flag(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => ArgValue::Int(int),
                None => ArgValue::Float(number.as_f64().unwrap_or_default()),
            },
            Value::String(text) => ArgValue::Text(text.clone()),
            Value::Null => ArgValue::Text(String::new()),
            other => ArgValue::Text(other.to_string()),
        }
    }

    /// Parses the CLI shorthand used by `bcx-node --arg`: `true`/`false`,
    /// integers and floats keep their type, everything else is text.
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "true" => return ArgValue::Flag(true),
            "false" => return ArgValue::Flag(false),
            _ => {}
        }
        if let Ok(int) = raw.parse::<i64>() {
            return ArgValue::Int(int);
        }
        match raw.parse::<f64>() {
            Ok(float) if float.is_finite() => ArgValue::Float(float),
            _ => ArgValue::Text(raw.to_string()),
        }
    }
}

/// Plain decimal rendering; integral values keep a trailing `.0`.
fn decimal(value: f64) -> String {
    let rendered = value.to_string();
    if value.is_finite() && !rendered.contains('.') {
        format!("{rendered}.0")
    } else {
        rendered
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Flag(flag) => write!(f, "{flag}"),
            ArgValue::Int(value) => write!(f, "{value}"),
            ArgValue::Float(value) => f.write_str(&decimal(*value)),
            ArgValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Flag(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Int(i64::from(value))
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Int(i64::from(value))
    }
}

impl From<u16> for ArgValue {
    fn from(value: u16) -> Self {
        ArgValue::Int(i64::from(value))
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Text(value)
    }
}

/// Ordered, duplicate-free daemon arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaemonArgs {
    entries: Vec<(String, ArgValue)>,
}

impl DaemonArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position when it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Overrides first, in their own order, then every default the caller
    /// did not override. Neither input is modified.
    pub fn merged_over(&self, defaults: &DaemonArgs) -> DaemonArgs {
        let mut merged = self.clone();
        for (key, value) in defaults.iter() {
            if !merged.contains(key) {
                merged.entries.push((key.to_string(), value.clone()));
            }
        }
        merged
    }

    pub fn to_tokens(&self) -> Vec<String> {
        self.iter().map(|(key, value)| value.encode(key)).collect()
    }

    /// Builds arguments from a JSON object such as `{"testnet": 1}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = match value {
            Value::Object(object) => object,
            Value::Null => return Ok(Self::new()),
            other => {
                return Err(HarnessError::configuration(format!(
                    "daemon arguments must be an object, got {other}"
                )));
            }
        };
        let mut args = Self::new();
        for (key, value) in object {
            args.set(key.clone(), ArgValue::from_json(value));
        }
        Ok(args)
    }

    /// Parses `key=value` (or bare `key`, meaning `true`).
    pub fn parse_assignment(raw: &str) -> Result<(String, ArgValue)> {
        let (key, value) = match raw.split_once('=') {
            Some((key, value)) => (key.trim(), ArgValue::parse_literal(value)),
            None => (raw.trim(), ArgValue::Flag(true)),
        };
        let key = key.trim_start_matches('-');
        if key.is_empty() {
            return Err(HarnessError::configuration(format!(
                "argument '{raw}' has no key"
            )));
        }
        Ok((key.to_string(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for DaemonArgs
where
    K: Into<String>,
    V: Into<ArgValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (key, value) in iter {
            args.set(key, value);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_encoding_asymmetry() {
        assert_eq!(ArgValue::Flag(true).encode("server"), "-server");
        assert_eq!(ArgValue::Flag(false).encode("stakegen"), "-stakegen=0");
        assert_eq!(ArgValue::Int(-1).encode("checkblocks"), "-checkblocks=-1");
        assert_eq!(ArgValue::Float(0.5).encode("fee"), "-fee=0.5");
        assert_eq!(ArgValue::Float(2.0).encode("fee"), "-fee=2.0");
    }

    #[test]
    fn test_floats_never_use_exponent_notation() {
        assert_eq!(
            ArgValue::Float(1e20).encode("maxsupply"),
            "-maxsupply=100000000000000000000.0"
        );
        assert_eq!(ArgValue::Float(1e-7).encode("fee"), "-fee=0.0000001");
        assert_eq!(ArgValue::Float(-3.0).to_string(), "-3.0");
        assert_eq!(
            ArgValue::from("*.*.*.*").encode("rpcallowip"),
            "-rpcallowip=\"*.*.*.*\""
        );
    }

    #[test]
    fn test_set_keeps_position_and_last_value() {
        let mut args = DaemonArgs::new();
        args.set("a", 1);
        args.set("b", true);
        args.set("a", 2);
        assert_eq!(args.to_tokens(), vec!["-a=2", "-b"]);
    }

    #[test]
    fn test_merge_puts_overrides_first_and_leaves_inputs_alone() {
        let defaults = DaemonArgs::new()
            .with("printtoconsole", true)
            .with("keypool", 1)
            .with("stakegen", false);
        let user = DaemonArgs::new().with("testnet", 1).with("stakegen", true);

        let merged = user.merged_over(&defaults);

        assert_eq!(
            merged.to_tokens(),
            vec!["-testnet=1", "-stakegen", "-printtoconsole", "-keypool=1"]
        );
        assert_eq!(user.len(), 2);
        assert_eq!(defaults.get("stakegen"), Some(&ArgValue::Flag(false)));
    }

    #[test]
    fn test_from_json_object() {
        let args = DaemonArgs::from_json(&json!({
            "testnet": 1,
            "server": true,
            "rpcuser": "alice",
            "fee": 0.25,
            "note": null
        }))
        .unwrap();
        assert_eq!(args.get("testnet"), Some(&ArgValue::Int(1)));
        assert_eq!(args.get("server"), Some(&ArgValue::Flag(true)));
        assert_eq!(args.get("fee"), Some(&ArgValue::Float(0.25)));
        assert_eq!(args.get("note").map(|v| v.encode("note")).as_deref(), Some("-note=\"\""));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = DaemonArgs::from_json(&json!(["testnet"])).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration { .. }));
        assert!(DaemonArgs::from_json(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            DaemonArgs::parse_assignment("testnet=1").unwrap(),
            ("testnet".to_string(), ArgValue::Int(1))
        );
        assert_eq!(
            DaemonArgs::parse_assignment("-server").unwrap(),
            ("server".to_string(), ArgValue::Flag(true))
        );
        assert_eq!(
            DaemonArgs::parse_assignment("unpark=false").unwrap(),
            ("unpark".to_string(), ArgValue::Flag(false))
        );
        assert_eq!(
            DaemonArgs::parse_assignment("rpcuser=alice").unwrap(),
            ("rpcuser".to_string(), ArgValue::Text("alice".to_string()))
        );
        assert!(DaemonArgs::parse_assignment("=1").is_err());
    }

    #[test]
    fn test_parse_literal_keeps_non_finite_as_text() {
        assert_eq!(ArgValue::parse_literal("inf"), ArgValue::Text("inf".to_string()));
        assert_eq!(ArgValue::parse_literal("1.5"), ArgValue::Float(1.5));
    }

    proptest! {
        #[test]
        fn prop_true_is_bare_flag(key in "[a-z]{1,12}") {
            prop_assert_eq!(ArgValue::Flag(true).encode(&key), format!("-{key}"));
        }

        #[test]
        fn prop_false_is_zero(key in "[a-z]{1,12}") {
            prop_assert_eq!(ArgValue::Flag(false).encode(&key), format!("-{key}=0"));
        }

        #[test]
        fn prop_integers_are_unquoted(key in "[a-z]{1,12}", value in any::<i64>()) {
            prop_assert_eq!(ArgValue::Int(value).encode(&key), format!("-{key}={value}"));
        }

        #[test]
        fn prop_text_is_quoted(key in "[a-z]{1,12}", value in "[ -~]{0,20}") {
            prop_assert_eq!(
                ArgValue::Text(value.clone()).encode(&key),
                format!("-{key}=\"{value}\"")
            );
        }

        #[test]
        fn prop_merge_never_duplicates_keys(
            user in proptest::collection::vec(("[a-d]", any::<bool>()), 0..8),
            defaults in proptest::collection::vec(("[a-f]", any::<i32>()), 0..8),
        ) {
            let user: DaemonArgs = user.into_iter().collect();
            let defaults: DaemonArgs = defaults.into_iter().collect();
            let merged = user.merged_over(&defaults);
            let mut keys: Vec<&str> = merged.iter().map(|(key, _)| key).collect();
            let total = keys.len();
            keys.sort_unstable();
            keys.dedup();
            prop_assert_eq!(keys.len(), total);
            for (key, value) in user.iter() {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
    }
}
