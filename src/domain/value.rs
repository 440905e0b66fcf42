use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Placeholder emitted for values that cannot be serialized or stringified.
pub const UNREPRESENTABLE: &str = "<unrepresentable>";

/// A structured value attached to a log event.
///
/// Besides the JSON-native shapes this carries the types callers commonly
/// attach to log lines (ids, timestamps, raw bytes, paths, sets) so the
/// formatter can give each a canonical rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Path(PathBuf),
    Seq(Vec<FieldValue>),
    Set(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    /// Output of `serde_json::to_value` for caller types implementing `Serialize`.
    Json(serde_json::Value),
    /// A value that failed conversion at the call site.
    Unrepresentable,
}

impl FieldValue {
    /// Converts any `Serialize` type; a failing serializer degrades to
    /// [`FieldValue::Unrepresentable`] instead of surfacing an error.
    pub fn serialized<T: Serialize + ?Sized>(value: &T) -> Self {
        serde_json::to_value(value).map_or(FieldValue::Unrepresentable, FieldValue::Json)
    }

    /// Raw bytes; rendered as lossy UTF-8 text.
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        FieldValue::Bytes(value.into())
    }

    /// Renders a `Debug` value to text at the call site.
    pub fn debug<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        let mut out = String::new();
        match write!(out, "{value:?}") {
            Ok(()) => FieldValue::Str(out),
            Err(_) => FieldValue::Unrepresentable,
        }
    }

    /// Renders a `Display` value to text at the call site.
    pub fn display<T: fmt::Display + ?Sized>(value: &T) -> Self {
        let mut out = String::new();
        match write!(out, "{value}") {
            Ok(()) => FieldValue::Str(out),
            Err(_) => FieldValue::Unrepresentable,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            FieldValue::Seq(_) | FieldValue::Set(_) | FieldValue::Map(_)
        ) || matches!(
            self,
            FieldValue::Json(serde_json::Value::Array(_) | serde_json::Value::Object(_))
        )
    }
}

/// Best-effort text form used when a value is rendered as a string fallback.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::I64(n) => write!(f, "{n}"),
            FieldValue::U64(n) => write!(f, "{n}"),
            FieldValue::F64(n) => write!(f, "{n}"),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            FieldValue::Uuid(u) => write!(f, "{}", u.hyphenated()),
            FieldValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Path(p) => write!(f, "{}", p.display()),
            FieldValue::Seq(items) => write_items(f, "[", "]", items),
            FieldValue::Set(items) => write_items(f, "{", "}", items),
            FieldValue::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
            FieldValue::Json(value) => write!(f, "{value}"),
            FieldValue::Unrepresentable => f.write_str(UNREPRESENTABLE),
        }
    }
}

fn write_items(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    close: &str,
    items: &[FieldValue],
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

macro_rules! impl_from_int {
    ($variant:ident, $target:ty; $($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(value: $t) -> Self {
                    FieldValue::$variant(value as $target)
                }
            }
        )*
    };
}

impl_from_int!(I64, i64; i8, i16, i32, i64, isize);
impl_from_int!(U64, u64; u8, u16, u32, u64, usize);

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::F64(f64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::F64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Str(value.clone())
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<PathBuf> for FieldValue {
    fn from(value: PathBuf) -> Self {
        FieldValue::Path(value)
    }
}

impl From<&Path> for FieldValue {
    fn from(value: &Path) -> Self {
        FieldValue::Path(value.to_path_buf())
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Json(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        FieldValue::Seq(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<HashSet<T>> for FieldValue {
    fn from(value: HashSet<T>) -> Self {
        FieldValue::Set(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<BTreeSet<T>> for FieldValue {
    fn from(value: BTreeSet<T>) -> Self {
        FieldValue::Set(value.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> From<HashMap<K, V>> for FieldValue {
    fn from(value: HashMap<K, V>) -> Self {
        FieldValue::Map(value.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> From<BTreeMap<K, V>> for FieldValue {
    fn from(value: BTreeMap<K, V>) -> Self {
        FieldValue::Map(value.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<Fields> for FieldValue {
    fn from(value: Fields) -> Self {
        FieldValue::Map(value.0)
    }
}

/// Structured extras attached to an event. Keys are unique; inserting an
/// existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn extend(&mut self, other: Fields) {
        self.0.extend(other.0);
    }
}

impl<K: Into<String>, V: Into<FieldValue>, const N: usize> From<[(K, V); N]> for Fields {
    fn from(pairs: [(K, V); N]) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Builds [`Fields`] from `key => value` pairs.
///
/// ```
/// use rask_log_pipeline::fields;
/// let extras = fields! { "order_id" => 99, "region" => "eu" };
/// assert_eq!(extras.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $( fields.insert($key, $value); )+
        fields
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_keys_unique() {
        let fields = Fields::new().with("a", 1).with("a", 2);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("a"), Some(&FieldValue::I64(2)));
    }

    #[test]
    fn test_display_fallbacks() {
        let id = Uuid::nil();
        assert_eq!(
            FieldValue::from(id).to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(FieldValue::from(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(FieldValue::Unrepresentable.to_string(), UNREPRESENTABLE);
    }

    #[test]
    fn test_display_value_that_fails_to_format() {
        struct Broken;
        impl fmt::Display for Broken {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        assert_eq!(FieldValue::display(&Broken), FieldValue::Unrepresentable);
    }

    #[test]
    fn test_serialized_failure_degrades() {
        // Maps with non-string keys cannot become JSON objects.
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        assert_eq!(FieldValue::serialized(&map), FieldValue::Unrepresentable);
    }
}
