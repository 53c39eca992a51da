//! Deserializers for the shapes the backend actually sends.
//!
//! The signal tables live in SQLite and are dumped row-by-row, so booleans come
//! back as `0/1`, nullable numeric columns come back as `null`, and the
//! martingale columns are either real arrays or strings holding a list.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Int(i64),
    Text(String),
}

pub(crate) fn bool_or_int<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<BoolLike>::deserialize(de)? {
        None => false,
        Some(BoolLike::Bool(b)) => b,
        Some(BoolLike::Int(i)) => i != 0,
        Some(BoolLike::Text(s)) => matches!(s.trim(), "1" | "true" | "True" | "TRUE"),
    })
}

pub(crate) fn f64_or_null<'de, D>(de: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(de)?.unwrap_or(0.0))
}

pub(crate) fn u32_or_null<'de, D>(de: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(de)?.unwrap_or(0))
}

pub(crate) fn string_or_null<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimeList {
    List(Vec<String>),
    Joined(String),
}

/// `["14:35","14:40"]` or `"14:35,14:40"`. Entries stay at their level: a blank
/// one is kept as `""` so the levels after it keep their own times.
pub(crate) fn time_list<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<TimeList>::deserialize(de)? {
        None => return Ok(Vec::new()),
        Some(TimeList::Joined(s)) if s.trim().is_empty() => return Ok(Vec::new()),
        Some(TimeList::List(v)) => v,
        Some(TimeList::Joined(s)) => s.split(',').map(str::to_string).collect(),
    };
    Ok(raw.into_iter().map(|t| t.trim().to_string()).collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountList {
    List(Vec<Option<f64>>),
    Encoded(String),
}

/// `[25.0, 56.25]` or `"[25.0, 56.25]"`. An undecodable string is an empty list.
pub(crate) fn amount_list<'de, D>(de: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<AmountList>::deserialize(de)? {
        None => return Ok(Vec::new()),
        Some(AmountList::List(v)) => v,
        Some(AmountList::Encoded(s)) => {
            serde_json::from_str::<Vec<Option<f64>>>(&s).unwrap_or_default()
        }
    };
    Ok(raw.into_iter().map(|a| a.unwrap_or(0.0)).collect())
}

/// Optional enum column that may also arrive as `""` or an unknown word.
pub(crate) fn blank_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
{
    Ok(Option::<String>::deserialize(de)?
        .and_then(|s| s.trim().parse::<T>().ok()))
}
