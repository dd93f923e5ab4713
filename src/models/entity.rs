use serde::{Deserialize, Deserializer, Serialize};

/// Display-name-bearing sub-record attached to a tracked entity.
/// Only used for message formatting; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Owner {
    pub display_name: Option<String>,
    pub first_name:   Option<String>,
    pub last_name:    Option<String>,
}

impl Owner {
    /// `displayName` if set, otherwise "first last", otherwise "".
    pub fn display_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().map(str::trim) {
            if !name.is_empty() { return name.to_string(); }
        }
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One record with a deadline, as supplied by the data source.
///
/// `is_overdue == true` is expected to imply `days_remaining <= 0`, but the
/// evaluator does not rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackedEntity {
    /// Backends send either a string or an integer key.
    #[serde(deserialize_with = "string_or_number")]
    pub id:                String,
    #[serde(deserialize_with = "null_as_default")]
    pub requires_tracking: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_overdue:        bool,
    /// Negative = overdue by that many days, 0 = due today.
    #[serde(deserialize_with = "null_as_default")]
    pub days_remaining:    i64,
    pub owner:             Option<Owner>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Uint(u64),
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<RawId>::deserialize(d)? {
        Some(RawId::Text(s)) => s,
        Some(RawId::Int(n))  => n.to_string(),
        Some(RawId::Uint(n)) => n.to_string(),
        None                 => String::new(),
    })
}

/// An explicit `null` decodes like a missing key.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

impl TrackedEntity {
    pub fn display_name(&self) -> String {
        self.owner.as_ref().map(Owner::display_name).unwrap_or_default()
    }
}
