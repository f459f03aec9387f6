use serde::{Deserialize, Serialize};

/// One selectable choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub label: String,
    pub value: String,
}

/// A named, reusable set of options referenced by SELECT/RADIO fields.
///
/// No two options share the same `(label, value)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub options: Vec<OptionItem>,
    /// Bumped on every write; guards concurrent option appends.
    #[serde(default)]
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl OptionList {
    pub fn contains(&self, label: &str, value: &str) -> bool {
        self.options
            .iter()
            .any(|o| o.label == label && o.value == value)
    }

    /// Append `item` unless an identical pair exists. Returns whether it was added.
    pub fn add_option(&mut self, item: OptionItem) -> bool {
        if self.contains(&item.label, &item.value) {
            return false;
        }
        self.options.push(item);
        true
    }

    /// Whether `v` matches one of the options by value or label.
    pub fn accepts(&self, v: &str) -> bool {
        self.options.iter().any(|o| o.value == v || o.label == v)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptionList {
    pub name: String,
    #[serde(default)]
    pub options: Vec<OptionItem>,
}

/// A standalone record that, once created, is mirrored into its parent list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionListEntry {
    pub id: String,
    pub list_id: String,
    pub label: String,
    pub value: String,
    pub created_at: String,
}

impl OptionListEntry {
    pub fn as_option(&self) -> OptionItem {
        OptionItem {
            label: self.label.clone(),
            value: self.value.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptionListEntry {
    pub list_id: String,
    pub label: String,
    /// Defaults to `label`.
    #[serde(default)]
    pub value: Option<String>,
}

/// Result of creating an entry.
///
/// `synced` is false when the entry was stored but mirroring it into the
/// parent list failed; `POST /option-lists/{id}/@resync` repairs it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryCreated {
    pub entry: OptionListEntry,
    pub synced: bool,
}
