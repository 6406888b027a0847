use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One spreadsheet row in the registered-tags table.
///
/// The sheet service spells columns in upper case and is loose about value
/// types (quantities arrive as numbers or strings depending on how the cell
/// was filled). Every cell is normalized to a `String`; absent cells become
/// empty strings. `tag_id` is opaque text: leading zeros are significant and
/// it is never parsed numerically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagRow {
    #[serde(rename = "TAG_ID", default, deserialize_with = "cell")]
    pub tag_id: String,
    #[serde(rename = "LOT_ID", default, deserialize_with = "cell")]
    pub lot_id: String,
    #[serde(rename = "LOT_QTY", default, deserialize_with = "cell")]
    pub lot_qty: String,
    #[serde(rename = "PRODUCT_NAME", default, deserialize_with = "cell")]
    pub product_name: String,
    // Backing tab name; may differ from lot_id after a tab rename.
    // Write-backs address the sheet by this field.
    #[serde(rename = "SHEET", default, deserialize_with = "cell")]
    pub sheet: String,
}

/// `tags_table` payload: the full table plus the service's "last updated"
/// stamp. A missing or non-array `rows` field reads as an empty table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsSnapshot {
    #[serde(default, deserialize_with = "row_list")]
    pub rows: Vec<TagRow>,
    #[serde(default, deserialize_with = "opt_cell")]
    pub updated: Option<String>,
}

/// `tag_seed` payload. The service echoes back what it wrote, but every
/// field is optional; display code falls back to the submitted values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedReceipt {
    #[serde(default, deserialize_with = "opt_cell")]
    pub tab: Option<String>,
    #[serde(default, deserialize_with = "opt_cell")]
    pub lot_id: Option<String>,
    #[serde(default, deserialize_with = "opt_cell")]
    pub tag_id: Option<String>,
    #[serde(default, deserialize_with = "opt_cell")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "opt_cell")]
    pub in_qty: Option<String>,
}

/// `tag_deregister` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeregisterReceipt {
    #[serde(default, deserialize_with = "opt_cell")]
    pub note: Option<String>,
}

/// Coerce a loosely-typed sheet cell to text the way the table is read:
/// null reads as empty, numbers and booleans as their printed form.
fn coerce(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn cell<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce(Value::deserialize(deserializer)?))
}

fn opt_cell<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        other => Some(coerce(other)),
    })
}

fn row_list<'de, D>(deserializer: D) -> Result<Vec<TagRow>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect()),
        _ => Ok(Vec::new()),
    }
}
