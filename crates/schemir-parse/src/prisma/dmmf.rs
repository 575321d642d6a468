//! Subset of Prisma's DMMF (data model meta format) that describes tables.
//!
//! Only the `datamodel` part is read. Unknown keys are ignored so newer
//! Prisma versions keep working.

use serde::Deserialize;

/// Either a full DMMF document or its bare `datamodel` member.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Input {
    Document { datamodel: Datamodel },
    Datamodel(Datamodel),
}

impl Input {
    pub(crate) fn into_datamodel(self) -> Datamodel {
        match self {
            Input::Document { datamodel } | Input::Datamodel(datamodel) => datamodel,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datamodel {
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub enums: Vec<Enum>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    /// `@@map` target
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Composite `@@id`
    #[serde(default)]
    pub primary_key: Option<PrimaryKey>,
    #[serde(default)]
    pub unique_indexes: Vec<UniqueIndex>,
    #[serde(default)]
    pub documentation: Option<String>,
}

impl Model {
    pub fn table_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Scalar,
    Object,
    Enum,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_id: bool,
    /// Scalar type name, enum name, or related model name
    #[serde(rename = "type")]
    pub ty: String,
    /// `@map` target
    #[serde(default)]
    pub db_name: Option<String>,
    /// `@db.VarChar(255)` arrives as `["VarChar", ["255"]]`
    #[serde(default)]
    pub native_type: Option<(String, Vec<String>)>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub relation_name: Option<String>,
    #[serde(default)]
    pub relation_from_fields: Option<Vec<String>>,
    #[serde(default)]
    pub relation_to_fields: Option<Vec<String>>,
    #[serde(default)]
    pub relation_on_delete: Option<String>,
    #[serde(default)]
    pub relation_on_update: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
}

impl Field {
    pub fn column_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.name)
    }

    pub fn from_fields(&self) -> &[String] {
        self.relation_from_fields.as_deref().unwrap_or_default()
    }

    pub fn to_fields(&self) -> &[String] {
        self.relation_to_fields.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryKey {
    #[serde(default)]
    pub name: Option<String>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UniqueIndex {
    #[serde(default)]
    pub name: Option<String>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enum {
    pub name: String,
    #[serde(default)]
    pub values: Vec<EnumValue>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub name: String,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Id,
    Unique,
    Normal,
    Fulltext,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub model: String,
    #[serde(rename = "type")]
    pub kind: IndexKind,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub fields: Vec<IndexField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexField {
    pub name: String,
}
