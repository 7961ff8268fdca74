// Record model and variant registry.
// Normalizes raw Table API rows into typed records and builds the minimal
// patch payload for each kind on write-back.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::timefmt::{self, DisplayFormats};

/// Class-name prefixes stripped during normalization. At most one is removed.
const TRIM_PREFIXES: [&str; 2] = ["sys_", "sp_"];

/// Record kinds mirrored from the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    ScriptInclude,
    Widget,
    Theme,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::ScriptInclude,
        RecordKind::Widget,
        RecordKind::Theme,
    ];

    /// Table API table backing this kind.
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::ScriptInclude => "sys_script_include",
            RecordKind::Widget => "sp_widget",
            RecordKind::Theme => "sp_theme",
        }
    }

    /// Normalized class tag identifying this kind on a record.
    pub fn class_tag(&self) -> &'static str {
        match self {
            RecordKind::ScriptInclude => "script_include",
            RecordKind::Widget => "widget",
            RecordKind::Theme => "theme",
        }
    }

    /// Resolve a normalized class tag to a kind.
    pub fn from_class_tag(tag: &str) -> Option<RecordKind> {
        match tag {
            "script_include" => Some(RecordKind::ScriptInclude),
            "widget" => Some(RecordKind::Widget),
            "theme" => Some(RecordKind::Theme),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_tag())
    }
}

/// Normalize a raw class name: lower-case, first space to underscore, then
/// strip at most one known prefix.
pub fn normalize_class_tag(raw: &str) -> String {
    let tag = raw.to_lowercase().replacen(' ', "_", 1);
    for prefix in TRIM_PREFIXES {
        if let Some(stripped) = tag.strip_prefix(prefix) {
            return stripped.to_string();
        }
    }
    tag
}

/// Weak link to another remote entity: an API link plus a display value.
/// Back-reference only, never owned by the record carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub value: String,
}

/// Raw Table API row before normalization. Variant-specific fields stay in
/// `extra` until the class tag selects a payload type.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub sys_class_name: String,
    pub sys_id: String,
    #[serde(default)]
    pub sys_policy: String,
    pub sys_updated_on: String,
    pub sys_created_on: String,
    #[serde(default, deserialize_with = "de::reference")]
    pub sys_package: Reference,
    #[serde(default, deserialize_with = "de::reference")]
    pub sys_scope: Reference,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Base fields shared by every record. `sys_class_name` holds the normalized
/// class tag; both timestamps are in the remote store's clock, UTC-normalized
/// at parse time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    pub sys_class_name: String,
    pub sys_id: String,
    pub sys_policy: String,
    #[serde(serialize_with = "glide_ts::serialize")]
    pub sys_updated_on: DateTime<Utc>,
    #[serde(serialize_with = "glide_ts::serialize")]
    pub sys_created_on: DateTime<Utc>,
    pub sys_package: Reference,
    pub sys_scope: Reference,
}

impl Meta {
    /// Build the base fields from a raw row, normalizing the class name and
    /// parsing both timestamps with the instance display formats.
    pub fn from_raw(raw: &RawRecord, formats: &DisplayFormats) -> Result<Meta> {
        Ok(Meta {
            sys_class_name: normalize_class_tag(&raw.sys_class_name),
            sys_id: raw.sys_id.clone(),
            sys_policy: raw.sys_policy.clone(),
            sys_updated_on: timefmt::parse_datetime(&raw.sys_updated_on, formats)?,
            sys_created_on: timefmt::parse_datetime(&raw.sys_created_on, formats)?,
            sys_package: raw.sys_package.clone(),
            sys_scope: raw.sys_scope.clone(),
        })
    }

    /// Kind of this record, if its class tag is in the registry.
    pub fn kind(&self) -> Option<RecordKind> {
        RecordKind::from_class_tag(&self.sys_class_name)
    }
}

/// Script include fields. `script` is the locally editable body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptInclude {
    #[serde(default, deserialize_with = "de::flag")]
    pub client_callable: bool,
    #[serde(default)]
    pub access: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub active: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub api_name: String,
    #[serde(default)]
    pub name: String,
}

/// Service Portal widget fields. `template`, `css`, `client_script` and
/// `script` are the locally editable bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub css: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub internal: bool,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub docs: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub public: bool,
    #[serde(default)]
    pub client_script: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub field_list: String,
    #[serde(default)]
    pub demo_data: String,
    #[serde(default)]
    pub option_schema: String,
    #[serde(default)]
    pub script: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub has_preview: bool,
    #[serde(default, deserialize_with = "de::flag")]
    pub servicenow: bool,
    #[serde(default)]
    pub data_table: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub controller_as: String,
}

/// Service Portal theme fields. `css_variables` is the locally editable block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default)]
    pub css_variables: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub navbar_fixed: bool,
    #[serde(default, deserialize_with = "de::flag")]
    pub footer_fixed: bool,
    #[serde(default)]
    pub footer: String,
    #[serde(default, deserialize_with = "de::reference")]
    pub header: Reference,
}

/// Variant-specific fields, selected by the normalized class tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    ScriptInclude(ScriptInclude),
    Widget(Widget),
    Theme(Theme),
    /// Row whose class tag is not in the registry; extra wire fields are kept
    /// verbatim so nothing is lost on re-serialization.
    Unknown(Map<String, Value>),
}

impl Payload {
    /// Type the remaining row fields for `tag`. Unrecognized tags, and rows
    /// whose fields do not fit their declared kind, stay untyped so callers
    /// skip variant-specific behavior instead of failing.
    fn from_parts(tag: &str, extra: Map<String, Value>) -> Payload {
        let Some(kind) = RecordKind::from_class_tag(tag) else {
            return Payload::Unknown(extra);
        };

        let fields = Value::Object(extra.clone());
        let typed = match kind {
            RecordKind::ScriptInclude => serde_json::from_value(fields).map(Payload::ScriptInclude),
            RecordKind::Widget => serde_json::from_value(fields).map(Payload::Widget),
            RecordKind::Theme => serde_json::from_value(fields).map(Payload::Theme),
        };
        typed.unwrap_or(Payload::Unknown(extra))
    }
}

/// One remote record: base fields plus the variant payload for its kind.
///
/// Records are only constructed by normalizing a remote row; variant bodies
/// are the one part callers mutate before a write-back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    pub meta: Meta,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Record {
    /// Normalize a raw Table API row into a typed record.
    ///
    /// An unrecognized class tag still yields the base fields (with an
    /// untyped payload); the only failure mode is a timestamp that even the
    /// fallback pattern cannot parse.
    pub fn from_raw(raw: RawRecord, formats: &DisplayFormats) -> Result<Record> {
        let meta = Meta::from_raw(&raw, formats)?;
        let payload = Payload::from_parts(&meta.sys_class_name, raw.extra);
        Ok(Record { meta, payload })
    }

    /// Kind of this record, if its class tag is in the registry.
    pub fn kind(&self) -> Option<RecordKind> {
        self.meta.kind()
    }

    /// Minimal patch body for a write-back: only the fields under local edit
    /// for this kind, never the immutable metadata. `None` for untyped rows.
    pub fn patch_body(&self) -> Option<Value> {
        match &self.payload {
            Payload::ScriptInclude(si) => Some(json!({ "script": si.script })),
            Payload::Widget(w) => Some(json!({
                "script": w.script,
                "css": w.css,
                "client_script": w.client_script,
                "template": w.template,
            })),
            Payload::Theme(t) => Some(json!({ "script": t.css_variables })),
            Payload::Unknown(_) => None,
        }
    }
}

// Canonical serialization already yields a valid raw row, so deserialization
// is re-normalization with the canonical `yyyy-MM-dd HH:mm:ss` timestamps.
impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Record, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawRecord::deserialize(deserializer)?;
        Record::from_raw(raw, &DisplayFormats::default()).map_err(serde::de::Error::custom)
    }
}

/// Canonical `yyyy-MM-dd HH:mm:ss` UTC timestamp representation.
mod glide_ts {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }
}

/// Lenient decoders for the Table API's wire quirks.
mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::Reference;

    /// Booleans arrive as JSON booleans or as `"true"`/`"false"` strings.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::String(s) => s == "true" || s == "1",
            _ => false,
        })
    }

    /// Reference fields arrive as `{link, value}` objects, or as an empty
    /// string when the reference is unset.
    pub fn reference<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Reference, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => serde_json::from_value(Value::Object(map)).unwrap_or_default(),
            _ => Reference::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    fn raw_script_include() -> RawRecord {
        raw(json!({
            "sys_class_name": "sys_script_include",
            "sys_id": "e0085ebbdb171780e1b873dcaf96197e",
            "sys_policy": "",
            "sys_updated_on": "2026-01-15 10:00:00",
            "sys_created_on": "2025-11-02 08:30:00",
            "sys_package": { "link": "https://host/api/now/table/sys_package/abc", "value": "abc" },
            "sys_scope": { "link": "https://host/api/now/table/sys_scope/global", "value": "global" },
            "client_callable": "true",
            "access": "public",
            "active": "true",
            "description": "utility functions",
            "script": "var Util = Class.create();",
            "api_name": "global.Util",
            "name": "Util"
        }))
    }

    #[test]
    fn test_class_tag_normalization() {
        assert_eq!(normalize_class_tag("sys_script_include"), "script_include");
        assert_eq!(normalize_class_tag("sp_widget"), "widget");
        assert_eq!(normalize_class_tag("Sp_Theme"), "theme");
        assert_eq!(normalize_class_tag("incident"), "incident");
        assert_eq!(normalize_class_tag("Special Program"), "special_program");
    }

    #[test]
    fn test_class_tag_strips_one_prefix_only() {
        assert_eq!(normalize_class_tag("sys_sp_widget"), "sp_widget");
    }

    #[test]
    fn test_normalize_script_include() {
        let record = Record::from_raw(raw_script_include(), &DisplayFormats::default()).unwrap();

        assert_eq!(record.kind(), Some(RecordKind::ScriptInclude));
        assert_eq!(record.meta.sys_class_name, "script_include");
        assert_eq!(record.meta.sys_scope.value, "global");

        let Payload::ScriptInclude(si) = &record.payload else {
            panic!("expected script include payload");
        };
        assert!(si.client_callable);
        assert_eq!(si.name, "Util");
        assert_eq!(si.script, "var Util = Class.create();");
    }

    #[test]
    fn test_normalize_unknown_kind_keeps_base() {
        let record = Record::from_raw(
            raw(json!({
                "sys_class_name": "incident",
                "sys_id": "0001",
                "sys_updated_on": "2026-01-15 10:00:00",
                "sys_created_on": "2026-01-15 10:00:00",
                "short_description": "printer on fire"
            })),
            &DisplayFormats::default(),
        )
        .unwrap();

        assert_eq!(record.kind(), None);
        assert_eq!(record.meta.sys_id, "0001");
        let Payload::Unknown(extra) = &record.payload else {
            panic!("expected untyped payload");
        };
        assert_eq!(extra["short_description"], "printer on fire");
    }

    #[test]
    fn test_empty_reference_string_tolerated() {
        let record = Record::from_raw(
            raw(json!({
                "sys_class_name": "sp_theme",
                "sys_id": "0002",
                "sys_updated_on": "2026-01-15 10:00:00",
                "sys_created_on": "2026-01-15 10:00:00",
                "sys_package": "",
                "sys_scope": "",
                "css_variables": "$navbar-color: #333;",
                "header": ""
            })),
            &DisplayFormats::default(),
        )
        .unwrap();

        assert_eq!(record.meta.sys_package, Reference::default());
        let Payload::Theme(theme) = &record.payload else {
            panic!("expected theme payload");
        };
        assert_eq!(theme.header, Reference::default());
        assert_eq!(theme.css_variables, "$navbar-color: #333;");
    }

    #[test]
    fn test_patch_body_script_include_only_script() {
        let record = Record::from_raw(raw_script_include(), &DisplayFormats::default()).unwrap();
        let body = record.patch_body().unwrap();

        let fields: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(fields, ["script"]);
        assert_eq!(body["script"], "var Util = Class.create();");
    }

    #[test]
    fn test_patch_body_widget_editable_fields() {
        let record = Record::from_raw(
            raw(json!({
                "sys_class_name": "sp_widget",
                "sys_id": "w1",
                "sys_updated_on": "2026-01-15 10:00:00",
                "sys_created_on": "2026-01-15 10:00:00",
                "template": "<div></div>",
                "css": ".x {}",
                "client_script": "function(){}",
                "script": "(function(){})()",
                "internal": "false",
                "public": "true",
                "name": "clock",
                "roles": "",
                "data_table": "sp_instance"
            })),
            &DisplayFormats::default(),
        )
        .unwrap();

        let body = record.patch_body().unwrap();
        let mut fields: Vec<&String> = body.as_object().unwrap().keys().collect();
        fields.sort();
        assert_eq!(fields, ["client_script", "css", "script", "template"]);
        assert_eq!(body["template"], "<div></div>");
    }

    #[test]
    fn test_patch_body_theme_style_block() {
        let record = Record::from_raw(
            raw(json!({
                "sys_class_name": "sp_theme",
                "sys_id": "t1",
                "sys_updated_on": "2026-01-15 10:00:00",
                "sys_created_on": "2026-01-15 10:00:00",
                "css_variables": "$sp-body-bg: #fff;",
                "name": "stock",
                "navbar_fixed": "true",
                "footer": ""
            })),
            &DisplayFormats::default(),
        )
        .unwrap();

        let body = record.patch_body().unwrap();
        let fields: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(fields, ["script"]);
        assert_eq!(body["script"], "$sp-body-bg: #fff;");
    }

    #[test]
    fn test_unknown_payload_has_no_patch_body() {
        let record = Record::from_raw(
            raw(json!({
                "sys_class_name": "incident",
                "sys_id": "i1",
                "sys_updated_on": "2026-01-15 10:00:00",
                "sys_created_on": "2026-01-15 10:00:00"
            })),
            &DisplayFormats::default(),
        )
        .unwrap();
        assert!(record.patch_body().is_none());
    }

    #[test]
    fn test_canonical_round_trip() {
        let record = Record::from_raw(raw_script_include(), &DisplayFormats::default()).unwrap();

        let value = serde_json::to_value(&record).unwrap();
        // Canonical names only, normalized tag, canonical timestamps.
        assert_eq!(value["sys_class_name"], "script_include");
        assert_eq!(value["sys_updated_on"], "2026-01-15 10:00:00");
        assert_eq!(value["client_callable"], true);

        let reparsed: Record = serde_json::from_value(value).unwrap();
        assert_eq!(reparsed, record);
    }

    #[test]
    fn test_lenient_flags() {
        let parse = |v: Value| -> ScriptInclude { serde_json::from_value(v).unwrap() };

        assert!(parse(json!({ "client_callable": true })).client_callable);
        assert!(parse(json!({ "client_callable": "true" })).client_callable);
        assert!(!parse(json!({ "client_callable": "false" })).client_callable);
        assert!(!parse(json!({})).client_callable);
    }
}
