//! Serde data models in Rust.
//!
//! Declarations are chosen by the type's kind through a [`Dispatcher`]:
//! structs (and every struct nested inside them) become `pub struct`s, enums
//! become strum-enabled `pub enum`s. Field types map trait by trait, see
//! [`map_type`].
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;

use super::{sql, to_pascal_case, CodeWriter, Emitter};
use crate::definition::{ModelDefinition, Registries};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::model::MixedModel;
use crate::parsers::Parsed;
use crate::types::example::to_snake_case;
use crate::types::{traits, DyType};

const DEFAULT_DERIVE: &[&str] = &["Clone", "Debug", "Serialize", "Deserialize", "PartialEq"];
const ENUM_DERIVE: &[&str] = &[
    "Copy", "Clone", "Debug", "Serialize", "Deserialize", "PartialEq", "Eq", "EnumString", "Display",
];

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "unsafe", "use",
    "where", "while",
];

type Declare = fn(&DyType, &mut CodeWriter) -> Result<()>;

static DECLARATIONS: Lazy<Dispatcher<Declare>> = Lazy::new(|| {
    Dispatcher::new()
        .on("struct", emit_struct as Declare)
        .on("enum", emit_enum as Declare)
        .otherwise(not_declarable as Declare)
});

pub struct RustDataEmitter;

// ————————————————————————————————————————————————————————————————————————————
// NAMES & TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Field/function names: snake case, a leading `_` before digits, raw
/// identifiers for keywords (`type` becomes `ty`).
pub fn map_field_name(name: &str) -> String {
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("_{name}");
    }
    if name == "type" {
        return "ty".to_string();
    }
    if KEYWORDS.contains(&name) {
        return format!("r#{name}");
    }
    to_snake_case(name)
}

/// All-caps names are kept as they are.
pub fn map_variant_name(name: &str) -> String {
    if name.chars().any(char::is_alphabetic) && !name.chars().any(char::is_lowercase) {
        return name.to_string();
    }
    to_pascal_case(name)
}

fn unmappable(ty: &DyType) -> Error {
    Error::Emit { what: format!("`{}` as rust", ty.name()), reason: "no rust type for it".into() }
}

/// Rust spelling of a field type.
pub fn map_type(ty: &DyType) -> Result<String> {
    if ty.get_bool(&traits::NULLABLE) {
        let mut inner = ty.copy();
        inner.remove_field(&traits::NULLABLE)?;
        return Ok(format!("Option<{}>", map_type(&inner)?));
    }
    let generic = |n: usize| -> Result<String> {
        match ty.generics().nth(n) {
            Some(g) => map_type(g),
            None => Ok("serde_json::Value".to_string()),
        }
    };
    let mapped = if ty.get_bool(&traits::NULL) {
        "String".to_string()
    } else if ty.exist_field(&traits::TS_UNIT) {
        "i64".to_string()
    } else if ty.get_bool(&traits::STRUCT) {
        ty.get_str(&traits::TYPE_REF).map(str::to_string).unwrap_or_else(|| to_pascal_case(ty.name()))
    } else if ty.get_bool(&traits::ENUM) {
        map_variant_name(ty.get_str(&traits::TYPE_REF).unwrap_or_else(|| ty.name()))
    } else if ty.get_bool(&traits::TUPLE) {
        let elements = ty.generics().map(map_type).collect::<Result<Vec<_>>>()?;
        format!("({})", elements.join(", "))
    } else if ty.get_bool(&traits::VECTOR) {
        format!("Vec<{}>", generic(0)?)
    } else if ty.get_bool(&traits::BOOL) {
        "bool".to_string()
    } else if ty.get_bool(&traits::ALL_VALUE) {
        "serde_json::Value".to_string()
    } else if ty.get_bool(&traits::INTEGER) {
        let bits = ty.get_int(&traits::BIT_SIZE).ok_or_else(|| unmappable(ty))?;
        let sign = if ty.get_bool(&traits::SIGNED) { 'i' } else { 'u' };
        format!("{sign}{bits}")
    } else if ty.get_bool(&traits::FLOATING) {
        let bits = ty.get_int(&traits::BIT_SIZE).ok_or_else(|| unmappable(ty))?;
        format!("f{bits}")
    } else if ty.get_bool(&traits::MAP) {
        format!("HashMap<{}, {}>", generic(0)?, generic(1)?)
    } else if ty.get_bool(&traits::STRING) {
        match (ty.get_bool(&traits::REFERENCE), ty.get_str(&traits::LIFETIME)) {
            (true, Some(lifetime)) => format!("&'{lifetime} str"),
            (true, None) => "&str".to_string(),
            (false, _) => "String".to_string(),
        }
    } else if ty.get_bool(&traits::UNIT) {
        "()".to_string()
    } else if let Some(reference) = ty.get_str(&traits::TYPE_REF) {
        reference.to_string()
    } else {
        return Err(unmappable(ty));
    };
    Ok(mapped)
}

/// RFC 3339 rendering of an epoch value in `unit`.
pub fn sample_date(unit: &str, raw: i64) -> Option<String> {
    let at = match unit {
        "sec" | "s" => DateTime::<Utc>::from_timestamp(raw, 0),
        "ms" => DateTime::<Utc>::from_timestamp_millis(raw),
        "us" => DateTime::<Utc>::from_timestamp_micros(raw),
        "ns" => Some(DateTime::<Utc>::from_timestamp_nanos(raw)),
        _ => None,
    }?;
    Some(at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// `r#"…"#` with enough hashes for `text`.
fn raw_string(text: &str) -> String {
    let mut hashes = String::from("#");
    while text.contains(&format!("\"{hashes}")) {
        hashes.push('#');
    }
    format!("r{hashes}\"{text}\"{hashes}")
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

fn emit_field(field: &DyType, w: &mut CodeWriter) -> Result<()> {
    let original = field.field_name().unwrap_or_else(|| field.name());
    let ty = field.field_type().unwrap_or(field);
    let name = map_field_name(original);

    for comment in field.get_strs(&traits::BEFORE_LINE_COMMENT).chain(ty.get_strs(&traits::BEFORE_LINE_COMMENT)) {
        for line in comment.lines() {
            w.line(format!("/// {line}"));
        }
    }
    if let Some(unit) = ty.get_str(&traits::TS_UNIT) {
        let sample = ty
            .get_field(&traits::RAW_VALUE)
            .and_then(|v| v.as_json())
            .and_then(serde_json::Value::as_i64)
            .and_then(|raw| sample_date(unit, raw));
        match sample {
            Some(date) => w.line(format!("/// timestamp in {unit}, e.g. {date}")),
            None => w.line(format!("/// timestamp in {unit}")),
        }
    }
    if ty.get_bool(&traits::STRING_WRAPPED) {
        w.line("#[serde_as(as = \"DisplayFromStr\")]");
    }
    if name != original {
        w.line(format!("#[serde(rename = \"{original}\")]"));
    }
    w.line(format!("pub {name}: {},", map_type(ty)?));
    Ok(())
}

fn emit_struct(ty: &DyType, w: &mut CodeWriter) -> Result<()> {
    let fields: Vec<&DyType> = ty.struct_fields().collect();
    let wrapped = fields
        .iter()
        .any(|f| f.field_type().unwrap_or(*f).get_bool(&traits::STRING_WRAPPED));
    if wrapped {
        w.line("#[serde_as]");
    }
    let derive: Vec<&str> = DEFAULT_DERIVE.iter().copied().chain(ty.get_strs(&traits::DERIVE)).collect();
    w.line(format!("#[derive({})]", derive.join(", ")));
    w.block(format!("pub struct {}", to_pascal_case(ty.name())), "", |w| {
        fields.iter().try_for_each(|f| emit_field(f, w))
    })
}

fn emit_enum(ty: &DyType, w: &mut CodeWriter) -> Result<()> {
    w.line(format!("#[derive({})]", ENUM_DERIVE.join(", ")));
    w.block(format!("pub enum {}", to_pascal_case(ty.name())), "", |w| {
        for variant in ty.variants() {
            let names: Vec<&str> = variant.get_strs(&traits::VARIANT_NAMES).collect();
            let primary = names.first().copied().unwrap_or_else(|| variant.name());
            let mapped = map_variant_name(primary);
            if names.len() > 1 || mapped != primary {
                let serialize: Vec<String> =
                    names.iter().rev().map(|n| format!("serialize = \"{n}\"")).collect();
                w.line(format!("#[strum({})]", serialize.join(", ")));
            }
            if mapped != primary {
                w.line(format!("#[serde(rename = \"{primary}\")]"));
            }
            w.line(format!("{mapped},"));
        }
        Ok(())
    })
}

fn not_declarable(ty: &DyType, _: &mut CodeWriter) -> Result<()> {
    Err(Error::Emit {
        what: ty.name().to_string(),
        reason: format!("must be a struct or enum, found kind `{}`", ty.kind()),
    })
}

/// The struct itself and every struct reachable through its fields, once
/// each. References to structs defined elsewhere are skipped.
pub fn collect_structs(ty: &DyType) -> Vec<&DyType> {
    fn inner<'a>(ty: &'a DyType, out: &mut Vec<&'a DyType>) {
        if ty.get_bool(&traits::STRUCT) && !ty.exist_field(&traits::TYPE_REF) {
            if !out.contains(&ty) {
                out.push(ty);
            }
            for field in ty.struct_fields() {
                inner(field.field_type().unwrap_or(field), out);
            }
        }
        for generic in ty.generics() {
            inner(generic, out);
        }
    }
    let mut out = Vec::new();
    inner(ty, &mut out);
    out
}

/// Every declaration `ty` needs, in discovery order.
pub fn emit_declarations(ty: &DyType, w: &mut CodeWriter) -> Result<()> {
    let roots = if ty.get_bool(&traits::STRUCT) { collect_structs(ty) } else { vec![ty] };
    for (i, decl) in roots.into_iter().enumerate() {
        if i > 0 {
            w.line("");
        }
        let declare = DECLARATIONS.resolve(decl)?;
        declare(decl, w)?;
    }
    Ok(())
}

/// `get_raw_data` for the model root, plus `get_sql_ddl` when the struct
/// has a column layout.
fn emit_root_impl(ty: &DyType, raw: &str, w: &mut CodeWriter) -> Result<()> {
    let ddl = match sql::emit_columns(ty) {
        Ok(ddl) => Some(ddl),
        Err(err) => {
            tracing::warn!(model = ty.name(), %err, "no sql layout, skipping get_sql_ddl");
            None
        }
    };
    if raw.is_empty() && ddl.is_none() {
        return Ok(());
    }
    w.line("");
    w.block(format!("impl {}", to_pascal_case(ty.name())), "", |w| {
        if !raw.is_empty() {
            w.block::<Error>("pub fn get_raw_data() -> &'static str", "", |w| {
                w.line(raw_string(raw));
                Ok(())
            })?;
        }
        if let Some(ddl) = ddl {
            w.block::<Error>("pub fn get_sql_ddl() -> &'static str", "", |w| {
                w.line(raw_string(&ddl));
                Ok(())
            })?;
        }
        Ok(())
    })
}

impl Emitter for RustDataEmitter {
    fn name(&self) -> &'static str { "rust_data" }

    fn targets(&self) -> &'static [&'static str] { &["rust_data", "rust"] }

    fn emit_type(&self, _target: &str, ty: &DyType) -> Result<String> {
        let mut w = CodeWriter::new();
        emit_declarations(ty, &mut w)?;
        Ok(w.into_string())
    }

    fn emit_model(&self, _target: &str, model: &ModelDefinition, registries: &Registries) -> Result<String> {
        let Parsed::Type(ty) = model.get_parsed(registries)? else {
            return Err(Error::Emit {
                what: model.name.clone(),
                reason: "program nodes have no data model".into(),
            });
        };
        let mut w = CodeWriter::new();
        for (key, value) in [("type", &model.kind), ("url", &model.url), ("ref", &model.reference), ("note", &model.note)] {
            if !value.is_empty() && value != "untyped" {
                w.line(format!("/// {key}: {value}"));
            }
        }
        emit_declarations(&ty, &mut w)?;
        if ty.get_bool(&traits::STRUCT) {
            emit_root_impl(&ty, &model.raw, &mut w)?;
        }
        Ok(w.into_string())
    }
}
