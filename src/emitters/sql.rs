//! Postgres DDL: columns and tables for structs, enum types for enums.
use super::Emitter;
use crate::definition::{ModelDefinition, Registries};
use crate::error::{Error, Result};
use crate::model::{FieldDescriptor, MixedModel};
use crate::parsers::Parsed;
use crate::types::example::to_snake_case;
use crate::types::{traits, DyType};

pub struct SqlEmitter;

fn unsupported(ty: &DyType, reason: &str) -> Error {
    Error::Emit { what: format!("`{}` as sql", ty.name()), reason: reason.to_string() }
}

fn real(ty: &DyType) -> Result<&'static str> {
    match ty.get_int(&traits::BIT_SIZE) {
        Some(32) => Ok("float"),
        Some(64) => Ok("double precision"),
        _ => Err(unsupported(ty, "floats must be 32 or 64 bits")),
    }
}

fn integer(ty: &DyType) -> Result<&'static str> {
    match ty.get_int(&traits::BIT_SIZE) {
        Some(bits) if bits < 32 => Ok("smallint"),
        Some(32) => Ok("int"),
        Some(_) => Ok("bigint"),
        None => Err(unsupported(ty, "integer without a bit size")),
    }
}

pub fn column_type(ty: &DyType) -> Result<&'static str> {
    if ty.get_bool(&traits::FLOATING) {
        return real(ty);
    }
    if ty.exist_field(&traits::TS_UNIT) {
        return Ok("timestamp without time zone");
    }
    if ty.get_bool(&traits::INTEGER) {
        return integer(ty);
    }
    if ty.get_bool(&traits::STRING) || ty.get_bool(&traits::NULL) {
        return Ok("text");
    }
    if ty.get_bool(&traits::BOOL) {
        return Ok("bool");
    }
    if ty.get_bool(&traits::ENUM) {
        return Ok(if ty.get_bool(&traits::SIMPLE_ENUM) { "text" } else { "jsonb" });
    }
    if [&traits::STRUCT, &traits::VECTOR, &traits::TUPLE, &traits::MAP]
        .iter()
        .any(|t| ty.get_bool(t))
    {
        return Ok("jsonb");
    }
    Err(unsupported(ty, "no column type"))
}

fn column(field: &DyType) -> Result<String> {
    let name = field.field_name().unwrap_or_else(|| field.name());
    let ty = field.field_type().unwrap_or(field);
    let flag = |t: &FieldDescriptor| field.get_bool(t) || ty.get_bool(t);

    let mut column = format!("{} {}", to_snake_case(name), column_type(ty)?);
    if flag(&traits::PRIMARY) {
        column.push_str(" primary key");
    }
    if !flag(&traits::NULLABLE) {
        column.push_str(" not null");
    }
    Ok(column)
}

fn columns(ty: &DyType) -> Result<Vec<String>> {
    if !ty.get_bool(&traits::STRUCT) {
        return Err(unsupported(ty, "only structs map to tables"));
    }
    ty.struct_fields().map(column).collect()
}

/// One column definition per field, comma-separated, one per line.
pub fn emit_columns(ty: &DyType) -> Result<String> {
    Ok(columns(ty)?.join(",\n"))
}

pub fn emit_create_table(ty: &DyType) -> Result<String> {
    let columns = columns(ty)?
        .iter()
        .map(|c| format!("    {c}"))
        .collect::<Vec<_>>()
        .join(",\n");
    Ok(format!("CREATE TABLE IF NOT EXISTS {} (\n{columns}\n);\n", to_snake_case(ty.name())))
}

/// Postgres enum type from the primary variant names.
pub fn emit_create_type(ty: &DyType) -> Result<String> {
    if !ty.get_bool(&traits::ENUM) {
        return Err(unsupported(ty, "only enums map to enum types"));
    }
    let labels: Vec<String> = ty.variants().map(|v| format!("'{}'", v.name().replace('\'', "''"))).collect();
    Ok(format!("CREATE TYPE {} AS ENUM ({});\n", to_snake_case(ty.name()), labels.join(", ")))
}

impl Emitter for SqlEmitter {
    fn name(&self) -> &'static str { "sql" }

    fn targets(&self) -> &'static [&'static str] { &["sql"] }

    fn emit_type(&self, _target: &str, ty: &DyType) -> Result<String> {
        emit_columns(ty)
    }

    fn emit_model(&self, _target: &str, model: &ModelDefinition, registries: &Registries) -> Result<String> {
        match model.get_parsed(registries)? {
            Parsed::Type(ty) if ty.get_bool(&traits::ENUM) => emit_create_type(&ty),
            Parsed::Type(ty) => emit_create_table(&ty),
            Parsed::Node(_) => Err(Error::Emit {
                what: model.name.clone(),
                reason: "program nodes have no table layout".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{build_int, Types};

    fn trade() -> DyType {
        let id = Types::u64().copy().with(traits::PRIMARY.present());
        let note = Types::string().copy().with(traits::NULLABLE.present());
        let ts = Types::i64().copy().with(traits::TS_UNIT.value("ms"));
        Types::structure(
            "Trade",
            vec![
                DyType::field("id", id),
                DyType::field("price", Types::f64().clone()),
                DyType::field("qty", Types::f32().clone()),
                DyType::field("count", Types::i32().clone()),
                DyType::field("tiny", build_int("i8").unwrap()),
                DyType::field("note", note),
                DyType::field("filledAt", ts),
                DyType::field("legs", Types::vector(Types::i64().clone())),
                DyType::field("ok", Types::bool().clone()),
            ],
        )
    }

    #[test]
    fn columns_follow_field_types() {
        let ddl = emit_columns(&trade()).unwrap();
        let lines: Vec<_> = ddl.lines().collect();
        assert_eq!(lines[0], "id bigint primary key not null,");
        assert_eq!(lines[1], "price double precision not null,");
        assert_eq!(lines[2], "qty float not null,");
        assert_eq!(lines[3], "count int not null,");
        assert_eq!(lines[4], "tiny smallint not null,");
        assert_eq!(lines[5], "note text,");
        assert_eq!(lines[6], "filled_at timestamp without time zone not null,");
        assert_eq!(lines[7], "legs jsonb not null,");
        assert_eq!(lines[8], "ok bool not null");
    }

    #[test]
    fn create_table_wraps_columns() {
        let ty = Types::structure("OrderFill", vec![DyType::field("id", Types::i64().clone())]);
        assert_eq!(
            emit_create_table(&ty).unwrap(),
            "CREATE TABLE IF NOT EXISTS order_fill (\n    id bigint not null\n);\n"
        );
    }

    #[test]
    fn enums_become_enum_types() {
        let ty = Types::enumeration(
            "OrderSide",
            vec![Types::variant(vec!["buy".into(), "BUY".into()]), Types::variant(vec!["sell".into()])],
        );
        assert_eq!(emit_create_type(&ty).unwrap(), "CREATE TYPE order_side AS ENUM ('buy', 'sell');\n");
        assert!(emit_create_type(Types::i64()).is_err());
    }

    #[test]
    fn non_structs_and_unknown_shapes_fail() {
        assert!(matches!(emit_columns(Types::i64()), Err(Error::Emit { .. })));
        let odd = Types::structure("Odd", vec![DyType::field("x", Types::all_value().clone())]);
        assert!(emit_columns(&odd).is_err());
    }
}
