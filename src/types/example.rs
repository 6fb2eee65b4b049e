//! Classify a sample JSON value into a [`DyType`].
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value as JsonValue;

use super::{traits, DyType, Types};
use crate::error::TypeError;
use crate::model::MixedModel;

static STRUCT_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Seconds per unit for `sec`/`s`, `ms`, `us` and `ns`.
pub fn to_second_scale(unit: &str) -> Result<f64, TypeError> {
    match unit {
        "sec" | "s" => Ok(1.0),
        "ms" => Ok(1e-3),
        "us" => Ok(1e-6),
        "ns" => Ok(1e-9),
        other => Err(TypeError::InvalidArgument(format!("cannot convert {other} to seconds"))),
    }
}

/// Guess the unit of an epoch timestamp from its magnitude.
pub fn detect_timestamp_unit(x: f64) -> Result<&'static str, TypeError> {
    if x.abs() < 1.0 {
        return Ok("ms");
    }
    if (1e8..1.8e8).contains(&x) {
        return Err(TypeError::AmbiguousTimestamp(x));
    }
    let unit = if x >= 1e16 || x <= -1e16 {
        "ns"
    } else if x >= 1e14 || x <= -1e14 {
        "us"
    } else if x >= 1e11 || x <= -3e10 {
        "ms"
    } else {
        "sec"
    };
    Ok(unit)
}

pub fn prefix_join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}_{name}")
    }
}

/// `OrderId`, `orderId`, `order-id` and `order id` all become `order_id`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '-' || ch == ' ' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

fn is_time_like(prefix: &str) -> bool {
    let prefix = to_snake_case(prefix);
    prefix.contains("_ts") || prefix.contains("time") || prefix.contains("_at")
}

fn infer_string(text: &str) -> DyType {
    if text.contains('.') && text.parse::<f64>().is_ok() {
        return Types::f64().string_wrapped();
    }
    if text.parse::<i64>().is_ok() {
        return Types::i64().string_wrapped();
    }
    Types::string().clone()
}

fn infer_number(n: &serde_json::Number, prefix: &str) -> Result<DyType, TypeError> {
    if let Some(i) = n.as_i64() {
        if !is_time_like(prefix) {
            return Ok(Types::i64().clone());
        }
        let unit = detect_timestamp_unit(i as f64)?;
        let mut ty = Types::i64().copy();
        ty.append_field(traits::TS_UNIT.value(unit))?;
        ty.replace_field(traits::TYPE_NAME.value("timestamp"))?;
        // emitters render a sample date from it
        ty.append_field(traits::RAW_VALUE.value(JsonValue::from(i)))?;
        return Ok(ty);
    }
    if n.as_u64().is_some() {
        return Ok(Types::u64().clone());
    }
    if n.as_f64().is_some() {
        return Ok(Types::f64().clone());
    }
    Err(TypeError::CouldNotInfer(n.to_string()))
}

fn infer_inner(value: &JsonValue, prefix: &str) -> Result<DyType, TypeError> {
    match value {
        JsonValue::Null => Ok(Types::none().clone()),
        JsonValue::Bool(_) => Ok(Types::bool().clone()),
        JsonValue::String(s) => Ok(infer_string(s)),
        JsonValue::Number(n) => infer_number(n, prefix),
        JsonValue::Array(xs) => {
            let element = match xs.first() {
                Some(first) => infer_inner(first, prefix)?,
                None => Types::all_value().clone(),
            };
            Ok(Types::vector(element))
        }
        JsonValue::Object(map) => {
            let mut fields = Vec::with_capacity(map.len());
            for (key, value) in map {
                let name = prefix_join(prefix, key);
                let mut ty = infer_inner(value, &name)?;
                if ty.get_bool(&traits::STRUCT) {
                    ty.replace_field(traits::TYPE_NAME.value(name.as_str()))?;
                }
                if ty.get_bool(&traits::VECTOR) {
                    rename_struct_elements(&mut ty, &name)?;
                }
                fields.push(DyType::field(key, ty));
            }
            let id = STRUCT_COUNTER.fetch_add(1, Ordering::Relaxed);
            Ok(Types::structure(&format!("struct_{id}"), fields))
        }
    }
}

/// `orders: [{…}]` names its element struct `order`.
fn rename_struct_elements(vector: &mut DyType, name: &str) -> Result<(), TypeError> {
    let singular = name.strip_suffix('s').unwrap_or(name);
    let generics: Vec<DyType> = vector
        .generics()
        .map(|g| {
            if g.get_bool(&traits::STRUCT) {
                g.copy().with(traits::TYPE_NAME.value(singular))
            } else {
                g.clone()
            }
        })
        .collect();
    vector.replace_field(traits::GENERICS.value(generics))?;
    Ok(())
}

/// Infer a type for `value`, whose field path so far is `prefix`.
///
/// The result is always a fresh unfrozen copy marked `from_json` and carrying
/// the sample as `raw_value`.
pub fn infer_type_from_example(value: &JsonValue, prefix: &str) -> Result<DyType, TypeError> {
    let mut ty = infer_inner(value, prefix)?.copy();
    ty.append_field(traits::FROM_JSON.present())?;
    ty.replace_field(traits::RAW_VALUE.value(value.clone()))?;
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn field<'a>(ty: &'a DyType, name: &str) -> &'a DyType {
        ty.struct_fields()
            .find(|f| f.field_name() == Some(name))
            .and_then(DyType::field_type)
            .unwrap()
    }

    #[test]
    fn second_scale() {
        assert_eq!(to_second_scale("s").unwrap(), 1.0);
        assert_eq!(to_second_scale("sec").unwrap(), 1.0);
        assert_eq!(to_second_scale("ns").unwrap(), 1e-9);
        assert!(matches!(to_second_scale("min"), Err(TypeError::InvalidArgument(_))));
    }

    #[test]
    fn timestamp_unit_thresholds() {
        assert_eq!(detect_timestamp_unit(0.5).unwrap(), "ms");
        assert_eq!(detect_timestamp_unit(1_620_000_000.0).unwrap(), "sec");
        assert_eq!(detect_timestamp_unit(1.62e12).unwrap(), "ms");
        assert_eq!(detect_timestamp_unit(1.62e15).unwrap(), "us");
        assert_eq!(detect_timestamp_unit(1.62e18).unwrap(), "ns");
        assert_eq!(detect_timestamp_unit(-4e10).unwrap(), "ms");
        assert_eq!(detect_timestamp_unit(-2e10).unwrap(), "sec");
        assert!(matches!(
            detect_timestamp_unit(1.5e8),
            Err(TypeError::AmbiguousTimestamp(_))
        ));
        assert_eq!(detect_timestamp_unit(1.8e8).unwrap(), "sec");
    }

    #[test]
    fn snake_case() {
        assert_eq!(to_snake_case("filledAt"), "filled_at");
        assert_eq!(to_snake_case("OrderId"), "order_id");
        assert_eq!(to_snake_case("order-id"), "order_id");
        assert_eq!(to_snake_case("HTTP"), "http");
        assert_eq!(to_snake_case("created_time"), "created_time");
    }

    #[test]
    fn scalars() {
        let ty = infer_type_from_example(&json!("1.5"), "").unwrap();
        assert_eq!(ty.name(), "f64");
        assert!(ty.get_bool(&traits::STRING_WRAPPED));

        let ty = infer_type_from_example(&json!("abc"), "").unwrap();
        assert_eq!(ty.name(), "string");
        assert!(!ty.get_bool(&traits::STRING_WRAPPED));

        // a dot with no number around it stays text
        let ty = infer_type_from_example(&json!("a.b"), "").unwrap();
        assert_eq!(ty.name(), "string");

        assert_eq!(infer_type_from_example(&json!(true), "").unwrap().name(), "bool");
        assert_eq!(infer_type_from_example(&json!(2.5), "").unwrap().name(), "f64");
        assert_eq!(infer_type_from_example(&json!(u64::MAX), "").unwrap().name(), "u64");
        assert_eq!(infer_type_from_example(&json!(null), "").unwrap().name(), "none");
    }

    #[test]
    fn result_is_unfrozen_and_carries_raw_value() {
        let ty = infer_type_from_example(&json!(7), "count").unwrap();
        assert!(!ty.is_frozen());
        assert!(ty.get_bool(&traits::FROM_JSON));
        assert_eq!(ty.get_field(&traits::RAW_VALUE), Some(&json!(7).into()));
        assert!(!Types::i64().exist_field(&traits::FROM_JSON));
    }

    #[test]
    fn empty_list_is_vector_of_anything() {
        let ty = infer_type_from_example(&json!([]), "").unwrap();
        assert!(ty.get_bool(&traits::VECTOR));
        assert_eq!(ty.generics().next(), Some(Types::all_value()));
    }

    #[test]
    fn order_fill_example() {
        let ty = infer_type_from_example(
            &json!({"order_id": "123", "filled_at": 1620000000000i64}),
            "",
        )
        .unwrap();
        assert!(ty.get_bool(&traits::STRUCT));
        assert!(ty.name().starts_with("struct_"));

        let order_id = field(&ty, "order_id");
        assert_eq!(order_id.name(), "i64");
        assert!(order_id.get_bool(&traits::STRING_WRAPPED));

        let filled_at = field(&ty, "filled_at");
        assert!(filled_at.get_bool(&traits::INTEGER));
        assert_eq!(filled_at.name(), "timestamp");
        assert_eq!(filled_at.get_str(&traits::TS_UNIT), Some("ms"));
    }

    #[test]
    fn nested_structs_are_named_after_their_path() {
        let ty = infer_type_from_example(
            &json!({"fill": {"price": 1.0}, "orders": [{"id": 1}]}),
            "",
        )
        .unwrap();
        assert_eq!(field(&ty, "fill").name(), "fill");
        let orders = field(&ty, "orders");
        assert_eq!(orders.generics().next().unwrap().name(), "order");
    }

    /// Field names in order, descending into struct fields and vector elements.
    fn layout(ty: &DyType, path: &str, out: &mut Vec<String>) {
        for f in ty.struct_fields() {
            let name = format!("{path}.{}", f.field_name().unwrap());
            let mut inner = f.field_type().unwrap();
            while inner.get_bool(&traits::VECTOR) {
                inner = inner.generics().next().unwrap();
            }
            out.push(format!("{name}: {}", if inner.get_bool(&traits::STRUCT) { "struct" } else { inner.name() }));
            layout(inner, &name, out);
        }
    }

    #[test]
    fn repeated_inference_keeps_fields_and_order() {
        let sample = json!({
            "symbol": "BTC-USD",
            "fill": {"price": "1.5", "qty": 2, "venue": {"id": 7, "name": "x"}},
            "orders": [{"id": 1, "created_at": 1620000000000i64}],
            "done": true
        });
        let first = infer_type_from_example(&sample, "trade").unwrap();
        let second = infer_type_from_example(&sample, "trade").unwrap();

        let (mut a, mut b) = (Vec::new(), Vec::new());
        layout(&first, "", &mut a);
        layout(&second, "", &mut b);
        assert_eq!(a, b);
        assert!(a.contains(&".fill.venue.name: string".to_string()), "{a:?}");
        assert!(a.contains(&".orders.created_at: timestamp".to_string()), "{a:?}");
        assert_eq!(a.len(), 11);
        // only the anonymous root name moves with the counter
        assert_ne!(first.name(), second.name());
    }

    #[test]
    fn ambiguous_timestamp_fails_the_whole_example() {
        let err = infer_type_from_example(&json!({"ts_open": {"sent_ts": 150000000}}), "")
            .unwrap_err();
        assert!(matches!(err, TypeError::AmbiguousTimestamp(_)));
    }
}
