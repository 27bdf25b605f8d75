//! Canonical JSON mínimo: claves de objetos ordenadas, sin espacios.
//!
//! Dos payloads con el mismo contenido y distinto orden de claves producen la
//! misma representación y por tanto el mismo hash de artifact.

use serde_json::Value;
use std::collections::BTreeMap;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let tree: BTreeMap<&String, String> = map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = tree.into_iter()
                                         .map(|(k, v)| format!("{}:{}", quote(k), v))
                                         .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

// Serializar un `&str` a JSON no puede fallar; `Value::String` evita el unwrap.
fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
