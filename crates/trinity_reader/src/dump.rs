//! JSON dumps of constructed graphs
//!
//! Every object is written once as `{"$id": n, "type": ..., fields...}` with
//! `n` counting objects in visit order; later visits of the same instance
//! write `{"$ref": n}`. Lists are numbered separately and revisits write
//! `{"$list": n}`. Two graphs with the same shape and sharing dump to
//! the same JSON, which makes dumps handy for comparing reads.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Number};

use crate::value::Value;

/// Dump `value` and everything reachable from it
pub fn to_json(value: &Value) -> serde_json::Value {
    Dumper::default().value(value)
}

#[derive(Default)]
struct Dumper {
    objects: HashMap<usize, usize>,
    lists: HashMap<usize, usize>,
}

impl Dumper {
    fn value(&mut self, value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => float(*f),
            Value::Str(s) => json!(s),
            Value::Floats(v) => serde_json::Value::Array(v.iter().map(|f| float(*f as f64)).collect()),
            Value::Json(v) => v.clone(),
            Value::Object(object) => {
                let address = Arc::as_ptr(object) as *const () as usize;
                if let Some(id) = self.objects.get(&address) {
                    return json!({ "$ref": id });
                }
                let id = self.objects.len();
                self.objects.insert(address, id);

                // Collect first so the lock is released before recursing
                let (type_name, fields) = {
                    let guard = object.read();
                    let fields: Vec<(String, Value)> = guard
                        .field_names()
                        .into_iter()
                        .filter_map(|name| guard.get_field(&name).map(|v| (name, v)))
                        .collect();
                    (guard.type_name().to_string(), fields)
                };

                let mut map = Map::new();
                map.insert("$id".into(), json!(id));
                map.insert("type".into(), json!(type_name));
                for (name, field) in fields {
                    let dumped = self.value(&field);
                    map.insert(name, dumped);
                }
                serde_json::Value::Object(map)
            }
            Value::List(list) => {
                let address = Arc::as_ptr(list) as *const () as usize;
                if let Some(id) = self.lists.get(&address) {
                    return json!({ "$list": id });
                }
                let id = self.lists.len();
                self.lists.insert(address, id);

                let items = list.read().clone();
                serde_json::Value::Array(items.iter().map(|item| self.value(item)).collect())
            }
        }
    }
}

fn float(f: f64) -> serde_json::Value {
    Number::from_f64(f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
}
