use serde_json::map::Entry;
use serde_json::{Map, Value, json};

/// JSON-backed settings addressed by dotted paths (`"validation.fixOrphans"`).
#[derive(Debug, Clone, PartialEq)]
pub struct FlowConfig(Value);

impl Default for FlowConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl FlowConfig {
    /// Built-in settings for loaders and pipes.
    pub fn defaults() -> Self {
        Self(json!({
            "loader": {
                "layoutOptions": {
                    "root": { "org.eclipse.elk.hierarchyHandling": "INCLUDE_CHILDREN" },
                    "node": {
                        "org.eclipse.elk.nodeSize.constraints":
                            "NODE_LABELS PORTS PORT_LABELS MINIMUM_SIZE"
                    },
                    "port": {},
                    "label": { "org.eclipse.elk.nodeLabels.placement": "H_CENTER V_TOP INSIDE" },
                    "edge": {}
                }
            },
            "validation": {
                "fixNullId": true,
                "fixOrphans": true,
                "fixEdgeOwners": true
            },
            "textSizer": {
                "timeoutMs": 100,
                "maxSize": 100
            },
            "visibility": {
                "slackPortSize": 5
            }
        }))
    }

    pub fn get(&self, dotted_path: &str) -> Option<&Value> {
        dotted_path
            .split('.')
            .try_fold(&self.0, |cur, segment| cur.as_object()?.get(segment))
    }

    pub fn get_bool(&self, dotted_path: &str) -> Option<bool> {
        self.get(dotted_path)?.as_bool()
    }

    pub fn get_f64(&self, dotted_path: &str) -> Option<f64> {
        self.get(dotted_path)?.as_f64()
    }

    pub fn get_u64(&self, dotted_path: &str) -> Option<u64> {
        self.get(dotted_path)?.as_u64()
    }

    pub fn get_object(&self, dotted_path: &str) -> Option<&Map<String, Value>> {
        self.get(dotted_path)?.as_object()
    }

    /// Stores `value` at `dotted_path`, replacing any non-object found on the way.
    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        let segments: Vec<&str> = dotted_path.split('.').collect();
        insert_at(&mut self.0, &segments, value);
    }

    /// Overlays `overrides`: objects merge key by key, anything else replaces.
    pub fn deep_merge(&mut self, overrides: &Value) {
        overlay(&mut self.0, overrides);
    }
}

fn insert_at(slot: &mut Value, segments: &[&str], value: Value) {
    let [head, rest @ ..] = segments else {
        *slot = value;
        return;
    };
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        insert_at(child, rest, value);
    }
}

fn overlay(target: &mut Value, overrides: &Value) {
    match (target, overrides) {
        (Value::Object(map), Value::Object(entries)) => {
            for (key, value) in entries {
                match map.entry(key.clone()) {
                    Entry::Occupied(mut slot) => overlay(slot.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value.clone());
                    }
                }
            }
        }
        (target, value) => *target = value.clone(),
    }
}
