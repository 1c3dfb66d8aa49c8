//! Home Assistant discovery documents.
//!
//! Fixed entities cover the unit itself (sensors, boost duration, cancel
//! button). Each boost mode adds a start button keyed by the slug of its
//! name and its id, so a rename moves the entity and the old document must
//! be cleared.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use luftuj_app::ports::DiscoveryRequest;
use luftuj_domain::device::DeviceDefinition;
use luftuj_domain::id::ModeId;
use luftuj_domain::slug::slugify;
use luftuj_domain::timeline::{BOOST_DURATION_RANGE, Mode};

use crate::topics::Topics;

/// One retained discovery message.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryDocument {
    pub topic: String,
    pub payload: Value,
}

fn device_block(topics: &Topics, definition: &DeviceDefinition) -> Value {
    json!({
        "identifiers": [topics.node_id()],
        "name": definition.name,
        "manufacturer": definition.manufacturer,
        "model": definition.code,
    })
}

/// Entities every unit publishes, as `(component, entity)`.
const FIXED_ENTITIES: [(&str, &str); 6] = [
    ("sensor", "power"),
    ("sensor", "temperature"),
    ("sensor", "mode"),
    ("sensor", "boost_remaining"),
    ("number", "boost_duration"),
    ("button", "boost_cancel"),
];

/// Two modes may share a slug ("Party!" and "party"); the id keeps their
/// buttons apart.
fn boost_entity(mode: &Mode) -> String {
    format!("boost_{}_{}", slugify(&mode.name), mode.id)
}

/// Discovery topics of the fixed entities.
#[must_use]
pub fn fixed_topics(topics: &Topics) -> Vec<String> {
    FIXED_ENTITIES
        .iter()
        .map(|(component, entity)| topics.discovery(component, entity))
        .collect()
}

fn sensor(
    topics: &Topics,
    device: &Value,
    entity: &str,
    name: &str,
    field: &str,
    extra: &Value,
) -> DiscoveryDocument {
    let mut payload = json!({
        "name": name,
        "unique_id": format!("{}_{entity}", topics.node_id()),
        "state_topic": topics.state(),
        "value_template": format!("{{{{ value_json.{field} }}}}"),
        "availability_topic": topics.status(),
        "device": device,
    });
    merge(&mut payload, extra);
    DiscoveryDocument {
        topic: topics.discovery("sensor", entity),
        payload,
    }
}

fn merge(target: &mut Value, extra: &Value) {
    if let (Some(target), Some(extra)) = (target.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Build every document for `request`.
#[must_use]
pub fn documents(topics: &Topics, request: &DiscoveryRequest) -> Vec<DiscoveryDocument> {
    let device = device_block(topics, request.definition);
    let node_id = topics.node_id();
    let mut documents = vec![
        sensor(
            topics,
            &device,
            "power",
            "Power",
            "power",
            &json!({ "unit_of_measurement": "%", "state_class": "measurement" }),
        ),
        sensor(
            topics,
            &device,
            "temperature",
            "Temperature",
            "temperature",
            &json!({
                "unit_of_measurement": "°C",
                "device_class": "temperature",
                "state_class": "measurement",
            }),
        ),
        sensor(topics, &device, "mode", "Mode", "mode_formatted", &json!({})),
        sensor(
            topics,
            &device,
            "boost_remaining",
            "Boost remaining",
            "boost_remaining",
            &json!({ "unit_of_measurement": "min" }),
        ),
        DiscoveryDocument {
            topic: topics.discovery("number", "boost_duration"),
            payload: json!({
                "name": "Boost duration",
                "unique_id": format!("{node_id}_boost_duration"),
                "state_topic": topics.boost_duration(),
                "command_topic": topics.boost_duration_set(),
                "min": BOOST_DURATION_RANGE.start(),
                "max": BOOST_DURATION_RANGE.end(),
                "step": 1,
                "unit_of_measurement": "min",
                "availability_topic": topics.status(),
                "device": device,
            }),
        },
        DiscoveryDocument {
            topic: topics.discovery("button", "boost_cancel"),
            payload: json!({
                "name": "Cancel boost",
                "unique_id": format!("{node_id}_boost_cancel"),
                "command_topic": topics.boost_cancel(),
                "availability_topic": topics.status(),
                "device": device,
            }),
        },
    ];

    documents.extend(request.boost_modes.iter().map(|mode| {
        let entity = boost_entity(mode);
        DiscoveryDocument {
            topic: topics.discovery("button", &entity),
            payload: json!({
                "name": format!("Boost {}", mode.name),
                "unique_id": format!("{node_id}_{entity}"),
                "command_topic": topics.boost_start(mode.id),
                "availability_topic": topics.status(),
                "device": device,
            }),
        }
    }));
    documents
}

/// Boost buttons published last time, by mode id.
#[derive(Debug, Default)]
pub struct DiscoveryTracker {
    published: BTreeMap<ModeId, String>,
}

/// What a discovery round will change, computed before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPlan {
    /// Discovery topics of buttons that no longer exist under the same entity.
    pub stale: Vec<String>,
    current: BTreeMap<ModeId, String>,
}

impl DiscoveryTracker {
    /// Compare `modes` with what was last committed. The tracker is left
    /// untouched until [`DiscoveryTracker::commit`].
    #[must_use]
    pub fn plan(&self, topics: &Topics, modes: &[Mode]) -> DiscoveryPlan {
        let current: BTreeMap<ModeId, String> = modes
            .iter()
            .map(|mode| (mode.id, boost_entity(mode)))
            .collect();
        let stale = self
            .published
            .iter()
            .filter(|(id, entity)| current.get(*id) != Some(*entity))
            .map(|(_, entity)| topics.discovery("button", entity))
            .collect();
        DiscoveryPlan { stale, current }
    }

    /// Record a plan whose messages were all accepted.
    pub fn commit(&mut self, plan: DiscoveryPlan) {
        self.published = plan.current;
    }

    /// Discovery topics of every tracked button.
    #[must_use]
    pub fn published_topics(&self, topics: &Topics) -> Vec<String> {
        self.published
            .values()
            .map(|entity| topics.discovery("button", entity))
            .collect()
    }

    pub fn clear(&mut self) {
        self.published.clear();
    }
}
