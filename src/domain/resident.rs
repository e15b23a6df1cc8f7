use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::{Displayable, Identifiable, NamedEntity};

/// A participant in one dues scheme. Each scheme keeps its own registry, so
/// the same person enrolled in two schemes carries two independent ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resident {
    pub id: Uuid,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_label: Option<String>,
}

impl Resident {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            unit_label: None,
        }
    }

    /// Attaches a house/unit label such as "RT03/12".
    pub fn with_unit_label(mut self, label: impl Into<String>) -> Self {
        self.unit_label = Some(label.into());
        self
    }
}

impl Identifiable for Resident {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Resident {
    fn name(&self) -> &str {
        &self.display_name
    }
}

impl Displayable for Resident {
    fn display_label(&self) -> String {
        match &self.unit_label {
            Some(unit) => format!("{} ({})", self.display_name, unit),
            None => self.display_name.clone(),
        }
    }
}
