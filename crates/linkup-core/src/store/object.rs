use serde::Serialize;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObjectKind {
    Device,
    Channel,
    State,
}

/// Value type of a state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StateType {
    Boolean,
    Number,
    String,
    Mixed,
}

impl StateType {
    /// Infer the state type from a JSON leaf.
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(_) => Self::Boolean,
            serde_json::Value::Number(_) => Self::Number,
            serde_json::Value::String(_) => Self::String,
            _ => Self::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectCommon {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<StateType>,
    pub read: bool,
    pub write: bool,
}

impl ObjectCommon {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            value_type: None,
            read: true,
            write: false,
        }
    }
}

/// Definition of a node in the state tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSpec {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub common: ObjectCommon,
}

impl ObjectSpec {
    pub fn device(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Device,
            common: ObjectCommon::named(name),
        }
    }

    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Channel,
            common: ObjectCommon::named(name),
        }
    }

    /// Read-only state holding values of `value_type`.
    pub fn state(name: impl Into<String>, value_type: StateType) -> Self {
        Self {
            kind: ObjectKind::State,
            common: ObjectCommon {
                value_type: Some(value_type),
                ..ObjectCommon::named(name)
            },
        }
    }

    /// Writable boolean button, e.g. `<id>.remote.Refresh`.
    pub fn button(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::State,
            common: ObjectCommon {
                name: name.into(),
                role: Some("boolean".into()),
                value_type: Some(StateType::Boolean),
                read: true,
                write: true,
            },
        }
    }

    /// Merge `other` into `self`: kind and name always follow `other`,
    /// optional attributes only when `other` sets them.
    pub fn merge(&mut self, other: ObjectSpec) {
        self.kind = other.kind;
        self.common.name = other.common.name;
        self.common.read = other.common.read;
        self.common.write = other.common.write;
        if other.common.role.is_some() {
            self.common.role = other.common.role;
        }
        if other.common.value_type.is_some() {
            self.common.value_type = other.common.value_type;
        }
    }
}
