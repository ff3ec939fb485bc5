use serde::{Deserialize, Serialize};

/// Additive contribution to a building's effective input/output/worker/storage factors.
///
/// The factor applied to a quantity is `1 + Σ contribution`, so a zero contribution is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Multiplier {
    pub input: f64,
    pub output: f64,
    pub worker: f64,
    pub storage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierKind {
    Input,
    Output,
    Worker,
    Storage,
}

impl Multiplier {
    pub fn get(&self, kind: MultiplierKind) -> f64 {
        match kind {
            MultiplierKind::Input => self.input,
            MultiplierKind::Output => self.output,
            MultiplierKind::Worker => self.worker,
            MultiplierKind::Storage => self.storage,
        }
    }

    pub fn output(value: f64) -> Self {
        Self {
            output: value,
            ..Self::default()
        }
    }

    pub fn storage(value: f64) -> Self {
        Self {
            storage: value,
            ..Self::default()
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            input: self.input * factor,
            output: self.output * factor,
            worker: self.worker * factor,
            storage: self.storage * factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierWithSource {
    #[serde(flatten)]
    pub multiplier: Multiplier,
    pub source: String,
}

impl MultiplierWithSource {
    pub fn new(multiplier: Multiplier, source: impl Into<String>) -> Self {
        Self {
            multiplier,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueWithSource {
    pub value: f64,
    pub source: String,
}

/// City-wide effects that are not tied to one building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalMultiplierKind {
    SciencePerIdleWorker,
    SciencePerBusyWorker,
    BuilderCapacity,
    TransportCapacity,
    Happiness,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMultipliers {
    pub science_per_idle_worker: Vec<ValueWithSource>,
    pub science_per_busy_worker: Vec<ValueWithSource>,
    pub builder_capacity: Vec<ValueWithSource>,
    pub transport_capacity: Vec<ValueWithSource>,
    pub happiness: Vec<ValueWithSource>,
    pub storage: Vec<ValueWithSource>,
}

impl Default for GlobalMultipliers {
    fn default() -> Self {
        Self {
            science_per_idle_worker: Vec::new(),
            science_per_busy_worker: vec![ValueWithSource {
                value: 1.0,
                source: "Base Production".to_string(),
            }],
            builder_capacity: vec![ValueWithSource {
                value: 1.0,
                source: "Base Multiplier".to_string(),
            }],
            transport_capacity: Vec::new(),
            happiness: Vec::new(),
            storage: Vec::new(),
        }
    }
}

impl GlobalMultipliers {
    pub fn list(&self, kind: GlobalMultiplierKind) -> &[ValueWithSource] {
        match kind {
            GlobalMultiplierKind::SciencePerIdleWorker => &self.science_per_idle_worker,
            GlobalMultiplierKind::SciencePerBusyWorker => &self.science_per_busy_worker,
            GlobalMultiplierKind::BuilderCapacity => &self.builder_capacity,
            GlobalMultiplierKind::TransportCapacity => &self.transport_capacity,
            GlobalMultiplierKind::Happiness => &self.happiness,
            GlobalMultiplierKind::Storage => &self.storage,
        }
    }

    pub fn push(&mut self, kind: GlobalMultiplierKind, value: f64, source: impl Into<String>) {
        let entry = ValueWithSource {
            value,
            source: source.into(),
        };
        match kind {
            GlobalMultiplierKind::SciencePerIdleWorker => self.science_per_idle_worker.push(entry),
            GlobalMultiplierKind::SciencePerBusyWorker => self.science_per_busy_worker.push(entry),
            GlobalMultiplierKind::BuilderCapacity => self.builder_capacity.push(entry),
            GlobalMultiplierKind::TransportCapacity => self.transport_capacity.push(entry),
            GlobalMultiplierKind::Happiness => self.happiness.push(entry),
            GlobalMultiplierKind::Storage => self.storage.push(entry),
        }
    }

    /// Sum of all contributions of one kind, in insertion order.
    pub fn sum(&self, kind: GlobalMultiplierKind) -> f64 {
        self.list(kind).iter().map(|v| v.value).sum()
    }
}
