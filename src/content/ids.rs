use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a resource in the content tables.
    ResourceId
);
string_id!(
    /// Identifier of a building type in the content tables.
    BuildingType
);
string_id!(TechId);
string_id!(AgeId);
string_id!(GreatPersonId);
string_id!(CityId);

impl ResourceId {
    pub const WORKER: &'static str = "Worker";
    pub const POWER: &'static str = "Power";
    pub const SCIENCE: &'static str = "Science";
    pub const WARP: &'static str = "Warp";

    pub fn worker() -> Self {
        Self::new(Self::WORKER)
    }

    pub fn power() -> Self {
        Self::new(Self::POWER)
    }

    pub fn science() -> Self {
        Self::new(Self::SCIENCE)
    }

    pub fn warp() -> Self {
        Self::new(Self::WARP)
    }

    pub fn is_worker(&self) -> bool {
        self.0 == Self::WORKER
    }

    pub fn is_science(&self) -> bool {
        self.0 == Self::SCIENCE
    }
}

impl TechId {
    /// Technology granting the storage bonus to high level buildings.
    pub const BANKING: &'static str = "Banking";
}
