//! Stable identity handles.
//!
//! Stages and executions reference each other (a stage points back at its
//! owning execution, which owns the stage list). Rather than modeling that
//! cycle with `Rc`/`Weak`, every cross reference in this crate goes through
//! a newtype id resolved against the execution loaded from the
//! `ExecutionStore`.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(ExecutionId);
uuid_id!(StageId);
