//! System image container
//!
//! Host-side form of what the build tool patches into the monitor: the
//! expected untyped layout, both invocation streams and the component
//! table. Stored with `bincode` so simulations and tests can load exactly
//! what the tool produced.

use crate::component::{ComponentSpec, ComponentTable};
use crate::error::ImageError;
use crate::MAX_COMPONENTS;
use kaal_bootstrap::{BootstrapStream, InvocationStream, StreamBuf, SystemStreamSource, UntypedInfo};
use serde::{Deserialize, Serialize};
use std::string::String;
use std::vec::Vec;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemImage {
    pub untyped: UntypedInfo,
    pub bootstrap: StreamBuf,
    pub system: StreamBuf,
    pub components: Vec<ComponentSpec>,
    pub vms: Vec<String>,
}

impl SystemImage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ImageError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Component table with ids in listing order
    pub fn component_table(&self) -> Result<ComponentTable, ImageError> {
        if self.components.len() > MAX_COMPONENTS {
            return Err(ImageError::TooManyComponents {
                count: self.components.len(),
                max: MAX_COMPONENTS,
            });
        }
        let mut table = ComponentTable::from_specs(&self.components)?;
        for (id, name) in self.vms.iter().enumerate() {
            table.insert_vm(id, name)?;
        }
        Ok(table)
    }

    /// Bootstrap stream in its fixed-capacity form
    pub fn bootstrap_stream(&self) -> Result<BootstrapStream, ImageError> {
        Ok(self.bootstrap.to_bootstrap()?)
    }
}

impl SystemStreamSource for SystemImage {
    fn system_stream(&mut self) -> Option<InvocationStream<'_>> {
        Some(self.system.stream())
    }
}
