//! Mesh node collaborator.
//!
//! Describes the node to a mesh stack (provisioning properties and
//! composition) and drives the stack through its bring-up stages. The stack
//! itself sits behind [`MeshStack`]; this module only sequences, validates
//! and logs.

use core::fmt;

use heapless::Vec;

use crate::config::{MESH_COMPANY_ID, MESH_DEVICE_UUID};

/// Generic OnOff Server model identifier (SIG model).
pub const MODEL_GEN_ONOFF_SRV: u16 = 0x1000;

/// Models per element we describe.
pub const MAX_MODELS: usize = 4;

/// Elements per node we describe.
pub const MAX_ELEMENTS: usize = 2;

/// Provisioning properties advertised to a provisioner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProvisioningConfig {
    pub uuid: [u8; 16],
    /// Output OOB size; 0 means no output OOB.
    pub output_size: u8,
    pub output_actions: u8,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            uuid: MESH_DEVICE_UUID,
            output_size: 0,
            output_actions: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    /// Location descriptor; 0 is "unknown".
    pub location: u16,
    pub models: Vec<u16, MAX_MODELS>,
}

/// Node composition: who made it and which models each element hosts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Composition {
    pub company_id: u16,
    pub elements: Vec<Element, MAX_ELEMENTS>,
}

impl Composition {
    /// One primary element hosting a Generic OnOff Server.
    pub fn onoff_node() -> Self {
        let mut models = Vec::new();
        // Capacity is MAX_MODELS, so the first push always fits.
        let _ = models.push(MODEL_GEN_ONOFF_SRV);
        let mut elements = Vec::new();
        let _ = elements.push(Element { location: 0, models });
        Self {
            company_id: MESH_COMPANY_ID,
            elements,
        }
    }

    pub fn model_count(&self) -> usize {
        self.elements.iter().map(|e| e.models.len()).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeshError {
    /// Radio controller failed to initialize or enable.
    Controller(u32),
    /// Host stack failed to initialize or enable.
    Host(u32),
    /// Mesh layer rejected the node description.
    Mesh(u32),
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller(code) => write!(f, "controller bring-up failed (0x{:x})", code),
            Self::Host(code) => write!(f, "host bring-up failed (0x{:x})", code),
            Self::Mesh(code) => write!(f, "mesh init failed (0x{:x})", code),
        }
    }
}

/// A mesh-capable radio stack. Each stage returns the stack's raw error
/// code on failure.
pub trait MeshStack {
    fn bring_up_controller(&mut self) -> Result<(), u32>;
    fn bring_up_host(&mut self) -> Result<(), u32>;
    fn init_mesh(&mut self, prov: &ProvisioningConfig, comp: &Composition) -> Result<(), u32>;
}

/// Bring the node up: controller, then host, then mesh. Stops at the first
/// failing stage.
pub fn init_node<S: MeshStack>(
    stack: &mut S,
    prov: &ProvisioningConfig,
    comp: &Composition,
) -> Result<(), MeshError> {
    info!("initializing mesh node");

    stack.bring_up_controller().map_err(|code| {
        error!("controller bring-up failed: 0x{:x}", code);
        MeshError::Controller(code)
    })?;
    stack.bring_up_host().map_err(|code| {
        error!("host bring-up failed: 0x{:x}", code);
        MeshError::Host(code)
    })?;
    stack.init_mesh(prov, comp).map_err(|code| {
        error!("mesh init failed: 0x{:x}", code);
        MeshError::Mesh(code)
    })?;

    info!("mesh node up with {} model(s) - waiting for provisioning", comp.model_count());
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProvisioningEvent {
    Registered,
    Complete { net_idx: u16, addr: u16 },
    Reset,
    Other(u32),
}

pub fn on_provisioning_event(event: ProvisioningEvent) {
    match event {
        ProvisioningEvent::Registered => info!("provisioning callback registered"),
        ProvisioningEvent::Complete { net_idx, addr } => {
            info!("provisioned: net_idx 0x{:x}, addr 0x{:x}", net_idx, addr)
        }
        ProvisioningEvent::Reset => info!("provisioning reset"),
        ProvisioningEvent::Other(code) => debug!("provisioning event {}", code),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModelEvent {
    Operation { opcode: u32 },
    Other(u32),
}

pub fn on_model_event(event: ModelEvent) {
    match event {
        ModelEvent::Operation { opcode } => info!("mesh message, opcode 0x{:x}", opcode),
        ModelEvent::Other(code) => debug!("model event {}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct ScriptedStack {
        stages: StdVec<&'static str>,
        controller: Option<u32>,
        host: Option<u32>,
        mesh: Option<u32>,
        seen_company: Option<u16>,
    }

    fn outcome(code: Option<u32>) -> Result<(), u32> {
        code.map_or(Ok(()), Err)
    }

    impl MeshStack for ScriptedStack {
        fn bring_up_controller(&mut self) -> Result<(), u32> {
            self.stages.push("controller");
            outcome(self.controller)
        }

        fn bring_up_host(&mut self) -> Result<(), u32> {
            self.stages.push("host");
            outcome(self.host)
        }

        fn init_mesh(&mut self, _prov: &ProvisioningConfig, comp: &Composition) -> Result<(), u32> {
            self.stages.push("mesh");
            self.seen_company = Some(comp.company_id);
            outcome(self.mesh)
        }
    }

    #[test]
    fn default_node_description() {
        let prov = ProvisioningConfig::default();
        assert_eq!(&prov.uuid[..2], &[0xdd, 0xdd]);
        assert!(prov.uuid[2..].iter().all(|&b| b == 0));
        assert_eq!(prov.output_size, 0);

        let comp = Composition::onoff_node();
        assert_eq!(comp.company_id, 0x02E5);
        assert_eq!(comp.elements.len(), 1);
        assert_eq!(comp.elements[0].models[..], [MODEL_GEN_ONOFF_SRV]);
        assert_eq!(comp.model_count(), 1);
    }

    #[test]
    fn stages_run_in_order() {
        let mut stack = ScriptedStack::default();
        let comp = Composition::onoff_node();
        init_node(&mut stack, &ProvisioningConfig::default(), &comp).unwrap();
        assert_eq!(stack.stages, ["controller", "host", "mesh"]);
        assert_eq!(stack.seen_company, Some(MESH_COMPANY_ID));
    }

    #[test]
    fn controller_failure_stops_bring_up() {
        let mut stack = ScriptedStack {
            controller: Some(0x103),
            ..Default::default()
        };
        let result = init_node(&mut stack, &ProvisioningConfig::default(), &Composition::onoff_node());
        assert_eq!(result, Err(MeshError::Controller(0x103)));
        assert_eq!(stack.stages, ["controller"]);
    }

    #[test]
    fn host_and_mesh_failures_are_attributed() {
        let mut stack = ScriptedStack {
            host: Some(7),
            ..Default::default()
        };
        let result = init_node(&mut stack, &ProvisioningConfig::default(), &Composition::onoff_node());
        assert_eq!(result, Err(MeshError::Host(7)));
        assert_eq!(stack.stages, ["controller", "host"]);

        let mut stack = ScriptedStack {
            mesh: Some(0x102),
            ..Default::default()
        };
        let result = init_node(&mut stack, &ProvisioningConfig::default(), &Composition::onoff_node());
        assert_eq!(result, Err(MeshError::Mesh(0x102)));
        assert_eq!(format!("{}", MeshError::Mesh(0x102)), "mesh init failed (0x102)");
    }

    #[test]
    fn event_handlers_accept_every_variant() {
        on_provisioning_event(ProvisioningEvent::Registered);
        on_provisioning_event(ProvisioningEvent::Complete { net_idx: 0, addr: 0x0005 });
        on_provisioning_event(ProvisioningEvent::Reset);
        on_provisioning_event(ProvisioningEvent::Other(42));
        on_model_event(ModelEvent::Operation { opcode: 0x8202 });
        on_model_event(ModelEvent::Other(1));
    }
}
