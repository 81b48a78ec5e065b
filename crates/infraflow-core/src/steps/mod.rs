//! Provisioning steps

pub mod create_virtual_machines;

pub use create_virtual_machines::CreateVirtualMachines;
