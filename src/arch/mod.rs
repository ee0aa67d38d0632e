//! Architecture-specific definitions

pub mod riscv;
