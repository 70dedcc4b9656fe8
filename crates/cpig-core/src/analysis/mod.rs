pub mod consistency;
pub mod duplicates;
