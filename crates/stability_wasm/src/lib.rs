mod request;
mod runner;

pub use request::{GuaranteeRequest, SampleRequest};
pub use runner::{strategy_names, WasmGuaranteeRunner};
