//! Transport parameter tracing.

pub mod parameters;

pub use parameters::{
    parameter_name, trace_transport_extension, TraceOptions, TransportParameter,
    TransportParameterId, TransportParameterIter,
};
