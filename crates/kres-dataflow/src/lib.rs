//! kres Dataflow
//!
//! Compiles a finished resolution graph into a tree of actuators and
//! encodes it as text.
//!
//! # Example
//!
//! ```rust
//! use kres_dataflow::{Actuator, ActuatorKind, Dataflow, DataflowEncoder, ServiceCall};
//! use kres_knowledge::ResourceSet;
//!
//! let dataflow = Dataflow::new(
//!     vec![Actuator::new(ActuatorKind::Observe, "geo:Elevation").with_call(ServiceCall::new("dem.load"))],
//!     1.0,
//!     ResourceSet::native(),
//! );
//! assert_eq!(
//!     DataflowEncoder::new(&dataflow).encode(),
//!     "observe geo:Elevation\n   apply dem.load();"
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod actuator;
pub mod compiler;
pub mod encoder;

// Re-exports for convenience
pub use actuator::{
    Actuator, ActuatorKind, Dataflow, ServiceCall, CONSTANT_RESOLVER, EXPRESSION_RESOLVER,
    LUT_RESOLVER, URN_RESOLVER,
};
pub use compiler::{adapt_contextualizable, DataflowCompiler};
pub use encoder::DataflowEncoder;
