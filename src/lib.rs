//! Indicator performance assessment: smooth trend and pressure-response
//! models per indicator, criterion scoring, and score aggregation.

pub mod criteria;
pub mod input;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
