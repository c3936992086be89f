pub mod dashboards;
pub mod execution;
pub mod queries;
