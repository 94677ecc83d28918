pub mod deploy_cycle;
pub mod opt_out;
pub mod reload;
pub mod scheduling;
