mod scenario;

mod state_failure;
