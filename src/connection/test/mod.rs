
mod state_terminal;
