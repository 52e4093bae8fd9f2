pub mod simulator;

pub use simulator::{simulate, Simulation, SimulationOutput};
