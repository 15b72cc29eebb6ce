pub mod sensors;

pub use sensors::{
    BatteryModel, SimulatedAccelerometer, SimulatedBattery, SimulatedPhoneState,
    SimulationSettings, simulated_drivers,
};
