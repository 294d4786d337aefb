//! Mock device implementations for testing and development.
//!
//! Every mock is split into the device half, handed to the locker, and a
//! cloneable handle that a test or the console front-end uses to drive
//! inputs and observe outputs.

pub mod actuator;
pub mod analog;
pub mod display;
pub mod keypad;

pub use actuator::{MockActuator, MockActuatorHandle};
pub use analog::{MockAnalogHandle, MockAnalogInput};
pub use display::{MockDisplay, MockDisplayHandle};
pub use keypad::{MockKeypad, MockKeypadHandle};
