mod iot_gate;

pub use iot_gate::{IotGateMiddlewareFactory, IotGateMiddlewareService, MACHINE_ID_HEADER};
