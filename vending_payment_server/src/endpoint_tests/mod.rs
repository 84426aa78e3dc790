mod helpers;
mod iot;
mod mocks;
mod payments;
