pub mod beaches;
pub mod lunar;
pub mod tides;
pub mod transport;
pub mod weather;

pub use lunar::{LunarPhaseProvider, SynodicLunarCalculator};
pub use tides::{InphSource, LocalTideModel, MarinhaSource, TideEstimator, TideSource};
pub use transport::{HttpTransport, ReqwestTransport};
pub use weather::WeatherProvider;
