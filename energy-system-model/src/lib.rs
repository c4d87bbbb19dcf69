pub mod components;
pub mod economics;

pub use components::demand::DemandParams;
pub use components::diesel::DieselParams;
pub use components::genset::GensetParams;
pub use components::photovoltaic::PvParams;
pub use components::storage::StorageParams;
pub use economics::CapitalCost;
