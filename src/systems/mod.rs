mod autopilot;
mod effects;
mod happiness;
mod market;
mod science;
mod tiles;
mod transport;

pub use autopilot::warehouse_autopilot;
pub use effects::EffectsSystem;
pub use happiness::{compute_happiness, HappinessSystem, HAPPINESS_LIMIT};
pub use market::{trade_pairs, MarketSystem};
pub use science::ScienceSystem;
pub use tiles::{tick_tile, tile_order, TileSystem};
pub use transport::{add_transportation, transport_resource, TransportOrder, TransportSystem};
