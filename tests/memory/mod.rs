use battery_es::battery::memory::{battery_store_builder, MemoryBatteryQueries};
use battery_es::battery::{Battery, BatteryService};
use battery_es::store::memory::InMemoryStore;

mod concurrency;
mod notifications;
mod random_sequences;
mod rebuild;
mod replace;

pub type MemoryService = BatteryService<InMemoryStore<Battery>, MemoryBatteryQueries>;

pub fn service_over(store: InMemoryStore<Battery>) -> MemoryService {
    BatteryService::new(store.clone(), MemoryBatteryQueries::new(store))
}

pub fn service() -> MemoryService {
    service_over(battery_store_builder().build())
}
