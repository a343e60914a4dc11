use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Droplet {
    pub id: u64,
    pub name: String,
    pub size_slug: String,
    pub region: String,
    /// Hourly price from the local size table.
    pub hourly_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub size_gigabytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
}

/// Resources that make up an estimated daily cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceInventory {
    pub droplets: Vec<Droplet>,
    pub volumes: Vec<Volume>,
    pub databases: Vec<Database>,
}

impl ResourceInventory {
    pub fn total_volume_gb(&self) -> u64 {
        self.volumes.iter().map(|v| v.size_gigabytes).sum()
    }
}
