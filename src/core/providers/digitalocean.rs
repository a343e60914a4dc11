use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::auth::bearer;
use crate::core::cost::normalizer::CostSource;
use crate::core::cost::pricing::droplet_hourly_price;
use crate::core::models::inventory::{Database, Droplet, ResourceInventory, Volume};
use crate::core::models::window::DayWindow;
use crate::core::providers::fetch::{ensure_success, http_client, validate_endpoint};
use crate::core::providers::{BillingSource, Provider};

pub const DEFAULT_ENDPOINT: &str = "https://api.digitalocean.com/v2";

/// Largest page the API serves.
const PAGE_SIZE: u32 = 200;

/// Guard against a server that keeps handing back next links.
const MAX_PAGES: usize = 50;

#[derive(Deserialize)]
struct Pages {
    next: Option<String>,
}

#[derive(Deserialize)]
struct PageLinks {
    #[serde(default)]
    pages: Option<Pages>,
}

/// One page of a DigitalOcean list endpoint.
trait ListPage: DeserializeOwned {
    type Item;

    fn links(&self) -> Option<&PageLinks>;
    fn into_items(self) -> Vec<Self::Item>;

    fn next_url(&self) -> Option<String> {
        self.links()
            .and_then(|l| l.pages.as_ref())
            .and_then(|p| p.next.clone())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Deserialize)]
struct RegionRaw {
    slug: String,
}

#[derive(Deserialize)]
struct DropletRaw {
    id: u64,
    name: String,
    size_slug: String,
    region: Option<RegionRaw>,
}

#[derive(Deserialize)]
struct DropletsResponse {
    #[serde(default)]
    droplets: Vec<DropletRaw>,
    #[serde(default)]
    links: Option<PageLinks>,
}

impl ListPage for DropletsResponse {
    type Item = DropletRaw;

    fn links(&self) -> Option<&PageLinks> {
        self.links.as_ref()
    }

    fn into_items(self) -> Vec<DropletRaw> {
        self.droplets
    }
}

#[derive(Deserialize)]
struct DatabaseRaw {
    name: String,
}

#[derive(Deserialize)]
struct DatabasesResponse {
    // The API returns `null` when there are no clusters.
    #[serde(default)]
    databases: Option<Vec<DatabaseRaw>>,
    #[serde(default)]
    links: Option<PageLinks>,
}

impl ListPage for DatabasesResponse {
    type Item = DatabaseRaw;

    fn links(&self) -> Option<&PageLinks> {
        self.links.as_ref()
    }

    fn into_items(self) -> Vec<DatabaseRaw> {
        self.databases.unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct VolumeRaw {
    name: String,
    size_gigabytes: u64,
}

#[derive(Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    volumes: Vec<VolumeRaw>,
    #[serde(default)]
    links: Option<PageLinks>,
}

impl ListPage for VolumesResponse {
    type Item = VolumeRaw;

    fn links(&self) -> Option<&PageLinks> {
        self.links.as_ref()
    }

    fn into_items(self) -> Vec<VolumeRaw> {
        self.volumes
    }
}

fn into_droplet(raw: DropletRaw) -> Droplet {
    Droplet {
        id: raw.id,
        name: raw.name,
        hourly_price: droplet_hourly_price(&raw.size_slug),
        size_slug: raw.size_slug,
        region: raw.region.map(|r| r.slug).unwrap_or_default(),
    }
}

/// Droplets, databases and volumes of a DigitalOcean account, priced locally.
pub struct DigitalOceanInventory {
    api_token: String,
    endpoint: String,
    client: reqwest::Client,
    delay: Duration,
}

impl DigitalOceanInventory {
    pub fn new(
        api_token: String,
        endpoint: Option<&str>,
        timeout: Duration,
        delay: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        validate_endpoint(&endpoint, Provider::DigitalOcean.display_name())?;
        Ok(Self {
            api_token,
            endpoint,
            client: http_client(timeout)?,
            delay,
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, resource: &str) -> Result<T> {
        debug!(url = %url, "Fetching DigitalOcean resource page");
        let response = self
            .client
            .get(url)
            .header("Authorization", bearer(&self.api_token))
            .header("Content-Type", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request for /{}", resource))?;
        let response =
            ensure_success(response, "DigitalOcean", Provider::DigitalOcean.auth_hint()).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse /{} response", resource))
    }

    /// Every page of `resource`, following `links.pages.next`.
    async fn list<P: ListPage>(&self, resource: &str) -> Result<Vec<P::Item>> {
        let mut url = format!("{}/{}?per_page={}", self.endpoint, resource, PAGE_SIZE);
        let mut items = Vec::new();
        for _ in 0..MAX_PAGES {
            let page: P = self.get(&url, resource).await?;
            let next = page.next_url();
            items.extend(page.into_items());
            match next {
                Some(next) => {
                    // The token is only ever sent to the configured API.
                    if !next.starts_with(&format!("{}/", self.endpoint)) {
                        anyhow::bail!(
                            "DigitalOcean: /{} next page points outside {}: {}",
                            resource,
                            self.endpoint,
                            next
                        );
                    }
                    url = next;
                    self.pause().await;
                }
                None => return Ok(items),
            }
        }
        anyhow::bail!("DigitalOcean: /{} listing exceeded {} pages", resource, MAX_PAGES)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl BillingSource for DigitalOceanInventory {
    fn provider(&self) -> Provider {
        Provider::DigitalOcean
    }

    async fn fetch(&self, _window: &DayWindow) -> Result<CostSource> {
        info!("Collecting DigitalOcean inventory");

        let droplets = self.list::<DropletsResponse>("droplets").await?;
        self.pause().await;
        let databases = self.list::<DatabasesResponse>("databases").await?;
        self.pause().await;
        let volumes = self.list::<VolumesResponse>("volumes").await?;

        let inventory = ResourceInventory {
            droplets: droplets.into_iter().map(into_droplet).collect(),
            volumes: volumes
                .into_iter()
                .map(|v| Volume {
                    name: v.name,
                    size_gigabytes: v.size_gigabytes,
                })
                .collect(),
            databases: databases
                .into_iter()
                .map(|d| Database { name: d.name })
                .collect(),
        };
        info!(
            droplets = inventory.droplets.len(),
            databases = inventory.databases.len(),
            volumes = inventory.volumes.len(),
            "DigitalOcean inventory collected"
        );
        Ok(CostSource::EstimatedFromInventory(inventory))
    }
}
